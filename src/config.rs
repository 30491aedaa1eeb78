//! Application model loading
//!
//! Reads the declarative JSON document describing the application under
//! test and turns it into a validated [`Application`]. The document is either
//! `{"application": {...}}` or the bare application object:
//!
//! ```json
//! {"application": {
//!    "initial-context": "home",
//!    "contexts": {"home": {"name": "Home", "elements": [
//!        {"id": "login", "name": "Log in", "type": "buttons"}]}},
//!    "map": {"home": [{"destination": "login",
//!                      "actions": [{"action": "tap", "element": "login"}]}]},
//!    "steps": {"pages": {"existence": ["the $PARAMETER screen is displayed"]},
//!              "buttons": {"interaction": {"tap": ["I tap $PARAMETER"]}}}}}
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::SpecError;
use crate::model::{
    Application, Context, ContextTransition, Direction, Discovery, Element, ElementInteraction,
    ElementKind, Interaction, ParameterizedStep, StepCategory,
};

#[derive(Debug, Deserialize)]
struct RawApplication {
    #[serde(rename = "initial-context", default)]
    initial_context: Option<String>,
    #[serde(default)]
    contexts: BTreeMap<String, RawContext>,
    #[serde(default)]
    map: BTreeMap<String, Vec<RawTransition>>,
    #[serde(default)]
    steps: BTreeMap<String, RawStepTable>,
}

#[derive(Debug, Deserialize)]
struct RawContext {
    name: String,
    #[serde(default)]
    elements: Vec<RawElement>,
    #[serde(default)]
    steps: Option<BTreeMap<String, RawStepTable>>,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    discovery: Option<String>,
    #[serde(default)]
    transient: bool,
}

#[derive(Debug, Deserialize)]
struct RawTransition {
    destination: String,
    #[serde(default)]
    direction: Option<String>,
    actions: Vec<RawInteraction>,
}

#[derive(Debug, Deserialize)]
struct RawInteraction {
    action: String,
    element: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStepTable {
    #[serde(default)]
    existence: Option<Vec<String>>,
    #[serde(default)]
    interaction: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    manual: Option<String>,
}

/// Load and validate an application model from a JSON file.
pub fn load_application(path: impl AsRef<Path>) -> Result<Application, SpecError> {
    let path = path.as_ref();
    let file = path.display().to_string();
    let data = std::fs::read_to_string(path).map_err(|e| SpecError::from(e).with_file(&file))?;
    parse_application(&data).map_err(|e| e.with_file(file))
}

/// Parse and validate an application model from JSON text.
pub fn parse_application(json: &str) -> Result<Application, SpecError> {
    let mut value: serde_json::Value = serde_json::from_str(json)?;
    if let Some(inner) = value.get_mut("application").map(serde_json::Value::take) {
        value = inner;
    }
    let raw: RawApplication = serde_json::from_value(value)?;
    let application = convert(raw)?;
    application.validate()?;
    debug!(
        contexts = application.contexts.len(),
        sources = application.transitions.len(),
        "loaded application model"
    );
    Ok(application)
}

fn convert(raw: RawApplication) -> Result<Application, SpecError> {
    let mut application = Application::new();
    application.initial_context = raw.initial_context;

    for (id, raw_context) in raw.contexts {
        let mut context = Context::new(id.clone(), raw_context.name);
        for raw_element in raw_context.elements {
            let kind: ElementKind = raw_element.kind.parse()?;
            let discovery: Discovery = match raw_element.discovery {
                Some(ref d) => d.parse()?,
                None => Discovery::None,
            };
            let mut element = Element::new(raw_element.id, raw_element.name, kind)
                .with_discovery(discovery);
            element.transient = raw_element.transient;
            context = context.with_element(element);
        }
        if let Some(steps) = raw_context.steps {
            context.steps = Some(convert_steps(steps).map_err(|e| {
                SpecError::config(format!("context '{}': {}", id, e.message))
            })?);
        }
        application.contexts.insert(id, context);
    }

    for (source, raw_transitions) in raw.map {
        let mut transitions = Vec::with_capacity(raw_transitions.len());
        for raw_transition in raw_transitions {
            let direction: Direction = match raw_transition.direction {
                Some(ref d) => d.parse()?,
                None => Direction::Forwards,
            };
            let actions = raw_transition
                .actions
                .into_iter()
                .map(|a| Ok(ElementInteraction::new(a.action.parse::<Interaction>()?, a.element)))
                .collect::<Result<Vec<_>, SpecError>>()?;
            transitions.push(ContextTransition::new(raw_transition.destination, direction, actions));
        }
        application.transitions.insert(source, transitions);
    }

    application.steps = convert_steps(raw.steps)?;
    Ok(application)
}

fn convert_steps(
    raw: BTreeMap<String, RawStepTable>,
) -> Result<BTreeMap<StepCategory, Vec<ParameterizedStep>>, SpecError> {
    let mut steps = BTreeMap::new();
    for (key, table) in raw {
        let category: StepCategory = key.parse()?;
        let mut family = Vec::new();
        if let Some(existence) = table.existence {
            family.push(ParameterizedStep::Existence(existence));
        }
        if let Some(interaction) = table.interaction {
            let mut templates = BTreeMap::new();
            for (action, phrases) in interaction {
                let action: Interaction = action.parse()?;
                templates.insert(action, phrases);
            }
            family.push(ParameterizedStep::Interaction(templates));
        }
        if let Some(manual) = table.manual {
            family.push(ParameterizedStep::Registered(manual));
        }
        steps.insert(category, family);
    }
    Ok(steps)
}
