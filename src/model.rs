//! Application model
//!
//! A read-only description of the application under test: the contexts
//! (screens) it is made of, the elements each context shows, the step
//! templates that talk about them, and the transition map that says which
//! ordered interactions move the user from one context to another.
//!
//! The model is built once (usually by [`crate::config`]) and never mutated
//! afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SpecError;

/// Identifier of a context (the key in the `contexts` map)
pub type ContextId = String;

/// Token substituted in step templates
pub const PLACEHOLDER: &str = "$PARAMETER";

/// Replace the placeholder token in a template.
pub fn substitute(template: &str, value: &str) -> String {
    template.replace(PLACEHOLDER, value)
}

/// The kind of a UI element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Button,
    Cell,
    Text,
    TextField,
    NavigationBar,
    Tab,
    TabBar,
    Keyboard,
    WebView,
    Other,
}

impl ElementKind {
    pub const ALL: [ElementKind; 10] = [
        ElementKind::Button,
        ElementKind::Cell,
        ElementKind::Text,
        ElementKind::TextField,
        ElementKind::NavigationBar,
        ElementKind::Tab,
        ElementKind::TabBar,
        ElementKind::Keyboard,
        ElementKind::WebView,
        ElementKind::Other,
    ];

    /// Key used in configuration documents
    pub fn key(&self) -> &'static str {
        match self {
            ElementKind::Button => "buttons",
            ElementKind::Cell => "cells",
            ElementKind::Text => "text",
            ElementKind::TextField => "text-fields",
            ElementKind::NavigationBar => "navigation-bars",
            ElementKind::Tab => "tabs",
            ElementKind::TabBar => "tab-bars",
            ElementKind::Keyboard => "keyboards",
            ElementKind::WebView => "web-views",
            ElementKind::Other => "elements",
        }
    }

    /// Text-like kinds are matched by label containment rather than identity.
    pub fn is_text_like(&self) -> bool {
        matches!(self, ElementKind::Text)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ElementKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "buttons" | "button" => ElementKind::Button,
            "cells" | "cell" => ElementKind::Cell,
            "text" | "texts" | "static-text" => ElementKind::Text,
            "text-fields" | "text-field" => ElementKind::TextField,
            "navigation-bars" | "navigation-bar" => ElementKind::NavigationBar,
            "tabs" | "tab" => ElementKind::Tab,
            "tab-bars" | "tab-bar" => ElementKind::TabBar,
            "keyboards" | "keyboard" => ElementKind::Keyboard,
            "web-views" | "web-view" => ElementKind::WebView,
            "elements" | "element" | "other-elements" | "other" => ElementKind::Other,
            other => return Err(SpecError::config(format!("unknown element kind '{}'", other))),
        };
        Ok(kind)
    }
}

/// Category under which step templates are registered.
///
/// The `Context` category holds the "this screen is displayed" templates;
/// every other category is keyed by element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepCategory {
    Context,
    Element(ElementKind),
}

impl FromStr for StepCategory {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pages" | "page" | "screens" | "screen" | "contexts" | "context" => {
                Ok(StepCategory::Context)
            }
            other => other.parse().map(StepCategory::Element),
        }
    }
}

/// How an element that is not immediately visible can be found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Discovery {
    #[default]
    None,
    SwipeUp,
    SwipeDown,
}

impl FromStr for Discovery {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Discovery::None),
            "swipe-up" => Ok(Discovery::SwipeUp),
            "swipe-down" => Ok(Discovery::SwipeDown),
            other => Err(SpecError::config(format!("unknown discovery hint '{}'", other))),
        }
    }
}

/// An action (or check) a step performs on an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interaction {
    Existence,
    Tap,
    DoubleTap,
    Press,
    TwoFingerTap,
    SwipeLeft,
    SwipeRight,
    SwipeUp,
    SwipeDown,
}

impl Interaction {
    pub fn key(&self) -> &'static str {
        match self {
            Interaction::Existence => "existence",
            Interaction::Tap => "tap",
            Interaction::DoubleTap => "double-tap",
            Interaction::Press => "press",
            Interaction::TwoFingerTap => "two-finger-tap",
            Interaction::SwipeLeft => "swipe-left",
            Interaction::SwipeRight => "swipe-right",
            Interaction::SwipeUp => "swipe-up",
            Interaction::SwipeDown => "swipe-down",
        }
    }
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Interaction {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s.trim().to_ascii_lowercase().as_str() {
            "existence" => Interaction::Existence,
            "tap" => Interaction::Tap,
            "double-tap" | "doubletap" => Interaction::DoubleTap,
            "press" => Interaction::Press,
            "two-finger-tap" | "twofingertap" => Interaction::TwoFingerTap,
            "swipe-left" | "swipeleft" => Interaction::SwipeLeft,
            "swipe-right" | "swiperight" => Interaction::SwipeRight,
            "swipe-up" | "swipeup" => Interaction::SwipeUp,
            "swipe-down" | "swipedown" => Interaction::SwipeDown,
            other => return Err(SpecError::config(format!("unknown interaction '{}'", other))),
        };
        Ok(action)
    }
}

/// A UI element declared in a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Accessibility identifier used to query the element
    pub identifier: String,
    /// Human name used in step text
    pub name: String,
    pub kind: ElementKind,
    pub discovery: Discovery,
    /// Transient elements are never sampled by context existence checks
    pub transient: bool,
}

impl Element {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            kind,
            discovery: Discovery::None,
            transient: false,
        }
    }

    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// The pseudo-element standing in for "any keyboard".
    pub fn keyboard() -> Self {
        Self::new("keyboard", "keyboard", ElementKind::Keyboard)
    }
}

/// A step template family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterizedStep {
    /// Templates asserting existence
    Existence(Vec<String>),
    /// Templates per interaction
    Interaction(BTreeMap<Interaction, Vec<String>>),
    /// A template whose behavior is registered programmatically
    Registered(String),
}

/// One interaction with one element, as recorded in the transition map
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementInteraction {
    pub action: Interaction,
    /// Identifier of the target element
    pub element: String,
}

impl ElementInteraction {
    pub fn new(action: Interaction, element: impl Into<String>) -> Self {
        Self { action, element: element.into() }
    }
}

impl fmt::Display for ElementInteraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.action, self.element)
    }
}

/// Direction of a context transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forwards,
    Backwards,
}

impl FromStr for Direction {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forwards" | "forward" => Ok(Direction::Forwards),
            "backwards" | "backward" | "back" => Ok(Direction::Backwards),
            other => Err(SpecError::config(format!("unknown transition direction '{}'", other))),
        }
    }
}

/// The ordered interactions required to move to `destination`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTransition {
    pub destination: ContextId,
    pub direction: Direction,
    pub actions: Vec<ElementInteraction>,
}

impl ContextTransition {
    pub fn new(destination: impl Into<ContextId>, direction: Direction, actions: Vec<ElementInteraction>) -> Self {
        Self {
            destination: destination.into(),
            direction,
            actions,
        }
    }

    /// Same destination and direction, no actions performed yet.
    pub fn unfulfilled(&self) -> Self {
        Self {
            destination: self.destination.clone(),
            direction: self.direction,
            actions: Vec::new(),
        }
    }
}

/// A named region (screen) of the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub id: ContextId,
    pub name: String,
    pub elements: BTreeMap<ElementKind, Vec<Element>>,
    /// Context-local templates, overriding the global ones per category
    pub steps: Option<BTreeMap<StepCategory, Vec<ParameterizedStep>>>,
}

impl Context {
    pub fn new(id: impl Into<ContextId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            elements: BTreeMap::new(),
            steps: None,
        }
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.entry(element.kind).or_default().push(element);
        self
    }

    pub fn with_steps(mut self, category: StepCategory, steps: Vec<ParameterizedStep>) -> Self {
        self.steps.get_or_insert_with(BTreeMap::new).insert(category, steps);
        self
    }

    /// All elements in kind order, declaration order within a kind.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values().flatten()
    }

    /// Elements eligible for existence sampling.
    pub fn sampleable_elements(&self) -> Vec<&Element> {
        self.elements().filter(|e| !e.transient).collect()
    }
}

/// The whole application model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Application {
    pub initial_context: Option<ContextId>,
    pub contexts: BTreeMap<ContextId, Context>,
    /// Transition map keyed by source context
    pub transitions: BTreeMap<ContextId, Vec<ContextTransition>>,
    /// Application-global templates
    pub steps: BTreeMap<StepCategory, Vec<ParameterizedStep>>,
}

impl Application {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_context(mut self, id: impl Into<ContextId>) -> Self {
        self.initial_context = Some(id.into());
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.contexts.insert(context.id.clone(), context);
        self
    }

    pub fn with_transition(mut self, from: impl Into<ContextId>, transition: ContextTransition) -> Self {
        self.transitions.entry(from.into()).or_default().push(transition);
        self
    }

    pub fn with_steps(mut self, category: StepCategory, steps: Vec<ParameterizedStep>) -> Self {
        self.steps.insert(category, steps);
        self
    }

    /// Look up a context by identifier, falling back to a case-insensitive match.
    pub fn context(&self, id: &str) -> Option<&Context> {
        if let Some(context) = self.contexts.get(id) {
            return Some(context);
        }
        self.contexts
            .values()
            .find(|c| c.id.eq_ignore_ascii_case(id))
    }

    /// Templates for a category in a context: local templates replace global ones.
    pub fn steps_for<'a>(&'a self, category: StepCategory, context: &'a Context) -> &'a [ParameterizedStep] {
        context
            .steps
            .as_ref()
            .and_then(|local| local.get(&category))
            .or_else(|| self.steps.get(&category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether any template (global or local to `context`) exists for a category.
    pub fn has_steps_for(&self, category: StepCategory, context: &Context) -> bool {
        !self.steps_for(category, context).is_empty()
    }

    pub fn transitions_from(&self, id: &str) -> &[ContextTransition] {
        self.transitions.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check referential integrity of the transition map and initial context.
    pub fn validate(&self) -> Result<(), SpecError> {
        if let Some(ref initial) = self.initial_context {
            if self.context(initial).is_none() {
                return Err(SpecError::config(format!(
                    "initial-context '{}' is not a declared context",
                    initial
                )));
            }
        }
        for (source, transitions) in &self.transitions {
            if !self.contexts.contains_key(source) {
                return Err(SpecError::config(format!(
                    "transition map source '{}' is not a declared context",
                    source
                )));
            }
            for transition in transitions {
                if !self.contexts.contains_key(&transition.destination) {
                    return Err(SpecError::config(format!(
                        "transition from '{}' to undeclared context '{}'",
                        source, transition.destination
                    )));
                }
                if transition.actions.is_empty() {
                    return Err(SpecError::config(format!(
                        "transition from '{}' to '{}' has no actions",
                        source, transition.destination
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existence(t: &str) -> ParameterizedStep {
        ParameterizedStep::Existence(vec![t.to_string()])
    }

    #[test]
    fn test_element_kind_aliases() {
        assert_eq!("buttons".parse::<ElementKind>().unwrap(), ElementKind::Button);
        assert_eq!("Text-Field".parse::<ElementKind>().unwrap(), ElementKind::TextField);
        assert_eq!("elements".parse::<ElementKind>().unwrap(), ElementKind::Other);
        assert!("sliders".parse::<ElementKind>().is_err());
        assert_eq!("pages".parse::<StepCategory>().unwrap(), StepCategory::Context);
    }

    #[test]
    fn test_local_steps_override_global() {
        let ctx = Context::new("home", "Home")
            .with_steps(StepCategory::Element(ElementKind::Button), vec![existence("local $PARAMETER")]);
        let other = Context::new("other", "Other");
        let app = Application::new()
            .with_context(ctx)
            .with_context(other)
            .with_steps(StepCategory::Element(ElementKind::Button), vec![existence("global $PARAMETER")]);

        let home = app.context("home").unwrap();
        assert_eq!(
            app.steps_for(StepCategory::Element(ElementKind::Button), home),
            &[existence("local $PARAMETER")]
        );
        let other = app.context("other").unwrap();
        assert_eq!(
            app.steps_for(StepCategory::Element(ElementKind::Button), other),
            &[existence("global $PARAMETER")]
        );
        assert!(app.steps_for(StepCategory::Element(ElementKind::Cell), other).is_empty());
    }

    #[test]
    fn test_steps_for_detached_context() {
        let app = Application::new()
            .with_steps(StepCategory::Element(ElementKind::Button), vec![existence("global $PARAMETER")]);
        let steps = {
            let detached = Context::new("popup", "Popup");
            app.steps_for(StepCategory::Element(ElementKind::Button), &detached).to_vec()
        };
        assert_eq!(steps, vec![existence("global $PARAMETER")]);
        let local = Context::new("popup", "Popup")
            .with_steps(StepCategory::Element(ElementKind::Button), vec![existence("local $PARAMETER")]);
        assert!(app.has_steps_for(StepCategory::Element(ElementKind::Button), &local));
        assert_eq!(
            app.steps_for(StepCategory::Element(ElementKind::Button), &local),
            &[existence("local $PARAMETER")]
        );
    }

    #[test]
    fn test_context_lookup_case_insensitive() {
        let app = Application::new().with_context(Context::new("Home", "Home"));
        assert!(app.context("home").is_some());
        assert!(app.context("HOME").is_some());
        assert!(app.context("away").is_none());
    }

    #[test]
    fn test_validate_dangling_destination() {
        let app = Application::new()
            .with_context(Context::new("a", "A"))
            .with_transition(
                "a",
                ContextTransition::new("b", Direction::Forwards, vec![ElementInteraction::new(Interaction::Tap, "x")]),
            );
        let err = app.validate().unwrap_err();
        assert!(err.message.contains("undeclared context 'b'"));
    }

    #[test]
    fn test_sampleable_excludes_transient() {
        let ctx = Context::new("a", "A")
            .with_element(Element::new("x", "X", ElementKind::Button))
            .with_element(Element::new("spinner", "Spinner", ElementKind::Other).transient());
        let ids: Vec<_> = ctx.sampleable_elements().iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(ids, vec!["x"]);
    }

    #[test]
    fn test_substitute() {
        assert_eq!(substitute("I tap $PARAMETER", "Log in"), "I tap Log in");
    }
}
