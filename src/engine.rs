//! Step resolution engine
//!
//! The [`StepRegistry`] holds programmatically registered steps, globally or
//! scoped to one context. The [`StepResolver`] turns free step text into a
//! [`ResolvedStep`] for the live context, in this order:
//!
//! 1. comments (`#`, `//`) pass unconditionally
//! 2. registered steps, context-scoped before global
//! 3. context existence templates
//! 4. element templates (existence and interactions)
//!
//! Candidate phrases for 3 and 4 are built once per context and cached.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use similar::get_close_matches;
use tracing::debug;

use crate::error::SpecError;
use crate::model::{
    substitute, Application, Context, ContextId, Element, ElementKind, Interaction,
    ParameterizedStep, StepCategory,
};
use crate::steps::{ResolvedStep, StepContext, StepHandler};

/// Keyword prefixes stripped from step text, longest first where one is a
/// prefix of another.
const GHERKIN_PREFIXES: [&str; 7] = ["given that", "given", "when", "then", "and", "or", "but"];

/// Number of suggestions offered for an unmatched step
const SUGGESTIONS: usize = 3;

/// Strip a leading Gherkin keyword and surrounding whitespace.
pub fn strip_gherkin_prefix(text: &str) -> &str {
    let text = text.trim();
    for prefix in GHERKIN_PREFIXES {
        if let Some(head) = text.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                let rest = &text[prefix.len()..];
                if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                    return rest.trim();
                }
            }
        }
    }
    text
}

/// Whether a step line is a comment.
pub fn is_comment(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with('#') || text.starts_with("//")
}

fn normalize(pattern: &str) -> String {
    pattern.trim().to_lowercase()
}

/// Programmatically registered steps
#[derive(Clone, Default)]
pub struct StepRegistry {
    global: BTreeMap<String, (String, StepHandler)>,
    scoped: BTreeMap<ContextId, BTreeMap<String, (String, StepHandler)>>,
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("global", &self.global.keys().collect::<Vec<_>>())
            .field("scoped", &self.scoped.iter().map(|(k, v)| (k, v.len())).collect::<Vec<_>>())
            .finish()
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step for every context. Re-registering a pattern replaces it.
    pub fn register<F>(&mut self, pattern: impl Into<String>, handler: F)
    where
        F: Fn(&mut StepContext<'_>) -> bool + 'static,
    {
        let pattern = pattern.into();
        self.global.insert(normalize(&pattern), (pattern, Rc::new(handler)));
    }

    /// Register a step that only applies while `context` is current.
    pub fn register_for<F>(&mut self, context: impl Into<ContextId>, pattern: impl Into<String>, handler: F)
    where
        F: Fn(&mut StepContext<'_>) -> bool + 'static,
    {
        let pattern = pattern.into();
        self.scoped
            .entry(context.into())
            .or_default()
            .insert(normalize(&pattern), (pattern, Rc::new(handler)));
    }

    pub fn unregister_all(&mut self) {
        self.global.clear();
        self.scoped.clear();
    }

    /// Drop every step scoped to `context`.
    pub fn unregister_context(&mut self, context: &str) {
        self.scoped.remove(context);
    }

    /// Find the handler for `text`, preferring one scoped to `context`.
    pub fn lookup(&self, text: &str, context: &str) -> Option<(&str, StepHandler)> {
        let key = normalize(text);
        self.scoped
            .get(context)
            .and_then(|steps| steps.get(&key))
            .or_else(|| self.global.get(&key))
            .map(|(pattern, handler)| (pattern.as_str(), Rc::clone(handler)))
    }

    /// Patterns applicable in `context`.
    pub fn patterns(&self, context: &str) -> Vec<&str> {
        let mut patterns: Vec<&str> = Vec::new();
        let scoped = self.scoped.get(context).into_iter().flat_map(|steps| steps.values());
        for (pattern, _) in scoped.chain(self.global.values()) {
            if !patterns.iter().any(|p| p.eq_ignore_ascii_case(pattern)) {
                patterns.push(pattern.as_str());
            }
        }
        patterns
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.scoped.values().map(BTreeMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a candidate phrase resolves to
#[derive(Debug, Clone)]
enum Target {
    Context,
    Element { element: Element, action: Interaction },
    /// Declared in the model but implemented by a registered step
    Manual,
}

#[derive(Debug, Clone)]
struct Candidate {
    phrase: String,
    target: Target,
}

/// Matches step text against the application model
#[derive(Debug, Default)]
pub struct StepResolver {
    cache: HashMap<ContextId, Rc<Vec<Candidate>>>,
}

impl StepResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop cached candidates (after the model changed).
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Resolve step text in `context`.
    pub fn resolve(
        &mut self,
        text: &str,
        registry: &StepRegistry,
        application: &Application,
        context: &Context,
    ) -> Result<ResolvedStep, SpecError> {
        if is_comment(text) {
            return Ok(ResolvedStep::Pass);
        }
        let step = strip_gherkin_prefix(text);
        if is_comment(step) {
            return Ok(ResolvedStep::Pass);
        }

        if let Some((pattern, handler)) = registry.lookup(step, &context.id) {
            debug!(step, pattern, "resolved registered step");
            return Ok(ResolvedStep::Registered { pattern: pattern.to_string(), handler });
        }

        let candidates = self.candidates(application, context);
        let found = candidates
            .iter()
            .find(|c| c.phrase.eq_ignore_ascii_case(step) && !matches!(c.target, Target::Manual));
        match found.map(|c| &c.target) {
            Some(Target::Context) => {
                debug!(step, context = %context.id, "resolved context existence step");
                Ok(ResolvedStep::ContextExistence {
                    context: context.name.clone(),
                    elements: context.sampleable_elements().into_iter().cloned().collect(),
                })
            }
            Some(Target::Element { element, action }) => {
                debug!(step, element = %element.identifier, %action, "resolved element step");
                Ok(ResolvedStep::Element { element: element.clone(), action: *action })
            }
            Some(Target::Manual) | None => {
                let mut err = SpecError::no_matching_step(step, &context.name);
                let phrases: Vec<String> = candidates
                    .iter()
                    .map(|c| c.phrase.to_lowercase())
                    .chain(registry.patterns(&context.id).into_iter().map(str::to_lowercase))
                    .collect();
                let refs: Vec<&str> = phrases.iter().map(String::as_str).collect();
                let lowered = step.to_lowercase();
                let close = get_close_matches(lowered.as_str(), &refs, SUGGESTIONS, 0.6);
                if !close.is_empty() {
                    let close: Vec<String> = close.iter().map(|s| format!("'{}'", s)).collect();
                    err.message = format!("{}; did you mean {}?", err.message, close.join(", "));
                }
                Err(err)
            }
        }
    }

    /// Every phrase that resolves in `context`, registered steps first.
    pub fn phrases(&mut self, registry: &StepRegistry, application: &Application, context: &Context) -> Vec<String> {
        let mut phrases: Vec<String> = registry
            .patterns(&context.id)
            .into_iter()
            .map(str::to_string)
            .collect();
        for candidate in self.candidates(application, context).iter() {
            if !phrases.iter().any(|p| p.eq_ignore_ascii_case(&candidate.phrase)) {
                phrases.push(candidate.phrase.clone());
            }
        }
        phrases
    }

    fn candidates(&mut self, application: &Application, context: &Context) -> Rc<Vec<Candidate>> {
        if let Some(cached) = self.cache.get(&context.id) {
            return Rc::clone(cached);
        }
        let built = Rc::new(build_candidates(application, context));
        debug!(context = %context.id, candidates = built.len(), "built step candidates");
        self.cache.insert(context.id.clone(), Rc::clone(&built));
        built
    }
}

/// Both substitutions of one template, name first, without repeats.
fn expand(template: &str, name: &str, identifier: &str, out: &mut Vec<String>) {
    let by_name = substitute(template, name);
    let by_id = substitute(template, identifier);
    let same = by_name.eq_ignore_ascii_case(&by_id);
    out.push(by_name);
    if !same {
        out.push(by_id);
    }
}

fn build_candidates(application: &Application, context: &Context) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for family in application.steps_for(StepCategory::Context, context) {
        if let ParameterizedStep::Existence(templates) = family {
            for template in templates {
                let mut phrases = Vec::new();
                expand(template, &context.name, &context.id, &mut phrases);
                candidates.extend(phrases.into_iter().map(|phrase| Candidate { phrase, target: Target::Context }));
            }
        }
    }

    let mut elements: Vec<Element> = context.elements().cloned().collect();
    let keyboard_category = StepCategory::Element(ElementKind::Keyboard);
    if application.has_steps_for(keyboard_category, context)
        && !context.elements.contains_key(&ElementKind::Keyboard)
    {
        elements.push(Element::keyboard());
    }

    for element in elements {
        for family in application.steps_for(StepCategory::Element(element.kind), context) {
            let mut push = |templates: &[String], target: Target| {
                for template in templates {
                    let mut phrases = Vec::new();
                    expand(template, &element.name, &element.identifier, &mut phrases);
                    for phrase in phrases {
                        candidates.push(Candidate { phrase, target: target.clone() });
                    }
                }
            };
            match family {
                ParameterizedStep::Existence(templates) => push(
                    templates.as_slice(),
                    Target::Element { element: element.clone(), action: Interaction::Existence },
                ),
                ParameterizedStep::Interaction(actions) => {
                    for (action, templates) in actions {
                        push(templates.as_slice(), Target::Element { element: element.clone(), action: *action });
                    }
                }
                ParameterizedStep::Registered(template) => {
                    push(std::slice::from_ref(template), Target::Manual)
                }
            }
        }
    }
    candidates
}
