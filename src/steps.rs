//! Resolved steps and their evaluation
//!
//! A [`ResolvedStep`] is the executable form of one line of step text. It is
//! evaluated against a [`StepContext`], which lends it the driver, the context
//! machine, the random source used for existence sampling and the scenario
//! log for the duration of the call.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::RngCore;
use tracing::{debug, warn};

use crate::driver::{Driver, ElementRef, Locator};
use crate::model::{Discovery, Element, ElementInteraction, ElementKind, Interaction};
use crate::state::ContextMachine;

/// Maximum number of elements checked by a context existence step
pub const SAMPLE_SIZE: usize = 3;

/// Discovery swipes attempted before an element is declared absent
pub const SWIPE_ATTEMPTS: usize = 5;

/// Wait applied to each recheck after a discovery swipe
const SWIPE_RECHECK_TIMEOUT: Duration = Duration::from_secs(1);

/// Programmatically registered step behavior
pub type StepHandler = Rc<dyn Fn(&mut StepContext<'_>) -> bool>;

/// Everything a step needs while it runs
pub struct StepContext<'a> {
    pub driver: &'a mut dyn Driver,
    pub machine: &'a mut ContextMachine,
    pub rng: &'a mut dyn RngCore,
    /// Upper bound for each existence wait
    pub timeout: Duration,
    /// Scenario execution log
    pub log: &'a mut String,
}

impl StepContext<'_> {
    /// Append a line to the scenario log.
    pub fn logf(&mut self, line: &str) {
        self.log.push_str(line);
        self.log.push('\n');
    }

    /// Report a performed interaction to the context machine, logging any
    /// resulting change of context.
    pub fn report(&mut self, interaction: &ElementInteraction) {
        let before = self.machine.current_context().name.clone();
        if self.machine.action_performed(interaction) {
            let after = self.machine.current_context().name.clone();
            self.logf(&format!("[transition: {} -> {}]", before, after));
        }
    }
}

/// The executable form of one step
#[derive(Clone)]
pub enum ResolvedStep {
    /// A comment; always passes
    Pass,
    /// Sample up to [`SAMPLE_SIZE`] of these elements and require all to exist
    ContextExistence { context: String, elements: Vec<Element> },
    /// Check or act on one element
    Element { element: Element, action: Interaction },
    /// A registered step
    Registered { pattern: String, handler: StepHandler },
}

impl fmt::Debug for ResolvedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedStep::Pass => f.write_str("Pass"),
            ResolvedStep::ContextExistence { context, elements } => f
                .debug_struct("ContextExistence")
                .field("context", context)
                .field("elements", &elements.len())
                .finish(),
            ResolvedStep::Element { element, action } => f
                .debug_struct("Element")
                .field("element", &element.identifier)
                .field("action", action)
                .finish(),
            ResolvedStep::Registered { pattern, .. } => {
                f.debug_struct("Registered").field("pattern", pattern).finish()
            }
        }
    }
}

impl ResolvedStep {
    pub fn evaluate(&self, ctx: &mut StepContext<'_>) -> bool {
        match self {
            ResolvedStep::Pass => true,
            ResolvedStep::ContextExistence { context, elements } => {
                context_exists(ctx, context, elements)
            }
            ResolvedStep::Element { element, action: Interaction::Existence } => {
                element_exists(ctx, element)
            }
            ResolvedStep::Element { element, action } => perform(ctx, element, *action),
            ResolvedStep::Registered { handler, .. } => handler(ctx),
        }
    }
}

/// Check a random sample of the context's elements.
///
/// A context without sampleable elements is trivially displayed.
fn context_exists(ctx: &mut StepContext<'_>, context: &str, elements: &[Element]) -> bool {
    let sample: Vec<&Element> = elements.choose_multiple(&mut *ctx.rng, SAMPLE_SIZE).collect();
    debug!(
        context,
        sampled = ?sample.iter().map(|e| e.identifier.as_str()).collect::<Vec<_>>(),
        "context existence"
    );
    let mut all = true;
    for element in sample {
        if !element_exists(ctx, element) {
            ctx.logf(&format!("[missing: {}]", element.identifier));
            all = false;
        }
    }
    all
}

/// Probe for one element, swiping per its discovery hint when it is not
/// immediately found.
pub fn element_exists(ctx: &mut StepContext<'_>, element: &Element) -> bool {
    let target = match element.kind {
        ElementKind::Keyboard => ctx.driver.query(ElementKind::Keyboard, Locator::Any),
        kind if kind.is_text_like() => {
            ctx.driver.query(kind, Locator::LabelContains(element.identifier.clone()))
        }
        kind => ctx.driver.query(kind, Locator::Identifier(element.identifier.clone())),
    };
    if ctx.driver.exists(&target, ctx.timeout) {
        return true;
    }

    let swipe = match element.discovery {
        Discovery::None => return false,
        Discovery::SwipeUp => Interaction::SwipeUp,
        Discovery::SwipeDown => Interaction::SwipeDown,
    };
    for attempt in 1..=SWIPE_ATTEMPTS {
        if let Err(e) = ctx.driver.perform(&ElementRef::root(), swipe) {
            debug!(element = %element.identifier, error = %e, "discovery swipe failed");
            return false;
        }
        if ctx.driver.exists(&target, SWIPE_RECHECK_TIMEOUT) {
            debug!(element = %element.identifier, attempt, "discovered");
            return true;
        }
    }
    false
}

/// Perform an action, trying identifier variants until one succeeds.
///
/// The step's outcome is that the action was attempted, so this always
/// returns true. Only a successful interaction is reported to the machine.
fn perform(ctx: &mut StepContext<'_>, element: &Element, action: Interaction) -> bool {
    for candidate in identifier_variants(element) {
        let target = ctx.driver.query(element.kind, Locator::Identifier(candidate.clone()));
        match ctx.driver.perform(&target, action) {
            Ok(()) => {
                debug!(element = %element.identifier, via = %candidate, %action, "performed");
                ctx.report(&ElementInteraction::new(action, element.identifier.clone()));
                return true;
            }
            Err(e) => debug!(candidate = %candidate, error = %e, "interaction attempt failed"),
        }
    }
    warn!(element = %element.identifier, %action, "interaction failed for every identifier variant");
    ctx.logf(&format!("[could not {} {}]", action, element.identifier));
    true
}

/// Identifier, name, capitalized, lower and upper case, without repeats.
pub fn identifier_variants(element: &Element) -> Vec<String> {
    let id = &element.identifier;
    let mut capitalized = String::with_capacity(id.len());
    let mut chars = id.chars();
    if let Some(first) = chars.next() {
        capitalized.extend(first.to_uppercase());
        capitalized.push_str(chars.as_str());
    }
    let mut variants: Vec<String> = Vec::with_capacity(5);
    for candidate in [
        id.clone(),
        element.name.clone(),
        capitalized,
        id.to_lowercase(),
        id.to_uppercase(),
    ] {
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}
