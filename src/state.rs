//! Context state machine
//!
//! Tracks which context (screen) the application is in and how far each
//! outgoing transition has progressed. Every successful interaction is
//! reported through [`ContextMachine::action_performed`]; when it completes
//! the required action sequence for a destination, the machine moves there.
//!
//! The machine owns every live [`ContextInstance`]: the current one, and the
//! navigation stack holding its ancestors. An instance refers to its parent by
//! [`InstanceId`] only, so dropping an instance that leaves the stack is all it
//! takes to discard unreachable state.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info};

use crate::error::{ErrorKind, SpecError};
use crate::model::{Application, Context, ContextId, ContextTransition, Direction, ElementInteraction};

/// Identity of a context instance (not of the context it represents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A live visit of a context
#[derive(Debug, Clone)]
pub struct ContextInstance {
    pub id: InstanceId,
    pub context: Context,
    pub parent: Option<InstanceId>,
    /// Full action sequence required per destination
    destinations: BTreeMap<ContextId, ContextTransition>,
    /// Progress so far per destination; always a prefix of `destinations`
    progress: BTreeMap<ContextId, ContextTransition>,
}

impl ContextInstance {
    fn new(id: InstanceId, context: &Context, application: &Application, parent: Option<InstanceId>) -> Self {
        let mut destinations = BTreeMap::new();
        let mut progress = BTreeMap::new();
        for transition in application.transitions_from(&context.id) {
            progress.insert(transition.destination.clone(), transition.unfulfilled());
            destinations.insert(transition.destination.clone(), transition.clone());
        }
        Self {
            id,
            context: context.clone(),
            parent,
            destinations,
            progress,
        }
    }

    /// Actions performed so far towards `destination`.
    pub fn progress(&self, destination: &str) -> &[ElementInteraction] {
        self.progress
            .get(destination)
            .map(|t| t.actions.as_slice())
            .unwrap_or(&[])
    }

    /// The full transition to `destination`, if there is one.
    pub fn destination(&self, destination: &str) -> Option<&ContextTransition> {
        self.destinations.get(destination)
    }

    pub fn destinations(&self) -> impl Iterator<Item = &ContextTransition> {
        self.destinations.values()
    }

    fn clear_progress(&mut self) {
        for transition in self.progress.values_mut() {
            transition.actions.clear();
        }
    }
}

type Observer = Box<dyn FnMut(&ContextInstance)>;

/// The navigation state of the application under test
pub struct ContextMachine {
    application: Rc<Application>,
    current: ContextInstance,
    /// Ancestors of `current`, outermost first
    stack: Vec<ContextInstance>,
    initial_id: InstanceId,
    initial_context: ContextId,
    next_id: u64,
    observers: Vec<Observer>,
}

impl fmt::Debug for ContextMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextMachine")
            .field("current", &self.current.context.id)
            .field("stack", &self.stack.iter().map(|i| &i.context.id).collect::<Vec<_>>())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ContextMachine {
    /// Seed the machine with `initial`, which must be a declared context.
    pub fn new(application: Rc<Application>, initial: &str) -> Result<Self, SpecError> {
        let context = application.context(initial).ok_or_else(|| {
            SpecError::new(
                ErrorKind::InitialContextUndefined,
                format!("initial context '{}' is not declared", initial),
            )
        })?;
        let initial_id = InstanceId(0);
        let current = ContextInstance::new(initial_id, context, &application, None);
        let initial_context = context.id.clone();
        Ok(Self {
            application,
            current,
            stack: Vec::new(),
            initial_id,
            initial_context,
            next_id: 1,
            observers: Vec::new(),
        })
    }

    /// Seed the machine with the model's own initial context.
    pub fn from_application(application: Rc<Application>) -> Result<Self, SpecError> {
        let initial = application.initial_context.clone().ok_or_else(|| {
            SpecError::new(ErrorKind::InitialContextUndefined, "no initial context declared")
        })?;
        Self::new(application, &initial)
    }

    pub fn application(&self) -> &Application {
        &self.application
    }

    pub fn current(&self) -> &ContextInstance {
        &self.current
    }

    pub fn current_context(&self) -> &Context {
        &self.current.context
    }

    /// The navigation stack, outermost first.
    pub fn stack(&self) -> &[ContextInstance] {
        &self.stack
    }

    /// Register an observer called after every change of the current context.
    pub fn subscribe(&mut self, observer: impl FnMut(&ContextInstance) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Report an interaction that was performed in the current context.
    ///
    /// Every destination whose next required action is `interaction` takes
    /// it as progress. Destinations it completes are then tried in
    /// destination order until one actually transitions. Returns whether
    /// the current context changed. Destinations whose next required action
    /// differs are left untouched.
    pub fn action_performed(&mut self, interaction: &ElementInteraction) -> bool {
        let mut advancing = Vec::new();
        let mut completed = Vec::new();

        for (key, required) in &self.current.destinations {
            let done = self.current.progress(key).len();
            let remaining = &required.actions[done.min(required.actions.len())..];
            match remaining.first() {
                Some(next) if next == interaction => {
                    if remaining.len() == 1 {
                        completed.push(key.clone());
                    } else {
                        advancing.push(key.clone());
                    }
                }
                _ => {}
            }
        }

        for key in advancing {
            if let Some(progress) = self.current.progress.get_mut(&key) {
                progress.actions.push(interaction.clone());
                debug!(
                    context = %self.current.context.id,
                    destination = %key,
                    done = progress.actions.len(),
                    "transition progress"
                );
            }
        }

        for key in completed {
            if let Some(progress) = self.current.progress.get_mut(&key) {
                progress.actions.clear();
            }
            let Some(transition) = self.current.destinations.get(&key).cloned() else {
                continue;
            };
            if self.transition_context(&transition) {
                return true;
            }
        }
        false
    }

    /// Move along `transition`. Returns whether the current context changed.
    ///
    /// A backwards transition only fires when its destination is the parent
    /// of the current instance; otherwise it does nothing.
    pub fn transition_context(&mut self, transition: &ContextTransition) -> bool {
        match transition.direction {
            Direction::Forwards => {
                let application = Rc::clone(&self.application);
                let Some(context) = application.context(&transition.destination) else {
                    return false;
                };
                let id = self.next_instance_id();
                let next = ContextInstance::new(id, context, &application, Some(self.current.id));
                let previous = std::mem::replace(&mut self.current, next);
                info!(from = %previous.context.id, to = %self.current.context.id, "transition");
                self.stack.push(previous);
            }
            Direction::Backwards => {
                let Some(parent_id) = self.current.parent else {
                    return false;
                };
                let Some(position) = self.stack.iter().rposition(|i| i.id == parent_id) else {
                    return false;
                };
                if self.stack[position].context.id != transition.destination {
                    debug!(
                        context = %self.current.context.id,
                        destination = %transition.destination,
                        "backwards transition does not lead to parent"
                    );
                    return false;
                }
                let parent = self.stack.remove(position);
                self.stack.truncate(position);
                let previous = std::mem::replace(&mut self.current, parent);
                info!(from = %previous.context.id, to = %self.current.context.id, "transition back");
            }
        }
        self.notify();
        true
    }

    /// Jump straight to a context, optionally keeping the current instance
    /// as the new instance's parent.
    pub fn set_context(&mut self, id: &str, preserve_history: bool) -> Result<(), SpecError> {
        let application = Rc::clone(&self.application);
        let context = application
            .context(id)
            .ok_or_else(|| SpecError::config(format!("no context named '{}'", id)))?;
        if context.id == self.current.context.id {
            return Ok(());
        }
        let parent = preserve_history.then_some(self.current.id);
        let instance_id = self.next_instance_id();
        let next = ContextInstance::new(instance_id, context, &application, parent);
        let previous = std::mem::replace(&mut self.current, next);
        if preserve_history {
            self.stack.push(previous);
        } else {
            self.stack.clear();
        }
        info!(to = %self.current.context.id, preserve_history, "context set");
        self.notify();
        Ok(())
    }

    /// Return to the initial instance, discarding the navigation stack and
    /// all partial progress.
    pub fn reset(&mut self) {
        let changed = self.current.id != self.initial_id;
        self.stack.clear();
        if let Some(context) = self.application.context(&self.initial_context) {
            self.current = ContextInstance::new(self.initial_id, context, &self.application, None);
        } else {
            self.current.clear_progress();
        }
        if changed {
            debug!(to = %self.current.context.id, "context machine reset");
            self.notify();
        }
    }

    fn next_instance_id(&mut self) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        id
    }

    fn notify(&mut self) {
        for observer in self.observers.iter_mut() {
            observer(&self.current);
        }
    }
}
