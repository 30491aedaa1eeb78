//! UI automation seam
//!
//! The engine never talks to a device directly. Everything it needs from the
//! automation layer is the small capability set of [`Driver`]: query an
//! element, wait for it to exist, perform an interaction on it, and manage the
//! application process.
//!
//! [`RecordingDriver`] is an in-memory implementation used by the test suite
//! and by the CLI's model-check mode.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::trace;

use crate::error::SpecError;
use crate::model::{ElementKind, Interaction};

/// How an element is located
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// By accessibility identifier
    Identifier(String),
    /// Any element of the kind whose label contains the text (case-insensitive)
    LabelContains(String),
    /// Any element of the kind
    Any,
}

/// An opaque reference to a (possibly absent) element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub kind: ElementKind,
    pub locator: Locator,
}

impl ElementRef {
    pub fn new(kind: ElementKind, locator: Locator) -> Self {
        Self { kind, locator }
    }

    /// The application window itself, target of discovery swipes.
    pub fn root() -> Self {
        Self::new(ElementKind::Other, Locator::Any)
    }
}

/// Lifecycle state of the application under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    NotRunning,
    RunningBackground,
    RunningForeground,
}

/// Capabilities consumed from the UI automation layer
pub trait Driver {
    /// Build a reference to an element. Querying never fails; absence is
    /// discovered through [`Driver::exists`].
    fn query(&mut self, kind: ElementKind, locator: Locator) -> ElementRef {
        ElementRef::new(kind, locator)
    }

    /// Wait up to `timeout` for the element to exist.
    fn exists(&mut self, element: &ElementRef, timeout: Duration) -> bool;

    /// Perform an interaction on the element.
    fn perform(&mut self, element: &ElementRef, action: Interaction) -> Result<(), SpecError>;

    fn app_state(&self) -> AppState;

    fn launch(&mut self, args: &[String]) -> Result<(), SpecError>;

    fn terminate(&mut self);
}

/// In-memory driver that records every interaction.
///
/// Elements are visible when their identifier (or a label containing the
/// queried text) is in the visible set, or always when `all_visible` is set.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    /// Treat every queried element as present
    pub all_visible: bool,
    /// Whether a software keyboard is shown
    pub keyboard_visible: bool,
    visible: HashSet<String>,
    /// Elements that only appear after this many discovery swipes
    hidden: HashMap<String, usize>,
    failing: HashSet<String>,
    swipes: usize,
    state: AppState,
    /// Successful interactions, in order
    pub interactions: Vec<(ElementRef, Interaction)>,
    /// Arguments of every launch, in order
    pub launches: Vec<Vec<String>>,
    /// Number of terminations
    pub terminations: usize,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver on which every element exists (model-check mode).
    pub fn all_visible() -> Self {
        Self {
            all_visible: true,
            keyboard_visible: true,
            ..Self::default()
        }
    }

    pub fn with_visible<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visible.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn show(&mut self, item: impl Into<String>) {
        self.visible.insert(item.into());
    }

    pub fn hide(&mut self, item: &str) {
        self.visible.remove(item);
    }

    /// Make `item` appear only after `swipes` discovery swipes.
    pub fn reveal_after_swipes(&mut self, item: impl Into<String>, swipes: usize) {
        self.hidden.insert(item.into(), swipes);
    }

    /// Make every interaction with `item` fail.
    pub fn fail_on(&mut self, item: impl Into<String>) {
        self.failing.insert(item.into());
    }

    /// Identifiers of tapped-on elements, formatted as `action(id)`.
    pub fn performed(&self) -> Vec<String> {
        self.interactions
            .iter()
            .filter(|(element, _)| *element != ElementRef::root())
            .map(|(element, action)| match element.locator {
                Locator::Identifier(ref id) | Locator::LabelContains(ref id) => {
                    format!("{}({})", action, id)
                }
                Locator::Any => format!("{}(*)", action),
            })
            .collect()
    }

    pub fn swipe_count(&self) -> usize {
        self.swipes
    }

    fn is_visible(&self, item: &str) -> bool {
        if self.all_visible || self.visible.contains(item) {
            return true;
        }
        matches!(self.hidden.get(item), Some(&needed) if self.swipes >= needed)
    }
}

impl Driver for RecordingDriver {
    fn exists(&mut self, element: &ElementRef, _timeout: Duration) -> bool {
        let found = match element.locator {
            Locator::Identifier(ref id) => self.is_visible(id),
            Locator::LabelContains(ref text) => {
                let needle = text.to_lowercase();
                self.all_visible
                    || self
                        .visible
                        .iter()
                        .any(|label| label.to_lowercase().contains(&needle))
            }
            Locator::Any if element.kind == ElementKind::Keyboard => self.keyboard_visible,
            Locator::Any => true,
        };
        trace!(?element, found, "exists");
        found
    }

    fn perform(&mut self, element: &ElementRef, action: Interaction) -> Result<(), SpecError> {
        if *element == ElementRef::root() {
            if matches!(action, Interaction::SwipeUp | Interaction::SwipeDown) {
                self.swipes += 1;
            }
            self.interactions.push((element.clone(), action));
            return Ok(());
        }
        let id = match element.locator {
            Locator::Identifier(ref id) | Locator::LabelContains(ref id) => id.as_str(),
            Locator::Any => "",
        };
        if self.failing.contains(id) {
            return Err(SpecError::driver(format!("cannot {} '{}'", action, id)));
        }
        if element.locator != Locator::Any && !self.is_visible(id) {
            return Err(SpecError::driver(format!("no element '{}' to {}", id, action)));
        }
        self.interactions.push((element.clone(), action));
        Ok(())
    }

    fn app_state(&self) -> AppState {
        self.state
    }

    fn launch(&mut self, args: &[String]) -> Result<(), SpecError> {
        self.launches.push(args.to_vec());
        self.swipes = 0;
        self.state = AppState::RunningForeground;
        Ok(())
    }

    fn terminate(&mut self) {
        self.terminations += 1;
        self.state = AppState::NotRunning;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(1);

    #[test]
    fn test_visible_set() {
        let mut driver = RecordingDriver::new().with_visible(["login"]);
        let login = driver.query(ElementKind::Button, Locator::Identifier("login".into()));
        let other = driver.query(ElementKind::Button, Locator::Identifier("other".into()));
        assert!(driver.exists(&login, TIMEOUT));
        assert!(!driver.exists(&other, TIMEOUT));
    }

    #[test]
    fn test_label_contains() {
        let mut driver = RecordingDriver::new().with_visible(["Welcome back, Ada"]);
        let text = driver.query(ElementKind::Text, Locator::LabelContains("welcome".into()));
        assert!(driver.exists(&text, TIMEOUT));
    }

    #[test]
    fn test_perform_records_and_fails() {
        let mut driver = RecordingDriver::new().with_visible(["login", "broken"]);
        driver.fail_on("broken");
        let login = driver.query(ElementKind::Button, Locator::Identifier("login".into()));
        let broken = driver.query(ElementKind::Button, Locator::Identifier("broken".into()));
        let absent = driver.query(ElementKind::Button, Locator::Identifier("absent".into()));
        driver.perform(&login, Interaction::Tap).unwrap();
        assert_eq!(driver.perform(&broken, Interaction::Tap).unwrap_err().kind, crate::error::ErrorKind::Driver);
        assert!(driver.perform(&absent, Interaction::Tap).is_err());
        assert_eq!(driver.performed(), vec!["tap(login)"]);
    }

    #[test]
    fn test_reveal_after_swipes() {
        let mut driver = RecordingDriver::new();
        driver.reveal_after_swipes("row-9", 2);
        let row = driver.query(ElementKind::Cell, Locator::Identifier("row-9".into()));
        assert!(!driver.exists(&row, TIMEOUT));
        driver.perform(&ElementRef::root(), Interaction::SwipeUp).unwrap();
        assert!(!driver.exists(&row, TIMEOUT));
        driver.perform(&ElementRef::root(), Interaction::SwipeUp).unwrap();
        assert!(driver.exists(&row, TIMEOUT));
        assert_eq!(driver.swipe_count(), 2);
    }

    #[test]
    fn test_launch_lifecycle() {
        let mut driver = RecordingDriver::new();
        assert_eq!(driver.app_state(), AppState::NotRunning);
        driver.launch(&["-reset".to_string()]).unwrap();
        assert_eq!(driver.app_state(), AppState::RunningForeground);
        driver.terminate();
        assert_eq!(driver.app_state(), AppState::NotRunning);
        assert_eq!(driver.launches, vec![vec!["-reset".to_string()]]);
        assert_eq!(driver.terminations, 1);
    }
}
