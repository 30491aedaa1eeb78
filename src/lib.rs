//! emx-featurespec: A Gherkin feature engine for UI scenario testing
//!
//! Feature files are checked against a navigational model of the application
//! under test: a set of contexts (screens), the elements each one shows, and
//! the interactions that move between them.
//!
//! # Overview
//!
//! Step text is never bound to code by hand for the common cases. The model
//! declares phrase templates (`the $PARAMETER screen is displayed`,
//! `I tap $PARAMETER`) which expand over the elements of the *current*
//! context, so the same phrase means different things depending on where the
//! application is when the step is reached. Steps that need custom logic can
//! still be registered explicitly, globally or for a single context.
//!
//! # Feature Syntax
//!
//! ```text
//! @smoke
//! Feature: Signing in
//!
//!   Scenario: Open the login screen
//!     Given the Home screen is displayed
//!     When I tap Log in
//!     Then the Login screen is displayed
//!     And I tap Username
//!
//!   Scenario Outline: Reach a screen
//!     Given the <from> screen is displayed
//!     When I tap <button>
//!     Then the <to> screen is displayed
//!     Examples:
//!     | from | button | to     |
//!     | Home | Log in | Login  |
//!     | Home | Search | Search |
//! ```
//!
//! # Clauses
//!
//! | Keyword | Meaning |
//! |---------|---------|
//! | `Given` | starts the precondition clause |
//! | `When` | starts the action clause (optional) |
//! | `Then` | starts the outcome clause |
//! | `And` | conjunction with the previous step |
//! | `Or` | disjunction with the clause so far |
//! | `But` | conjunction with the negated step |
//!
//! # Tag Filters
//!
//! `--tags "@smoke and not (@slow or @wip)"` runs only the scenarios whose
//! feature and scenario tags satisfy the expression.

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod expr;
pub mod model;
pub mod outline;
pub mod parser;
pub mod report;
pub mod runner;
pub mod state;
pub mod steps;
pub mod tags;

pub use config::{load_application, parse_application};
pub use driver::{AppState, Driver, ElementRef, Locator, RecordingDriver};
pub use engine::{StepRegistry, StepResolver};
pub use error::{ErrorKind, SpecError};
pub use expr::Expr;
pub use model::{
    Application, Context, ContextTransition, Direction, Discovery, Element, ElementInteraction, ElementKind,
    Interaction, ParameterizedStep, StepCategory,
};
pub use parser::{compose, parse_feature, parse_scenarios, ComposedScenario, Feature, Scenario, ScenarioKind};
pub use report::{failures, FeatureReport, InstanceReport, ReportStatistics, ScenarioReport, ScenarioResult, TestReport};
pub use runner::{classify, RunConfig, Runner, RunnerBuilder};
pub use state::{ContextInstance, ContextMachine, InstanceId};
pub use steps::{ResolvedStep, StepContext, StepHandler};
pub use tags::TagExpression;

// Convenience function for cargo test integration
pub use runner::assert_report;
