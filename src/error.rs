//! Feature and step errors

use std::fmt;

/// The kind of error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No application model could be found
    ConfigurationMissing,
    /// The application model document is malformed
    ConfigurationParse,
    /// Neither the runner nor the model names a usable initial context
    InitialContextUndefined,
    /// No registered step, context template or element template matched
    NoMatchingStep,
    /// A resolved step evaluated to false
    StepFailure,
    /// A scenario lacks a GIVEN or a THEN clause
    MissingClause,
    /// The tag filter expression could not be compiled
    UnrecognizedTagExpression,
    /// The scenario's tags do not satisfy the tag filter (benign skip)
    TagMismatch,
    /// The examples table of an outline is not rectangular
    MalformedExamples,
    /// Invalid feature/scenario syntax
    SyntaxError,
    /// The UI automation collaborator reported a failure
    Driver,
    /// IO error
    Io,
}

impl ErrorKind {
    /// Short label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::ConfigurationMissing => "configuration missing",
            ErrorKind::ConfigurationParse => "configuration parse error",
            ErrorKind::InitialContextUndefined => "initial context undefined",
            ErrorKind::NoMatchingStep => "no matching step",
            ErrorKind::StepFailure => "step failure",
            ErrorKind::MissingClause => "missing clause",
            ErrorKind::UnrecognizedTagExpression => "unrecognized tag expression",
            ErrorKind::TagMismatch => "tag mismatch",
            ErrorKind::MalformedExamples => "malformed examples",
            ErrorKind::SyntaxError => "syntax error",
            ErrorKind::Driver => "driver error",
            ErrorKind::Io => "io error",
        }
    }
}

/// An error with optional file/line/step context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecError {
    pub kind: ErrorKind,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    /// The step text the error is attributed to
    pub step: Option<String>,
}

impl SpecError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: None,
            line: None,
            step: None,
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: usize) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigurationParse, msg)
    }

    pub fn driver(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Driver, msg)
    }

    /// A step that could not be resolved against the current context.
    pub fn no_matching_step(step: &str, context: &str) -> Self {
        Self::new(
            ErrorKind::NoMatchingStep,
            format!("didn't know what to do with '{}' in '{}' context", step.trim(), context),
        )
        .with_step(step.trim())
    }

    /// A step (or clause) that evaluated to false.
    pub fn step_failure(step: &str) -> Self {
        Self::new(
            ErrorKind::StepFailure,
            format!("assertion failure for '{}'", step.trim()),
        )
        .with_step(step.trim())
    }

    pub fn missing_clause(which: &str) -> Self {
        Self::new(
            ErrorKind::MissingClause,
            format!("scenario has no {} clause", which),
        )
    }

    pub fn unrecognized_tag_expression(expr: &str) -> Self {
        Self::new(
            ErrorKind::UnrecognizedTagExpression,
            format!("unrecognized tag expression: {}", expr),
        )
    }

    pub fn tag_mismatch(scenario_tags: &str, filter: &str) -> Self {
        Self::new(
            ErrorKind::TagMismatch,
            format!("tags '{}' do not satisfy '{}'", scenario_tags, filter),
        )
    }

    pub fn malformed_examples(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedExamples, msg)
    }

    /// Whether this error aborts a run before any scenario executes.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ConfigurationMissing
                | ErrorKind::ConfigurationParse
                | ErrorKind::InitialContextUndefined
        )
    }

    /// Whether a non-execution for this reason still counts as passing.
    pub fn is_benign(&self) -> bool {
        self.kind == ErrorKind::TagMismatch
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}:", file)?;
        }
        if let Some(line) = self.line {
            write!(f, "{}:", line)?;
        }
        if self.file.is_some() || self.line.is_some() {
            write!(f, " ")?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SpecError {}

impl From<std::io::Error> for SpecError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            return Self::new(ErrorKind::ConfigurationMissing, e.to_string());
        }
        Self::new(ErrorKind::Io, e.to_string())
    }
}

impl From<serde_json::Error> for SpecError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::ConfigurationParse, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_location() {
        let err = SpecError::step_failure("the Home screen is displayed")
            .with_location("login.feature", 7);
        assert_eq!(
            err.to_string(),
            "login.feature:7: assertion failure for 'the Home screen is displayed'"
        );
        assert_eq!(err.step.as_deref(), Some("the Home screen is displayed"));
    }

    #[test]
    fn test_benign_and_fatal() {
        assert!(SpecError::tag_mismatch("@a", "@b").is_benign());
        assert!(!SpecError::unrecognized_tag_expression("@a and").is_benign());
        assert!(SpecError::config("bad").is_fatal());
        assert!(!SpecError::step_failure("x").is_fatal());
    }

    #[test]
    fn test_missing_file_is_configuration_missing() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        assert_eq!(SpecError::from(io).kind, ErrorKind::ConfigurationMissing);
    }
}
