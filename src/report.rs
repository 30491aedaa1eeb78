//! Scenario results and reports

use std::fmt;

use crate::error::{ErrorKind, SpecError};
use crate::parser::{Feature, Scenario, ScenarioKind};

/// Outcome of one scenario (or one expanded outline instance)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioResult {
    Success,
    Failure(SpecError),
    /// Failed at first but passed often enough on retry; carries every attempt
    Flaky(Vec<ScenarioResult>),
    NotExecuted(SpecError),
}

impl ScenarioResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ScenarioResult::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ScenarioResult::Failure(_))
    }

    pub fn is_flaky(&self) -> bool {
        matches!(self, ScenarioResult::Flaky(_))
    }

    /// Whether this outcome lets the suite pass.
    ///
    /// Skipping on a tag mismatch is benign; skipping because the tag filter
    /// could not be compiled is not.
    pub fn is_passing(&self) -> bool {
        match self {
            ScenarioResult::Success | ScenarioResult::Flaky(_) => true,
            ScenarioResult::Failure(_) => false,
            ScenarioResult::NotExecuted(reason) => reason.is_benign(),
        }
    }

    pub fn reason(&self) -> Option<&SpecError> {
        match self {
            ScenarioResult::Failure(e) | ScenarioResult::NotExecuted(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ScenarioResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioResult::Success => write!(f, "passed"),
            ScenarioResult::Failure(e) => write!(f, "failed: {}", e),
            ScenarioResult::Flaky(attempts) => {
                let passes = attempts.iter().filter(|a| a.is_success()).count();
                write!(f, "flaky ({} of {} attempts passed)", passes, attempts.len())
            }
            ScenarioResult::NotExecuted(e) => write!(f, "not executed: {}", e),
        }
    }
}

/// One expanded instance of an outline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceReport {
    /// The concrete scenario text that ran
    pub text: String,
    pub result: ScenarioResult,
    pub log: String,
}

/// Report for one scenario of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioReport {
    Scenario {
        scenario: Scenario,
        result: ScenarioResult,
        log: String,
    },
    Outline {
        scenario: Scenario,
        kind: ScenarioKind,
        instances: Vec<InstanceReport>,
    },
}

impl ScenarioReport {
    pub fn scenario(&self) -> &Scenario {
        match self {
            ScenarioReport::Scenario { scenario, .. } | ScenarioReport::Outline { scenario, .. } => scenario,
        }
    }

    /// Per-instance results (a plain scenario has exactly one).
    pub fn results(&self) -> Vec<&ScenarioResult> {
        match self {
            ScenarioReport::Scenario { result, .. } => vec![result],
            ScenarioReport::Outline { instances, .. } => instances.iter().map(|i| &i.result).collect(),
        }
    }

    /// The scenario's overall outcome. An outline fails if any instance
    /// failed, is flaky if any instance was flaky, and passes otherwise.
    pub fn aggregate(&self) -> ScenarioResult {
        let instances = match self {
            ScenarioReport::Scenario { result, .. } => return result.clone(),
            ScenarioReport::Outline { instances, .. } => instances,
        };
        if let Some(failed) = instances.iter().find(|i| !i.result.is_passing()) {
            return failed.result.clone();
        }
        let flaky: Vec<ScenarioResult> = instances
            .iter()
            .filter(|i| i.result.is_flaky())
            .map(|i| i.result.clone())
            .collect();
        if flaky.is_empty() {
            ScenarioResult::Success
        } else {
            ScenarioResult::Flaky(flaky)
        }
    }

    pub fn passed(&self) -> bool {
        self.results().iter().all(|r| r.is_passing())
    }
}

/// Report for a feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureReport {
    pub feature: Feature,
    pub scenarios: Vec<ScenarioReport>,
}

/// Report returned by one `execute_*` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestReport {
    Feature(FeatureReport),
    Scenarios(Vec<ScenarioReport>),
}

impl TestReport {
    pub fn scenario_reports(&self) -> &[ScenarioReport] {
        match self {
            TestReport::Feature(report) => &report.scenarios,
            TestReport::Scenarios(reports) => reports,
        }
    }

    pub fn statistics(&self) -> ReportStatistics {
        ReportStatistics::from_reports(self.scenario_reports())
    }

    pub fn passed(&self) -> bool {
        self.statistics().passed()
    }
}

/// Counts over flattened per-instance results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportStatistics {
    pub passed: usize,
    pub flaky: usize,
    pub failed: usize,
    pub not_executed: usize,
    /// Non-executions caused by an uncompilable tag filter
    pub unrecognized_tags: usize,
}

impl ReportStatistics {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ScenarioResult>) -> Self {
        let mut stats = Self::default();
        for result in results {
            match result {
                ScenarioResult::Success => stats.passed += 1,
                ScenarioResult::Flaky(_) => stats.flaky += 1,
                ScenarioResult::Failure(_) => stats.failed += 1,
                ScenarioResult::NotExecuted(reason) => {
                    stats.not_executed += 1;
                    if reason.kind == ErrorKind::UnrecognizedTagExpression {
                        stats.unrecognized_tags += 1;
                    }
                }
            }
        }
        stats
    }

    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a ScenarioReport>) -> Self {
        let mut results = Vec::new();
        for report in reports {
            results.extend(report.results());
        }
        Self::from_results(results)
    }

    pub fn merge(&mut self, other: &ReportStatistics) {
        self.passed += other.passed;
        self.flaky += other.flaky;
        self.failed += other.failed;
        self.not_executed += other.not_executed;
        self.unrecognized_tags += other.unrecognized_tags;
    }

    pub fn executed(&self) -> usize {
        self.passed + self.flaky + self.failed
    }

    pub fn total(&self) -> usize {
        self.executed() + self.not_executed
    }

    /// Share of executed scenarios, in percent.
    pub fn percentage(&self, count: usize) -> f64 {
        if self.executed() == 0 {
            return 0.0;
        }
        count as f64 / self.executed() as f64 * 100.0
    }

    /// No failures and no scenario skipped by an uncompilable tag filter.
    pub fn passed(&self) -> bool {
        self.failed == 0 && self.unrecognized_tags == 0
    }

    fn line(&self, count: usize, label: &str, symbol: &str, symbols: bool, with_percentage: bool) -> String {
        let suffix = if symbols { format!(" {}", symbol) } else { ".".to_string() };
        if self.total() == 1 {
            let mut label = label.to_string();
            if let Some(first) = label.get_mut(..1) {
                first.make_ascii_uppercase();
            }
            return format!("{}{}", label, suffix);
        }
        if with_percentage {
            format!("{} ({:.1}%) {}{}", count, self.percentage(count), label, suffix)
        } else {
            format!("{} {}{}", count, label, suffix)
        }
    }

    /// Human-readable summary, with or without status symbols.
    pub fn summary(&self, symbols: bool) -> String {
        let mut text = String::from("Summary\n");
        if self.passed > 0 {
            text.push_str(&format!("\t{}\n", self.line(self.passed, "passed", "✅", symbols, true)));
        }
        if self.flaky > 0 {
            text.push_str(&format!("\t{}\n", self.line(self.flaky, "flaky", "⚠️", symbols, true)));
        }
        if self.failed > 0 {
            text.push_str(&format!("\t{}\n", self.line(self.failed, "failed", "❌", symbols, true)));
        }
        if self.not_executed > 0 {
            text.push_str(&format!("\t{}\n", self.line(self.not_executed, "not executed", "⏭️", symbols, false)));
        }
        if self.total() > 1 {
            text.push_str(&format!("\n\tTotal: {} scenarios.\n", self.total()));
        }
        text
    }
}

/// One line per failing (or non-benignly skipped) instance: `name: reason`.
pub fn failures(reports: &[ScenarioReport]) -> Vec<String> {
    let mut lines = Vec::new();
    for report in reports {
        let name = &report.scenario().name;
        match report {
            ScenarioReport::Scenario { result, .. } => {
                if let (false, Some(reason)) = (result.is_passing(), result.reason()) {
                    lines.push(format!("{}: {}", name, reason));
                }
            }
            ScenarioReport::Outline { instances, .. } => {
                for (i, instance) in instances.iter().enumerate() {
                    if let (false, Some(reason)) = (instance.result.is_passing(), instance.result.reason()) {
                        lines.push(format!("{} [{}]: {}", name, i + 1, reason));
                    }
                }
            }
        }
    }
    lines
}
