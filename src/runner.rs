//! Scenario runner
//!
//! Orchestrates a run: parses feature text, gates scenarios on the tag
//! filter, expands outlines, evaluates each scenario's clauses against the
//! driver and the context machine, retries failures and classifies the
//! outcome, and accumulates reports.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::driver::{AppState, Driver};
use crate::engine::{StepRegistry, StepResolver};
use crate::error::SpecError;
use crate::model::Application;
use crate::outline;
use crate::parser::{compose, parse_feature, parse_scenarios, Clause, ComposedScenario, Scenario, ScenarioKind};
use crate::report::{
    failures, FeatureReport, InstanceReport, ReportStatistics, ScenarioReport, ScenarioResult, TestReport,
};
use crate::state::ContextMachine;
use crate::steps::StepContext;
use crate::tags::TagExpression;

/// Default wait for each existence check
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Additional attempts after a failed first run
    pub retry: usize,
    /// Tag filter expression; `None` runs every scenario
    pub tags: Option<String>,
    /// Upper bound for each existence check
    pub timeout: Duration,
    /// Seed for existence sampling; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Status symbols in summaries
    pub symbols: bool,
    /// Arguments passed when launching the application
    pub launch_args: Vec<String>,
    /// Relaunch the application before every scenario attempt, not only
    /// once per run; the context machine is reset before every attempt either way
    pub reset_each_scenario: bool,
    /// Overrides the model's initial context
    pub initial_context: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            retry: 0,
            tags: None,
            timeout: DEFAULT_TIMEOUT,
            seed: None,
            symbols: true,
            launch_args: Vec::new(),
            reset_each_scenario: false,
            initial_context: None,
        }
    }
}

impl RunConfig {
    /// Read `--retry N` and `--tags EXPR` (or `--flag=value`) from
    /// process-style arguments. Other arguments are ignored.
    pub fn from_args<I, S>(args: I) -> Result<Self, SpecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value.to_string())),
                None => (arg.as_str(), None),
            };
            if flag != "--retry" && flag != "--tags" {
                continue;
            }
            let value = match inline.or_else(|| iter.next().cloned()) {
                Some(value) => value,
                None => return Err(SpecError::config(format!("{} requires a value", flag))),
            };
            if flag == "--retry" {
                config.retry = value
                    .trim()
                    .parse()
                    .map_err(|_| SpecError::config(format!("invalid retry count '{}'", value)))?;
            } else {
                config.tags = Some(value);
            }
        }
        Ok(config)
    }
}

/// Classify the attempts of one scenario.
///
/// A passing first attempt is a success. Otherwise the scenario is flaky
/// when at least half of all attempts (rounded up) passed, and fails with
/// the first failure when fewer did.
pub fn classify(attempts: Vec<ScenarioResult>) -> ScenarioResult {
    let Some(first) = attempts.first() else {
        return ScenarioResult::Success;
    };
    if first.is_success() || attempts.len() == 1 {
        return first.clone();
    }
    let passes = attempts.iter().filter(|a| a.is_success()).count();
    if passes >= (attempts.len() + 1) / 2 {
        ScenarioResult::Flaky(attempts)
    } else {
        first.clone()
    }
}

/// Runs features against a driver
pub struct Runner<D: Driver> {
    config: RunConfig,
    application: Rc<Application>,
    driver: D,
    machine: ContextMachine,
    registry: StepRegistry,
    resolver: StepResolver,
    rng: ChaCha8Rng,
    tag_filter: Option<Result<TagExpression, SpecError>>,
    reports: Vec<TestReport>,
}

impl<D: Driver> fmt::Debug for Runner<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("machine", &self.machine)
            .field("steps", &self.registry.len())
            .field("reports", &self.reports.len())
            .finish()
    }
}

impl<D: Driver> Runner<D> {
    /// Create a runner. Fails when no usable initial context is named.
    pub fn new(application: Application, driver: D, config: RunConfig) -> Result<Self, SpecError> {
        let application = Rc::new(application);
        let machine = match config.initial_context {
            Some(ref initial) => ContextMachine::new(Rc::clone(&application), initial)?,
            None => ContextMachine::from_application(Rc::clone(&application))?,
        };
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let tag_filter = config.tags.as_deref().map(|expr| {
            let compiled = TagExpression::compile(expr);
            if let Err(ref e) = compiled {
                warn!(error = %e, "tag filter not recognized, gated scenarios will not run");
            }
            compiled
        });
        Ok(Self {
            config,
            application,
            driver,
            machine,
            registry: StepRegistry::new(),
            resolver: StepResolver::new(),
            rng,
            tag_filter,
            reports: Vec::new(),
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn application(&self) -> &Application {
        &self.application
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn machine(&self) -> &ContextMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut ContextMachine {
        &mut self.machine
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Get mutable access to the registry (for registering and removing steps)
    pub fn registry_mut(&mut self) -> &mut StepRegistry {
        &mut self.registry
    }

    /// Register a step for every context.
    pub fn register_step<F>(&mut self, pattern: impl Into<String>, handler: F)
    where
        F: Fn(&mut StepContext<'_>) -> bool + 'static,
    {
        self.registry.register(pattern, handler);
    }

    /// Register a step that only applies in `context`.
    pub fn register_step_for<F>(&mut self, context: impl Into<String>, pattern: impl Into<String>, handler: F)
    where
        F: Fn(&mut StepContext<'_>) -> bool + 'static,
    {
        self.registry.register_for(context, pattern, handler);
    }

    /// Jump straight to a context.
    pub fn set_context(&mut self, id: &str, preserve_history: bool) -> Result<(), SpecError> {
        self.machine.set_context(id, preserve_history)
    }

    /// Every step phrase that resolves in the given context.
    pub fn phrases(&mut self, context: &str) -> Result<Vec<String>, SpecError> {
        let context = self
            .application
            .context(context)
            .ok_or_else(|| SpecError::config(format!("no context named '{}'", context)))?;
        Ok(self.resolver.phrases(&self.registry, &self.application, context))
    }

    /// Every report produced so far
    pub fn reports(&self) -> &[TestReport] {
        &self.reports
    }

    pub fn overall_statistics(&self) -> ReportStatistics {
        let mut stats = ReportStatistics::default();
        for report in &self.reports {
            stats.merge(&report.statistics());
        }
        stats
    }

    /// Run every scenario of a feature document.
    pub fn execute_feature(&mut self, text: &str) -> Result<TestReport, SpecError> {
        let feature = parse_feature(text)?;
        info!(feature = %feature.name, scenarios = feature.scenarios.len(), "executing feature");
        if !self.config.reset_each_scenario {
            self.relaunch()?;
        }
        let mut scenarios = Vec::with_capacity(feature.scenarios.len());
        for scenario in &feature.scenarios {
            let mut tags = feature.tags.clone();
            for tag in &scenario.tags {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
            scenarios.push(self.run_scenario(scenario, &tags)?);
        }
        let report = TestReport::Feature(FeatureReport { feature, scenarios });
        self.reports.push(report.clone());
        Ok(report)
    }

    /// Run a document made only of scenarios.
    pub fn execute_scenarios(&mut self, text: &str) -> Result<TestReport, SpecError> {
        let parsed = parse_scenarios(text)?;
        info!(scenarios = parsed.len(), "executing scenarios");
        if !self.config.reset_each_scenario {
            self.relaunch()?;
        }
        let mut scenarios = Vec::with_capacity(parsed.len());
        for scenario in &parsed {
            scenarios.push(self.run_scenario(scenario, &scenario.tags)?);
        }
        let report = TestReport::Scenarios(scenarios);
        self.reports.push(report.clone());
        Ok(report)
    }

    /// Terminate a foreground application, launch it and reset the machine.
    fn relaunch(&mut self) -> Result<(), SpecError> {
        if self.driver.app_state() == AppState::RunningForeground {
            self.driver.terminate();
        }
        self.driver.launch(&self.config.launch_args)?;
        self.machine.reset();
        debug!(args = ?self.config.launch_args, "application launched");
        Ok(())
    }

    /// Why a scenario with these tags must not run, if it must not.
    fn gate(&self, tags: &[String]) -> Option<SpecError> {
        match self.tag_filter {
            None => None,
            Some(Err(ref e)) => Some(e.clone()),
            Some(Ok(ref filter)) if filter.matches(tags) => None,
            Some(Ok(ref filter)) => Some(SpecError::tag_mismatch(&tags.join(" "), filter.source())),
        }
    }

    fn run_scenario(&mut self, scenario: &Scenario, tags: &[String]) -> Result<ScenarioReport, SpecError> {
        if let Some(reason) = self.gate(tags) {
            info!(scenario = %scenario.name, reason = %reason, "scenario not executed");
            return Ok(ScenarioReport::Scenario {
                scenario: scenario.clone(),
                result: ScenarioResult::NotExecuted(reason),
                log: String::new(),
            });
        }

        if scenario.kind == ScenarioKind::Plain {
            let (result, log) = self.run_with_retry(&scenario.text)?;
            info!(scenario = %scenario.name, result = %result, "scenario finished");
            return Ok(ScenarioReport::Scenario { scenario: scenario.clone(), result, log });
        }

        let texts = match outline::expand(&scenario.text, scenario.kind) {
            Ok(texts) => texts,
            Err(e) => {
                return Ok(ScenarioReport::Scenario {
                    scenario: scenario.clone(),
                    result: ScenarioResult::Failure(e.with_location("scenario", scenario.line)),
                    log: String::new(),
                });
            }
        };
        let mut instances = Vec::with_capacity(texts.len());
        for text in texts {
            let (result, log) = self.run_with_retry(&text)?;
            debug!(scenario = %scenario.name, instance = instances.len() + 1, result = %result, "instance finished");
            instances.push(InstanceReport { text, result, log });
        }
        let report = ScenarioReport::Outline { scenario: scenario.clone(), kind: scenario.kind, instances };
        info!(scenario = %scenario.name, result = %report.aggregate(), "scenario finished");
        Ok(report)
    }

    /// Run one concrete scenario, retrying a failed first attempt.
    fn run_with_retry(&mut self, text: &str) -> Result<(ScenarioResult, String), SpecError> {
        let mut log = String::new();
        let composed = match compose(text) {
            Ok(composed) => composed,
            Err(e) => return Ok((ScenarioResult::Failure(e), log)),
        };

        let total = 1 + self.config.retry;
        let mut attempts = Vec::with_capacity(total);
        for attempt in 1..=total {
            if attempt > 1 {
                log.push_str(&format!("[retry {} of {}]\n", attempt - 1, self.config.retry));
            }
            let result = self.run_attempt(&composed, &mut log)?;
            let passed = result.is_success();
            if !passed && attempt < total {
                warn!(attempt, result = %result, "scenario attempt failed, retrying");
            }
            attempts.push(result);
            if attempt == 1 && passed {
                break;
            }
        }
        Ok((classify(attempts), log))
    }

    fn run_attempt(&mut self, composed: &ComposedScenario, log: &mut String) -> Result<ScenarioResult, SpecError> {
        if self.config.reset_each_scenario {
            self.relaunch()?;
        } else {
            self.machine.reset();
        }
        log.push_str(&format!("[context: {}]\n", self.machine.current_context().name));
        for clause in [Some(&composed.given), composed.when.as_ref(), Some(&composed.then)]
            .into_iter()
            .flatten()
        {
            match self.evaluate_clause(clause, log) {
                Ok(true) => {}
                Ok(false) => return Ok(ScenarioResult::Failure(SpecError::step_failure(&clause.text()))),
                Err(e) => return Ok(ScenarioResult::Failure(e)),
            }
        }
        Ok(ScenarioResult::Success)
    }

    /// Evaluate a clause, resolving each step against the context that is
    /// current when the step is reached.
    fn evaluate_clause(&mut self, clause: &Clause, log: &mut String) -> Result<bool, SpecError> {
        let Self { config, application, driver, machine, registry, resolver, rng, .. } = self;
        let application: &Application = application;
        let registry: &StepRegistry = registry;
        let timeout = config.timeout;
        clause.expr.try_evaluate(&mut |line: &String| -> Result<bool, SpecError> {
            log.push_str(&format!("> {}\n", line));
            let step = resolver.resolve(line, registry, application, machine.current_context())?;
            let mut ctx = StepContext {
                driver: &mut *driver,
                machine: &mut *machine,
                rng: &mut *rng,
                timeout,
                log: &mut *log,
            };
            let ok = step.evaluate(&mut ctx);
            if !ok {
                debug!(step = %line, "step evaluated to false");
            }
            Ok(ok)
        })
    }
}

/// Builder API for convenient runner construction
pub struct RunnerBuilder {
    application: Application,
    config: RunConfig,
    registry: StepRegistry,
}

impl RunnerBuilder {
    /// Start building a runner for the given application model
    pub fn new(application: Application) -> Self {
        Self {
            application,
            config: RunConfig::default(),
            registry: StepRegistry::new(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn retry(mut self, retry: usize) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn tags(mut self, expr: impl Into<String>) -> Self {
        self.config.tags = Some(expr.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn symbols(mut self, symbols: bool) -> Self {
        self.config.symbols = symbols;
        self
    }

    pub fn launch_args(mut self, args: Vec<String>) -> Self {
        self.config.launch_args = args;
        self
    }

    pub fn reset_each_scenario(mut self, reset: bool) -> Self {
        self.config.reset_each_scenario = reset;
        self
    }

    pub fn initial_context(mut self, id: impl Into<String>) -> Self {
        self.config.initial_context = Some(id.into());
        self
    }

    /// Register a step for every context
    pub fn step<F>(mut self, pattern: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut StepContext<'_>) -> bool + 'static,
    {
        self.registry.register(pattern, handler);
        self
    }

    /// Register a step scoped to one context
    pub fn step_for<F>(mut self, context: impl Into<String>, pattern: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut StepContext<'_>) -> bool + 'static,
    {
        self.registry.register_for(context, pattern, handler);
        self
    }

    /// Build the runner around a driver
    pub fn build<D: Driver>(self, driver: D) -> Result<Runner<D>, SpecError> {
        let mut runner = Runner::new(self.application, driver, self.config)?;
        runner.registry = self.registry;
        Ok(runner)
    }
}

/// Print a report and panic when it did not pass.
///
/// Usage in cargo tests:
/// ```rust,ignore
/// let report = runner.execute_feature(include_str!("login.feature")).unwrap();
/// emx_featurespec::assert_report(&report, false);
/// ```
pub fn assert_report(report: &TestReport, symbols: bool) {
    for scenario in report.scenario_reports() {
        let name = &scenario.scenario().name;
        let result = scenario.aggregate();
        if scenario.passed() {
            eprintln!("PASS  {} ({})", name, result);
            continue;
        }
        eprintln!("FAIL  {}", name);
        let logs: Vec<&str> = match scenario {
            ScenarioReport::Scenario { log, .. } => vec![log.as_str()],
            ScenarioReport::Outline { instances, .. } => instances
                .iter()
                .filter(|i| !i.result.is_passing())
                .map(|i| i.log.as_str())
                .collect(),
        };
        for log in logs.into_iter().filter(|l| !l.is_empty()) {
            eprintln!("  --- log ---");
            for line in log.lines() {
                eprintln!("  {}", line);
            }
        }
    }

    let stats = report.statistics();
    eprintln!("\n{}", stats.summary(symbols));

    if !stats.passed() {
        panic!("scenario(s) failed:\n{}", failures(report.scenario_reports()).join("\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RecordingDriver;
    use crate::error::ErrorKind;
    use crate::model::{Context, ContextTransition, Direction, Element, ElementInteraction, ElementKind, Interaction, ParameterizedStep, StepCategory};
    use std::cell::Cell;
    use std::collections::BTreeMap;

    fn success() -> ScenarioResult {
        ScenarioResult::Success
    }

    fn failure() -> ScenarioResult {
        ScenarioResult::Failure(SpecError::step_failure("x"))
    }

    #[test]
    fn test_classify_flaky_at_half() {
        let result = classify(vec![failure(), success(), failure(), success()]);
        match result {
            ScenarioResult::Flaky(attempts) => assert_eq!(attempts.len(), 4),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_failure_below_half() {
        assert_eq!(classify(vec![failure(), success(), failure(), failure()]), failure());
        assert_eq!(classify(vec![failure()]), failure());
        assert_eq!(classify(vec![failure(), failure()]), failure());
    }

    #[test]
    fn test_classify_odd_attempts_round_up() {
        // ceil(3 / 2) = 2
        assert!(classify(vec![failure(), success(), success()]).is_flaky());
        assert!(!classify(vec![failure(), success(), failure()]).is_flaky());
    }

    #[test]
    fn test_classify_first_success() {
        assert_eq!(classify(vec![success()]), success());
        assert_eq!(classify(vec![]), success());
    }

    #[test]
    fn test_from_args() {
        let config = RunConfig::from_args(["app", "--retry", "3", "--tags", "@smoke and not @slow", "-x"]).unwrap();
        assert_eq!(config.retry, 3);
        assert_eq!(config.tags.as_deref(), Some("@smoke and not @slow"));

        let config = RunConfig::from_args(["--retry=2", "--tags=@a"]).unwrap();
        assert_eq!(config.retry, 2);
        assert_eq!(config.tags.as_deref(), Some("@a"));

        assert!(RunConfig::from_args(["--retry", "many"]).is_err());
        assert!(RunConfig::from_args(["--tags"]).is_err());

        let config = RunConfig::from_args(Vec::<String>::new()).unwrap();
        assert_eq!(config.retry, 0);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.symbols);
    }

    fn app() -> Application {
        let mut taps = BTreeMap::new();
        taps.insert(Interaction::Tap, vec!["I tap $PARAMETER".to_string()]);
        Application::new()
            .with_initial_context("home")
            .with_context(Context::new("home", "Home").with_element(Element::new("login", "Log in", ElementKind::Button)))
            .with_context(Context::new("login", "Login").with_element(Element::new("username", "Username", ElementKind::TextField)))
            .with_transition(
                "home",
                ContextTransition::new("login", Direction::Forwards, vec![ElementInteraction::new(Interaction::Tap, "login")]),
            )
            .with_steps(
                StepCategory::Context,
                vec![ParameterizedStep::Existence(vec!["the $PARAMETER screen is displayed".into()])],
            )
            .with_steps(StepCategory::Element(ElementKind::Button), vec![ParameterizedStep::Interaction(taps)])
    }

    fn runner(builder: RunnerBuilder) -> Runner<RecordingDriver> {
        builder.seed(1).build(RecordingDriver::all_visible()).unwrap()
    }

    #[test]
    fn test_steps_resolve_against_live_context() {
        let mut r = runner(RunnerBuilder::new(app()));
        let report = r
            .execute_scenarios(
                "Scenario: sign in\nGiven the Home screen is displayed\nWhen I tap Log in\nThen the Login screen is displayed",
            )
            .unwrap();
        assert!(report.passed(), "{:?}", report);
        assert_eq!(r.machine().current_context().id, "login");
        let ScenarioReport::Scenario { log, .. } = &report.scenario_reports()[0] else {
            panic!("expected plain scenario");
        };
        assert!(log.contains("[transition: Home -> Login]"));
    }

    #[test]
    fn test_given_false_is_step_failure() {
        let mut r = runner(RunnerBuilder::new(app()).step("it is raining", |_| false));
        let report = r.execute_scenarios("Scenario: s\nGiven it is raining\nThen the Home screen is displayed").unwrap();
        let result = report.scenario_reports()[0].aggregate();
        let reason = result.reason().unwrap();
        assert_eq!(reason.kind, ErrorKind::StepFailure);
        assert_eq!(reason.step.as_deref(), Some("Given it is raining"));
    }

    #[test]
    fn test_no_matching_step_fails_only_its_scenario() {
        let mut r = runner(RunnerBuilder::new(app()));
        let report = r
            .execute_scenarios(
                "Scenario: bad\nGiven I fly away\nThen the Home screen is displayed\n\
                 Scenario: good\nGiven the Home screen is displayed\nThen the Home screen is displayed",
            )
            .unwrap();
        let reports = report.scenario_reports();
        assert_eq!(reports[0].aggregate().reason().unwrap().kind, ErrorKind::NoMatchingStep);
        assert!(reports[1].passed());
    }

    #[test]
    fn test_retry_classifies_flaky() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        // Fails on attempts 1 and 3, passes on 2 and 4.
        let mut r = runner(RunnerBuilder::new(app()).retry(3).step("the weather is fine", move |_| {
            counter.set(counter.get() + 1);
            counter.get() % 2 == 0
        }));
        let report = r.execute_scenarios("Scenario: s\nGiven the weather is fine\nThen the Home screen is displayed").unwrap();
        assert_eq!(calls.get(), 4);
        assert!(report.scenario_reports()[0].aggregate().is_flaky());
        assert!(report.passed());
    }

    #[test]
    fn test_missing_clause_not_retried() {
        let mut r = runner(RunnerBuilder::new(app()).retry(3));
        let report = r.execute_scenarios("Scenario: s\nGiven the Home screen is displayed").unwrap();
        assert_eq!(report.scenario_reports()[0].aggregate().reason().unwrap().kind, ErrorKind::MissingClause);
    }

    #[test]
    fn test_tag_gating() {
        let text = "@smoke\nScenario: a\nGiven the Home screen is displayed\nThen the Home screen is displayed\n\
                    @slow\nScenario: b\nGiven the Home screen is displayed\nThen the Home screen is displayed";
        let mut r = runner(RunnerBuilder::new(app()).tags("@smoke"));
        let report = r.execute_scenarios(text).unwrap();
        let stats = report.statistics();
        assert_eq!((stats.passed, stats.not_executed), (1, 1));
        assert!(report.passed());

        let mut r = runner(RunnerBuilder::new(app()).tags("@smoke and"));
        let report = r.execute_scenarios(text).unwrap();
        for scenario in report.scenario_reports() {
            let result = scenario.aggregate();
            assert_eq!(result.reason().unwrap().kind, ErrorKind::UnrecognizedTagExpression);
        }
        assert!(!report.passed());
    }

    #[test]
    fn test_launch_handling() {
        let mut r = runner(RunnerBuilder::new(app()).launch_args(vec!["-uitest".into()]));
        let scenario = "Scenario: s\nGiven the Home screen is displayed\nWhen I tap Log in\nThen the Login screen is displayed";
        r.execute_scenarios(scenario).unwrap();
        r.execute_scenarios(scenario).unwrap();
        assert_eq!(r.driver().launches.len(), 2);
        assert_eq!(r.driver().terminations, 1);
        assert_eq!(r.driver().launches[0], vec!["-uitest".to_string()]);
        assert_eq!(r.overall_statistics().passed, 2);
    }

    #[test]
    fn test_each_scenario_starts_in_initial_context() {
        let mut r = runner(RunnerBuilder::new(app()));
        let scenario = "Given the Home screen is displayed\nWhen I tap Log in\nThen the Login screen is displayed";
        let report = r
            .execute_scenarios(&format!("Scenario: first\n{}\nScenario: second\n{}", scenario, scenario))
            .unwrap();
        assert!(report.passed(), "{:?}", report);
        assert_eq!(report.statistics().passed, 2);
        assert_eq!(r.driver().launches.len(), 1);
    }

    #[test]
    fn test_reset_each_scenario() {
        let mut r = runner(RunnerBuilder::new(app()).reset_each_scenario(true));
        let scenario = "Scenario: s\nGiven the Home screen is displayed\nWhen I tap Log in\nThen the Login screen is displayed";
        let report = r.execute_scenarios(&format!("{}\n{}", scenario, scenario.replace("s\n", "t\n"))).unwrap();
        assert!(report.passed(), "{:?}", report);
        assert_eq!(r.driver().launches.len(), 2);
    }

    #[test]
    fn test_malformed_outline_fails_scenario() {
        let mut r = runner(RunnerBuilder::new(app()));
        let report = r
            .execute_scenarios("Scenario Outline: o\nGiven the <s> screen is displayed\nThen x\n| s | t |\n| Home |")
            .unwrap();
        assert_eq!(report.scenario_reports()[0].aggregate().reason().unwrap().kind, ErrorKind::MalformedExamples);
    }

    #[test]
    fn test_initial_context_override() {
        let r = RunnerBuilder::new(app()).initial_context("login").build(RecordingDriver::new()).unwrap();
        assert_eq!(r.machine().current_context().id, "login");
        assert!(format!("{:?}", r).contains("\"login\""));
        let err = RunnerBuilder::new(Application::new()).build(RecordingDriver::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InitialContextUndefined);
    }

    #[test]
    fn test_phrases() {
        let mut r = runner(RunnerBuilder::new(app()).step("I wait", |_| true));
        let phrases = r.phrases("home").unwrap();
        assert_eq!(phrases, vec!["I wait", "the Home screen is displayed", "I tap Log in", "I tap login"]);
        assert!(r.phrases("nowhere").is_err());
    }
}
