//! Integration test: run the fixture features via cargo test
//!
//! Every `.feature` file in `tests/features/` is checked against
//! `tests/features/app.json` with a driver on which every declared element
//! is present.
//!
//! Usage:
//!   cargo test --test integration

use std::fs;
use std::path::PathBuf;

use emx_featurespec::{
    assert_report, load_application, Application, ErrorKind, RecordingDriver, RunConfig, Runner, RunnerBuilder,
    ScenarioReport, ScenarioResult,
};

fn features_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/features")
}

fn application() -> Application {
    load_application(features_dir().join("app.json")).unwrap()
}

fn feature(name: &str) -> String {
    fs::read_to_string(features_dir().join(name)).unwrap()
}

fn runner(builder: RunnerBuilder) -> Runner<RecordingDriver> {
    builder.seed(7).build(RecordingDriver::all_visible()).unwrap()
}

#[test]
fn features_all() {
    let mut files: Vec<PathBuf> = fs::read_dir(features_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "feature"))
        .collect();
    files.sort();
    assert!(!files.is_empty());

    let mut runner = runner(RunnerBuilder::new(application()));
    for file in &files {
        let report = runner.execute_feature(&fs::read_to_string(file).unwrap()).unwrap();
        assert_report(&report, false);
    }

    let stats = runner.overall_statistics();
    // 4 navigation scenarios, 2 outline rows, 4 permutations
    assert_eq!(stats.passed, 10);
    assert_eq!(stats.total(), 10);
}

#[test]
fn default_config_starts_each_scenario_at_initial_context() {
    let config = RunConfig { seed: Some(7), ..RunConfig::default() };
    let mut runner = Runner::new(application(), RecordingDriver::all_visible(), config).unwrap();
    let report = runner.execute_feature(&feature("navigation.feature")).unwrap();
    assert_report(&report, false);
    assert_eq!(report.statistics().passed, 4);
    assert_eq!(runner.driver().launches.len(), 1);
}

#[test]
fn relaunch_per_scenario() {
    let mut runner = runner(RunnerBuilder::new(application()).reset_each_scenario(true));
    let report = runner.execute_feature(&feature("navigation.feature")).unwrap();
    assert!(report.passed(), "{:?}", report);
    assert_eq!(runner.driver().launches.len(), 4);
}

#[test]
fn tag_filter_selects_scenarios() {
    let text = feature("navigation.feature");

    let mut smoke = runner(RunnerBuilder::new(application()).tags("@smoke"));
    let stats = smoke.execute_feature(&text).unwrap().statistics();
    assert_eq!((stats.passed, stats.not_executed), (1, 3));

    // Feature tags are inherited by every scenario.
    let mut rest = runner(RunnerBuilder::new(application()).tags("@nav and not (@smoke or @slow)"));
    let report = rest.execute_feature(&text).unwrap();
    let stats = report.statistics();
    assert_eq!((stats.passed, stats.not_executed), (2, 2));
    assert!(report.passed());
}

#[test]
fn navigation_follows_transition_map() {
    let mut runner = runner(RunnerBuilder::new(application()));
    let report = runner
        .execute_scenarios(
            "Scenario: sign in\n\
             Given the Home screen is displayed\n\
             When I tap Log in\n\
             And I tap the Password field\n\
             And I tap the Username field\n\
             And I tap Sign in\n\
             Then the Login screen is displayed",
        )
        .unwrap();
    // Out of order: only the username tap counted, so the dashboard
    // transition has not fired.
    assert!(report.passed(), "{:?}", report);
    assert_eq!(runner.machine().current_context().id, "login");
    let progress = runner.machine().current().progress("dashboard");
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].element, "username");
}

#[test]
fn unknown_step_suggests_phrases() {
    let mut runner = runner(RunnerBuilder::new(application()));
    let report = runner
        .execute_scenarios("Scenario: typo\nGiven the Home screen is displayd\nThen I tap Log in")
        .unwrap();
    let result = report.scenario_reports()[0].aggregate();
    let reason = result.reason().unwrap();
    assert_eq!(reason.kind, ErrorKind::NoMatchingStep);
    assert!(reason.message.contains("in 'Home' context"), "{}", reason.message);
    assert!(reason.message.contains("did you mean 'the home screen is displayed'"), "{}", reason.message);
}

#[test]
fn step_in_wrong_context_does_not_resolve() {
    let mut runner = runner(RunnerBuilder::new(application()));
    let report = runner
        .execute_scenarios(
            "Scenario: wrong place\nGiven the Home screen is displayed\nWhen I tap Log in\nThen I tap Search",
        )
        .unwrap();
    let result = report.scenario_reports()[0].aggregate();
    assert_eq!(result.reason().unwrap().kind, ErrorKind::NoMatchingStep);
    assert!(!report.passed());
}

#[test]
fn missing_elements_fail_existence() {
    let driver = RecordingDriver::new().with_visible(["login", "search"]);
    let mut runner = RunnerBuilder::new(application()).seed(3).build(driver).unwrap();
    let report = runner
        .execute_scenarios("Scenario: half drawn\nGiven the Log in button is displayed\nThen I see Welcome")
        .unwrap();
    let result = report.scenario_reports()[0].aggregate();
    let reason = result.reason().unwrap();
    assert_eq!(reason.kind, ErrorKind::StepFailure);
    assert_eq!(reason.step.as_deref(), Some("Then I see Welcome"));
}

#[test]
fn discovery_swipes_reveal_elements() {
    let mut driver = RecordingDriver::new().with_visible(["login"]);
    driver.reveal_after_swipes("footer", 2);
    let mut runner = RunnerBuilder::new(application()).seed(3).build(driver).unwrap();
    let report = runner
        .execute_scenarios("Scenario: scroll\nGiven the Log in button is displayed\nThen the Footer row is displayed")
        .unwrap();
    assert!(report.passed(), "{:?}", report);
    assert_eq!(runner.driver().swipe_count(), 2);
}

#[test]
fn manual_steps_need_registration() {
    let text = "Scenario: type\nGiven the Home screen is displayed\nWhen I tap Log in\n\
                And I type into Username\nThen the Login screen is displayed";

    let mut unregistered = runner(RunnerBuilder::new(application()));
    let report = unregistered.execute_scenarios(text).unwrap();
    let result = report.scenario_reports()[0].aggregate();
    assert_eq!(result.reason().unwrap().kind, ErrorKind::NoMatchingStep);

    let mut registered = runner(RunnerBuilder::new(application()).step_for("login", "I type into Username", |ctx| {
        ctx.logf("[typed]");
        true
    }));
    let report = registered.execute_scenarios(text).unwrap();
    assert!(report.passed(), "{:?}", report);
    let ScenarioReport::Scenario { log, .. } = &report.scenario_reports()[0] else {
        panic!("expected a plain scenario");
    };
    assert!(log.contains("[typed]"));
}

#[test]
fn outline_reports_each_instance() {
    let mut runner = runner(RunnerBuilder::new(application()));
    let report = runner.execute_feature(&feature("outline.feature")).unwrap();
    let reports = report.scenario_reports();
    assert_eq!(reports.len(), 2);
    match &reports[1] {
        ScenarioReport::Outline { instances, .. } => {
            assert_eq!(instances.len(), 4);
            assert!(instances[0].text.contains("When I hold Log in"));
            assert!(instances[0].text.contains("the Search button is displayed"));
            assert!(instances.iter().all(|i| i.result == ScenarioResult::Success));
        }
        other => panic!("expected outline, got {:?}", other),
    }
    assert!(runner.driver().performed().contains(&"press(login)".to_string()));
}

#[test]
fn summary_counts_every_outcome() {
    let mut runner = runner(RunnerBuilder::new(application()).tags("not @skip"));
    let report = runner
        .execute_scenarios(
            "Scenario: ok\nGiven the Home screen is displayed\nThen the Home screen is displayed\n\
             @skip\nScenario: skipped\nGiven the Home screen is displayed\nThen the Home screen is displayed\n\
             Scenario: broken\nGiven nothing at all\nThen the Home screen is displayed",
        )
        .unwrap();
    let stats = report.statistics();
    assert_eq!((stats.passed, stats.failed, stats.not_executed), (1, 1, 1));
    let summary = stats.summary(false);
    assert!(summary.contains("1 (50.0%) passed."), "{}", summary);
    assert!(summary.contains("Total: 3 scenarios."), "{}", summary);
    assert!(!report.passed());
}
