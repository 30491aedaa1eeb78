//! emx-featurespec CLI
//!
//! Check feature files against an application model.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use emx_featurespec::{
    failures, load_application, RecordingDriver, RunConfig, Runner, ScenarioReport, TestReport,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emx-featurespec")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "Check Gherkin feature files against an application model")]
struct Cli {
    /// Feature files or directories containing them
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Application model (JSON)
    #[arg(short, long, default_value = "app.json")]
    config: PathBuf,

    /// Only run scenarios whose tags satisfy this expression
    #[arg(short, long)]
    tags: Option<String>,

    /// Extra attempts for a failing scenario
    #[arg(short, long, default_value_t = 0)]
    retry: usize,

    /// Seed for existence sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Start in this context instead of the model's initial context
    #[arg(long = "context")]
    initial_context: Option<String>,

    /// Plain summary without status symbols
    #[arg(long = "no-symbols")]
    no_symbols: bool,

    /// List the step phrases available in each context
    #[arg(long = "list-steps")]
    list_steps: bool,

    /// Verbose output: show scenario logs and debug events
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let application = load_application(&cli.config)
        .with_context(|| format!("loading application model {}", cli.config.display()))?;

    let config = RunConfig {
        retry: cli.retry,
        tags: cli.tags.clone(),
        seed: cli.seed,
        symbols: !cli.no_symbols,
        initial_context: cli.initial_context.clone(),
        ..RunConfig::default()
    };

    // Model-check mode: every element the live context declares is present.
    let mut runner = Runner::new(application, RecordingDriver::all_visible(), config)?;

    if cli.list_steps {
        print_steps(&mut runner)?;
        return Ok(true);
    }

    let files = collect_features(&cli.paths)?;
    if files.is_empty() {
        bail!("no .feature files found");
    }

    for file in &files {
        let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        let is_feature = text.lines().any(|l| l.trim_start().to_lowercase().starts_with("feature:"));
        let report = if is_feature {
            runner.execute_feature(&text)
        } else {
            runner.execute_scenarios(&text)
        }
        .map_err(|e| e.with_file(file.display().to_string()))?;
        print_report(file, &report, cli.verbose);
    }

    let stats = runner.overall_statistics();
    println!();
    println!("{}", stats.summary(runner.config().symbols));
    Ok(stats.passed())
}

/// Expand directories into their `.feature` files, sorted by path.
fn collect_features(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in fs::read_dir(path).with_context(|| format!("reading {}", path.display()))? {
                let entry_path = entry?.path();
                if is_feature_file(&entry_path) {
                    found.push(entry_path);
                }
            }
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_feature_file(path: &Path) -> bool {
    path.is_file() && path.extension().map_or(false, |ext| ext == "feature")
}

fn print_report(file: &Path, report: &TestReport, verbose: bool) {
    let title = match report {
        TestReport::Feature(feature) => format!("{} ({})", feature.feature.name, file.display()),
        TestReport::Scenarios(_) => file.display().to_string(),
    };
    println!("=== {}", title);

    for scenario in report.scenario_reports() {
        let name = &scenario.scenario().name;
        let result = scenario.aggregate();
        let status = if result.is_flaky() {
            "FLAKY"
        } else if result.is_success() {
            "PASS "
        } else if scenario.passed() {
            "SKIP "
        } else {
            "FAIL "
        };
        println!("{} {}", status, name);

        let show_logs = verbose || !scenario.passed();
        let logs: Vec<&str> = match scenario {
            ScenarioReport::Scenario { log, .. } => vec![log.as_str()],
            ScenarioReport::Outline { instances, .. } => instances.iter().map(|i| i.log.as_str()).collect(),
        };
        if show_logs {
            for log in logs.into_iter().filter(|l| !l.is_empty()) {
                println!("      --- log ---");
                for line in log.lines() {
                    println!("      {}", line);
                }
            }
        }
    }

    for cause in failures(report.scenario_reports()) {
        println!("      {}", cause);
    }
}

fn print_steps(runner: &mut Runner<RecordingDriver>) -> Result<()> {
    let ids: Vec<String> = match runner.config().initial_context {
        Some(ref id) => vec![id.clone()],
        None => runner.application().contexts.keys().cloned().collect(),
    };
    for id in ids {
        println!("{}:", id);
        for phrase in runner.phrases(&id)? {
            println!("  {}", phrase);
        }
        println!();
    }
    Ok(())
}
