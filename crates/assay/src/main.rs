//! Grades one submission directory against a reference directory and prints
//! the report as JSON.

use anyhow::{Context as _, Result, anyhow, bail};
use assay::{AggregationPolicy, AssayConfig, GradeError, GradeReport, Grader, GradingRequest};
use env_logger::{Builder, Env};
use log::{error, info};
use probe::{FunctionalStrategy, HeuristicProfile, parse_custom_tests, parse_scenarios};
use sandbox::{ChromeConfig, ChromeRasterizer, ChromeSandbox, Submission};
use std::env;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::runtime;

const USAGE: &str = "usage: assay <submission-dir> <reference-dir> \
[--scenarios <file> | --custom-tests <file> | --heuristic] [--policy two|four] [--out <dir>]";

/// Exit code when every viewport errored; the partial report is still printed.
const NO_VALID_COMPARISONS: u8 = 2;

#[derive(Debug, PartialEq, Eq)]
enum StrategyArg {
    Scenarios(PathBuf),
    CustomTests(PathBuf),
    Heuristic,
}

#[derive(Debug)]
struct CliArgs {
    submission: PathBuf,
    reference: PathBuf,
    strategy: StrategyArg,
    policy: AggregationPolicy,
    out: Option<PathBuf>,
}

/// Splits `--flag=value` and `--flag value` forms.
fn flag_value(arg: &str, flag: &str, rest: &mut impl Iterator<Item = String>) -> Result<Option<String>> {
    if let Some(value) = arg.strip_prefix(flag).and_then(|tail| tail.strip_prefix('=')) {
        return Ok(Some(value.to_owned()));
    }
    if arg == flag {
        return rest
            .next()
            .map(Some)
            .ok_or_else(|| anyhow!("{flag} needs a value\n{USAGE}"));
    }
    Ok(None)
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut args = args.into_iter();
    let mut positional = Vec::new();
    let mut strategy = None;
    let mut policy = AggregationPolicy::four_metric();
    let mut out = None;
    while let Some(arg) = args.next() {
        if let Some(path) = flag_value(&arg, "--scenarios", &mut args)? {
            strategy = Some(StrategyArg::Scenarios(PathBuf::from(path)));
        } else if let Some(path) = flag_value(&arg, "--custom-tests", &mut args)? {
            strategy = Some(StrategyArg::CustomTests(PathBuf::from(path)));
        } else if arg == "--heuristic" {
            strategy = Some(StrategyArg::Heuristic);
        } else if let Some(name) = flag_value(&arg, "--policy", &mut args)? {
            policy = match name.as_str() {
                "two" => AggregationPolicy::two_metric(),
                "four" => AggregationPolicy::four_metric(),
                other => bail!("unknown policy {other:?}\n{USAGE}"),
            };
        } else if let Some(dir) = flag_value(&arg, "--out", &mut args)? {
            out = Some(PathBuf::from(dir));
        } else if arg.starts_with("--") {
            bail!("unknown option {arg}\n{USAGE}");
        } else {
            positional.push(PathBuf::from(arg));
        }
    }
    let [submission, reference] = <[PathBuf; 2]>::try_from(positional).map_err(|_extra| anyhow!(USAGE))?;
    Ok(CliArgs {
        submission,
        reference,
        strategy: strategy.unwrap_or(StrategyArg::Heuristic),
        policy,
        out,
    })
}

/// Reads `index.html`, `style.css` and `script.js` from `dir`. Only the
/// markup is required.
fn read_submission(dir: &Path) -> Result<Submission> {
    let optional = |name: &str| -> Result<String> {
        let path = dir.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    };
    let html_path = dir.join("index.html");
    let html = fs::read_to_string(&html_path).with_context(|| format!("failed to read {}", html_path.display()))?;
    Ok(Submission::new(html, optional("style.css")?, optional("script.js")?))
}

fn load_strategy(arg: &StrategyArg) -> Result<FunctionalStrategy> {
    Ok(match arg {
        StrategyArg::Scenarios(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            FunctionalStrategy::Scenarios(parse_scenarios(&json)?)
        }
        StrategyArg::CustomTests(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            FunctionalStrategy::CustomTests(parse_custom_tests(&json)?)
        }
        StrategyArg::Heuristic => FunctionalStrategy::Heuristic(HeuristicProfile::todo_app()),
    })
}

fn print_report(report: &GradeReport) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, report)?;
    writeln!(stdout)?;
    Ok(())
}

/// Launches Chrome, grades `request` and prints the report.
async fn grade_with_chrome(request: &GradingRequest, config: AssayConfig, out: Option<&Path>) -> Result<ExitCode> {
    let chrome = ChromeConfig::from_env().with_timeouts(config.load_timeout(), config.step_timeout());
    let sandbox = ChromeSandbox::launch(chrome).await?;
    let rasterizer = ChromeRasterizer::new(config.capture_timeout());
    let outcome = Grader::new(&sandbox, &rasterizer, config).grade(request).await;
    sandbox.shutdown().await;

    match outcome {
        Ok(report) => {
            if let Some(dir) = out {
                let written = report.write_artifacts(dir)?;
                info!("{} diff images in {}", written.len(), dir.display());
            }
            print_report(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(GradeError::NoValidComparisons { report }) => {
            error!("no viewport produced a valid comparison; the visual scores are unmeasured");
            print_report(&report)?;
            Ok(ExitCode::from(NO_VALID_COMPARISONS))
        }
        Err(err) => Err(err.into()),
    }
}

fn run(args: CliArgs) -> Result<ExitCode> {
    let request = GradingRequest {
        submission: read_submission(&args.submission)?,
        reference: read_submission(&args.reference)?,
        strategy: load_strategy(&args.strategy)?,
        policy: args.policy,
    };
    let runtime = runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(grade_with_chrome(&request, AssayConfig::from_env(), args.out.as_deref()))
}

fn main() -> ExitCode {
    let _log_init: Result<(), _> = Builder::from_env(Env::default().filter_or("RUST_LOG", "warn"))
        .is_test(false)
        .try_init();
    match parse_args(env::args().skip(1)).and_then(run) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
