use anyhow::{Context, Result};
use clap::Parser;
use pairbench::build::{ensure_built, BuildMode, Builder, ScriptBuilder};
use pairbench::case::BenchmarkCase;
use pairbench::cli::{BuildArgs, Cli, Command, CompareMode};
use pairbench::compare::{compare_counter_dirs, compare_records};
use pairbench::config::{discover_cases, HarnessConfig};
use pairbench::orchestrator::{
    output_dir, prepare_output_dir, BranchRun, Orchestrator, RunSettings, RESULT_JSON,
};
use pairbench::runner::forward_interrupts;
use pairbench::sweep::{run_sweep, SweepPlan};
use pairbench::aggregate::AggregateRecord;
use pairbench::{json_output, report, HarnessError};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "pairbench.toml";

/// Initialize tracing subscriber: info by default, trace with --debug
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>, root: &Path) -> Result<HarnessConfig> {
    let config = match explicit {
        Some(path) => HarnessConfig::from_toml(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => {
            let path = root.join(DEFAULT_CONFIG_FILE);
            if path.is_file() {
                HarnessConfig::from_toml(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?
            } else {
                HarnessConfig::default()
            }
        }
    };
    config.validate()?;
    Ok(config)
}

/// Configured case table, or every `*.inst` binary in the root
fn load_cases(config: &HarnessConfig, root: &Path) -> Result<Vec<BenchmarkCase>> {
    let cases = if config.cases.is_empty() {
        discover_cases(root, &config.skip)?
    } else {
        config.cases(root)
    };
    if cases.is_empty() {
        anyhow::bail!("No benchmark cases configured or found in {}", root.display());
    }
    tracing::info!("{} benchmark cases", cases.len());
    Ok(cases)
}

fn make_builder(args: &BuildArgs, root: &Path) -> Option<ScriptBuilder> {
    if args.no_build {
        return None;
    }
    let source = args.source.clone().unwrap_or_else(|| root.to_path_buf());
    Some(ScriptBuilder::new(source, args.build_script.clone()))
}

fn as_builder(builder: &Option<ScriptBuilder>) -> Option<&dyn Builder> {
    builder.as_ref().map(|b| b as &dyn Builder)
}

fn run_measure(
    config: &HarnessConfig,
    root: &Path,
    branch: &str,
    iterations: Option<u32>,
    build: &BuildArgs,
) -> Result<()> {
    let cases = load_cases(config, root)?;
    let builder = make_builder(build, root);
    ensure_built(
        as_builder(&builder),
        branch,
        build.mode.unwrap_or(BuildMode::Release),
    )?;

    let mut settings = RunSettings::from_config(config);
    if let Some(n) = iterations {
        if n == 0 {
            anyhow::bail!("--iterations must be at least 1");
        }
        settings.iterations = n;
    }

    let run = Orchestrator::new(settings).run_branch(branch, branch, root, &cases)?;
    print!("{}", report::branch_report(&run));
    Ok(())
}

fn run_sweep_command(
    config: &HarnessConfig,
    root: &Path,
    branch: &str,
    degrees: Option<Vec<u32>>,
    build: &BuildArgs,
) -> Result<()> {
    let cases = load_cases(config, root)?;
    let degrees = degrees.unwrap_or_else(|| config.sweep_degrees.clone());
    if degrees.is_empty() {
        anyhow::bail!("No sweep degrees given");
    }
    let builder = make_builder(build, root);

    let plan = SweepPlan {
        branch,
        degrees: &degrees,
        concurrency_env: &config.concurrency_env,
        root,
        cases: &cases,
    };
    let points = run_sweep(
        &plan,
        &RunSettings::from_config(config),
        as_builder(&builder),
        build.mode.unwrap_or(BuildMode::Release),
    )?;
    print!("{}", report::sweep_report(&points));
    Ok(())
}

fn run_counters(config: &HarnessConfig, root: &Path, branch: &str, build: &BuildArgs) -> Result<()> {
    let cases = load_cases(config, root)?;
    let builder = make_builder(build, root);
    ensure_built(
        as_builder(&builder),
        branch,
        build.mode.unwrap_or(BuildMode::Perf),
    )?;

    let out_dir = prepare_output_dir(root, branch)?;
    let artifacts = Orchestrator::new(RunSettings::from_config(config)).collect_counters(&cases, &out_dir);
    let failed = artifacts.iter().filter(|a| !a.status.is_success()).count();
    println!(
        "Collected {} counter outputs in {} ({} failed)",
        artifacts.len(),
        out_dir.display(),
        failed
    );
    Ok(())
}

/// Records of the compare side; a branch without results compares as empty
fn compare_side_records(root: &Path, branch: &str) -> Result<Vec<AggregateRecord>> {
    let path = output_dir(root, branch).join(RESULT_JSON);
    match json_output::read_records(&path) {
        Ok(records) => Ok(records),
        Err(HarnessError::FileAbsent(_)) => {
            tracing::warn!(
                "No results for branch {} ({} not found), every benchmark is missing",
                branch,
                path.display()
            );
            Ok(Vec::new())
        }
        Err(e) => Err(e).with_context(|| format!("No results for branch {branch}")),
    }
}

fn run_compare(
    config: &HarnessConfig,
    root: &Path,
    baseline: &str,
    compare: &str,
    mode: CompareMode,
) -> Result<()> {
    let set = match mode {
        CompareMode::WallClock => {
            let base_records = json_output::read_records(&output_dir(root, baseline).join(RESULT_JSON))
                .with_context(|| format!("No results for branch {baseline}"))?;
            let compare_side = compare_side_records(root, compare)?;
            compare_records(baseline, &base_records, compare, &compare_side)
        }
        CompareMode::Counters => compare_counter_dirs(
            baseline,
            &output_dir(root, baseline),
            compare,
            &output_dir(root, compare),
            &config.counters,
        )?,
    };

    json_output::write_comparison(root, &set)?;
    let metrics: Vec<&str> = set.metric_names().collect();
    print!(
        "{}",
        report::comparison_report(&set, &report::summarize(&set, &metrics))
    );
    Ok(())
}

fn run_report(root: &Path, baseline: &str, compare: Option<&str>, metrics: &[String]) -> Result<()> {
    match compare {
        Some(compare) => {
            let path = json_output::comparison_path(root, baseline, compare);
            let set = json_output::read_comparison(&path, baseline, compare)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let metrics: Vec<String> = if metrics.is_empty() {
                set.metric_names().map(str::to_string).collect()
            } else {
                metrics.to_vec()
            };
            print!(
                "{}",
                report::comparison_report(&set, &report::summarize(&set, &metrics))
            );
        }
        None => {
            let dir: PathBuf = output_dir(root, baseline);
            let records = json_output::read_records(&dir.join(RESULT_JSON))
                .with_context(|| format!("No results for branch {baseline}"))?;
            let run = BranchRun {
                branch: baseline.to_string(),
                output_dir: dir,
                records,
                failed: Vec::new(),
                no_data: Vec::new(),
            };
            print!("{}", report::branch_report(&run));
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);
    if let Err(e) = forward_interrupts() {
        tracing::warn!("Interrupts will not stop running benchmarks: {}", e);
    }

    let config = load_config(args.config.as_deref(), &args.root)?;

    match &args.command {
        Command::Measure {
            branch,
            iterations,
            build,
        } => run_measure(&config, &args.root, branch, *iterations, build),
        Command::Sweep {
            branch,
            degrees,
            build,
        } => run_sweep_command(&config, &args.root, branch, degrees.clone(), build),
        Command::Counters { branch, build } => run_counters(&config, &args.root, branch, build),
        Command::Compare {
            baseline,
            compare,
            mode,
        } => run_compare(&config, &args.root, baseline, compare, *mode),
        Command::Report {
            baseline,
            compare,
            metrics,
        } => run_report(&args.root, baseline, compare.as_deref(), metrics),
    }
}
