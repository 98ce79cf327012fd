//! Paired run orchestration
//!
//! Drives every case through its iterations strictly sequentially: one
//! subprocess at a time, original before instrumented within an iteration,
//! iteration `i` finished before `i + 1` starts. The first non-zero exit or
//! timeout of either variant fails the case; remaining iterations are
//! abandoned and the case is not aggregated. Artifacts are written either
//! way so failures can be inspected afterwards.

use crate::aggregate::{aggregate_case, AggregateRecord};
use crate::case::{failed_artifact_path, BenchmarkCase, RunArtifact, Variant};
use crate::config::HarnessConfig;
use crate::csv_output::CsvResultOutput;
use crate::error::Result;
use crate::json_output;
use crate::runner::{run_to_file, ExitOutcome, Invocation};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the per-branch CSV result table
pub const RESULT_CSV: &str = "result.csv";

/// File name of the per-branch JSON copy of the aggregate records
pub const RESULT_JSON: &str = "result.json";

/// Execution parameters shared by every invocation of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub iterations: u32,
    pub timeout: Duration,
    pub time_wrapper: Vec<String>,
    /// Extra environment for every invocation (e.g. the concurrency degree)
    pub env: Vec<(String, String)>,
}

impl RunSettings {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            iterations: config.iterations,
            timeout: config.timeout(),
            time_wrapper: config.time_wrapper.clone(),
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Lifecycle of one case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Pending,
    RunningIteration(u32),
    Success,
    Failed,
}

/// The invocation that failed a case
#[derive(Debug, Clone, PartialEq)]
pub struct RunFailure {
    pub variant: Variant,
    pub iteration: u32,
    pub status: ExitOutcome,
}

/// Result of running all iterations of one case
#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    Success {
        artifacts: Vec<RunArtifact>,
    },
    Failed {
        artifacts: Vec<RunArtifact>,
        failure: RunFailure,
    },
}

impl CaseOutcome {
    pub fn state(&self) -> CaseState {
        match self {
            CaseOutcome::Success { .. } => CaseState::Success,
            CaseOutcome::Failed { .. } => CaseState::Failed,
        }
    }

    pub fn artifacts(&self) -> &[RunArtifact] {
        match self {
            CaseOutcome::Success { artifacts } | CaseOutcome::Failed { artifacts, .. } => artifacts,
        }
    }
}

/// Everything one branch run produced
#[derive(Debug, Clone, PartialEq)]
pub struct BranchRun {
    pub branch: String,
    pub output_dir: PathBuf,
    /// One record per case that succeeded and yielded samples
    pub records: Vec<AggregateRecord>,
    /// Cases abandoned after a failed invocation
    pub failed: Vec<(String, RunFailure)>,
    /// Cases that ran cleanly but produced no usable measurements
    pub no_data: Vec<String>,
}

/// `<root>/output-<label>`
pub fn output_dir(root: &Path, label: &str) -> PathBuf {
    root.join(format!("output-{label}"))
}

/// Create a fresh output directory, destroying any previous contents
pub fn prepare_output_dir(root: &Path, label: &str) -> Result<PathBuf> {
    let path = output_dir(root, label);
    if path.exists() {
        fs::remove_dir_all(&path)?;
    }
    fs::create_dir_all(&path)?;
    tracing::info!("Created output directory {}", path.display());
    Ok(path)
}

/// Write `result.csv` and `result.json`; nothing is written for an empty set
pub fn write_results(output_dir: &Path, records: &[AggregateRecord]) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        tracing::warn!("No successful cases, no result file written");
        return Ok(None);
    }

    let mut csv = CsvResultOutput::new();
    for record in records {
        csv.add_record(record.clone());
    }
    let csv_path = output_dir.join(RESULT_CSV);
    fs::write(&csv_path, csv.to_csv())?;
    json_output::write_records(&output_dir.join(RESULT_JSON), records)?;

    Ok(Some(csv_path))
}

/// Sequential driver for paired benchmark runs
#[derive(Debug, Clone)]
pub struct Orchestrator {
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    fn invoke(&self, invocation: &Invocation, artifact_path: &Path) -> ExitOutcome {
        match run_to_file(invocation, artifact_path, self.settings.timeout) {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("{}", e);
                // Leave the reason in the artifact for postmortem
                if let Err(write_err) = fs::write(artifact_path, format!("{e}\n")) {
                    tracing::warn!(
                        "Could not write {}: {}",
                        artifact_path.display(),
                        write_err
                    );
                }
                ExitOutcome::LaunchFailed
            }
        }
    }

    /// Run every iteration of `case`, capturing artifacts into `out_dir`
    pub fn run_case(&self, case: &BenchmarkCase, out_dir: &Path) -> CaseOutcome {
        let mut state = CaseState::Pending;
        tracing::debug!("{}: {:?}", case.name, state);

        let iterations = self.settings.iterations;
        let mut artifacts = Vec::with_capacity(iterations as usize * 2);
        let args = case.args();

        for iteration in 0..iterations {
            state = CaseState::RunningIteration(iteration);
            tracing::info!("{}: {:?}", case.name, state);

            let mut failure = None;
            for variant in Variant::PAIR {
                let path = out_dir.join(case.artifact_name(variant, iteration));
                let invocation = Invocation::new(case.binary(variant))
                    .with_args(args.iter().cloned())
                    .with_wrapper(&self.settings.time_wrapper)
                    .with_env(&self.settings.env);

                let status = self.invoke(&invocation, &path);
                tracing::debug!("{}: {} {} -> {}", case.name, variant, iteration, status);

                if !status.is_success() && failure.is_none() {
                    failure = Some(RunFailure {
                        variant,
                        iteration,
                        status,
                    });
                }
                artifacts.push(RunArtifact {
                    case: case.name.clone(),
                    variant,
                    iteration,
                    path,
                    status,
                });
            }

            if let Some(failure) = failure {
                state = CaseState::Failed;
                tracing::warn!(
                    "{}: {} run {} {} ({:?}), abandoning case",
                    case.name,
                    failure.variant,
                    failure.iteration,
                    failure.status,
                    state
                );
                return CaseOutcome::Failed { artifacts, failure };
            }
        }

        state = CaseState::Success;
        tracing::debug!("{}: {:?}", case.name, state);
        CaseOutcome::Success { artifacts }
    }

    /// Run and aggregate every case into `<root>/output-<label>`
    ///
    /// Case failures are recorded and skipped; only output-directory I/O
    /// errors abort the run.
    pub fn run_branch(
        &self,
        branch: &str,
        label: &str,
        root: &Path,
        cases: &[BenchmarkCase],
    ) -> Result<BranchRun> {
        let output_dir = prepare_output_dir(root, label)?;
        let mut run = BranchRun {
            branch: branch.to_string(),
            output_dir,
            records: Vec::new(),
            failed: Vec::new(),
            no_data: Vec::new(),
        };

        for case in cases {
            tracing::info!(
                "Running benchmark {} with parameters '{}'",
                case.name,
                case.parameters
            );
            match self.run_case(case, &run.output_dir) {
                CaseOutcome::Failed { failure, .. } => {
                    run.failed.push((case.name.clone(), failure));
                }
                CaseOutcome::Success { artifacts } => {
                    match aggregate_case(&case.name, branch, &artifacts) {
                        Ok(Some(record)) => run.records.push(record),
                        Ok(None) => run.no_data.push(case.name.clone()),
                        Err(e) => {
                            tracing::warn!("{}: could not aggregate: {}", case.name, e);
                            run.no_data.push(case.name.clone());
                        }
                    }
                }
            }
        }

        write_results(&run.output_dir, &run.records)?;
        Ok(run)
    }

    /// Run each case's instrumented binary once to collect internal counters
    ///
    /// No measurement wrapper is used. Artifacts are named after the
    /// instrumented binary (`<file>.out`) so two branches can be joined on
    /// file name. A failed invocation's output is kept as `<file>.out.failed`.
    pub fn collect_counters(&self, cases: &[BenchmarkCase], out_dir: &Path) -> Vec<RunArtifact> {
        let mut artifacts = Vec::with_capacity(cases.len());
        for case in cases {
            let file_name = case
                .instrumented
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{}{}", case.name, Variant::Instrumented.suffix()));
            let mut path = out_dir.join(format!("{file_name}.out"));

            tracing::info!("Running benchmark {}", case.instrumented.display());
            let invocation = Invocation::new(&case.instrumented)
                .with_args(case.args())
                .with_env(&self.settings.env);
            let status = self.invoke(&invocation, &path);
            if !status.is_success() {
                tracing::warn!("{}: {}, output excluded from comparison", case.name, status);
                let failed = failed_artifact_path(&path);
                match fs::rename(&path, &failed) {
                    Ok(()) => path = failed,
                    Err(e) => tracing::warn!("Could not rename {}: {}", path.display(), e),
                }
            }

            artifacts.push(RunArtifact {
                case: case.name.clone(),
                variant: Variant::Instrumented,
                iteration: 0,
                path,
                status,
            });
        }
        artifacts
    }
}
