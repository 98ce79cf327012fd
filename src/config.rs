//! Harness configuration loaded from TOML
//!
//! Everything the pipeline needs to know about a benchmark suite lives here
//! and is passed explicitly into the orchestrator and extractor: the case
//! table, skip list, counter marker registry and sweep points.
//!
//! # Example TOML
//! ```toml
//! iterations = 5
//! timeout_mins = 10
//! sweep_degrees = [2, 4, 8]
//! skip = ["008", "024"]
//!
//! [[case]]
//! name = "c_pi.par"
//! parameters = "1000"
//!
//! [counters]
//! key_num_check_access_call = "Check Access Function Call"
//! ```

use crate::case::{BenchmarkCase, INSTRUMENTED_SUFFIX};
use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable read by OpenMP runtimes for the thread count
pub const DEFAULT_CONCURRENCY_ENV: &str = "OMP_NUM_THREADS";

/// One benchmark entry of the `[[case]]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseConfig {
    pub name: String,
    #[serde(default)]
    pub parameters: String,
    /// Defaults to `<benchmark_root>/<name>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<PathBuf>,
    /// Defaults to `<benchmark_root>/<name>.inst`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrumented: Option<PathBuf>,
}

impl CaseConfig {
    pub fn to_case(&self, root: &Path) -> BenchmarkCase {
        let mut case = BenchmarkCase::new(&self.name, &self.parameters, root);
        if let Some(original) = &self.original {
            case.original = root.join(original);
        }
        if let Some(instrumented) = &self.instrumented {
            case.instrumented = root.join(instrumented);
        }
        case
    }
}

/// Configuration for a measurement campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Paired runs per case
    pub iterations: u32,

    /// Per-invocation wall-clock limit in minutes
    pub timeout_mins: u64,

    /// Command prefix producing the `Memory Usage: <kb> Time: <elapsed>` line
    pub time_wrapper: Vec<String>,

    /// Variable carrying the concurrency degree to the benchmark runtime
    pub concurrency_env: String,

    /// Ordered concurrency degrees visited by a sweep
    pub sweep_degrees: Vec<u32>,

    /// Case names, or numeric benchmark ids (e.g. `"008"` for `DRB008-...`), to skip
    pub skip: Vec<String>,

    #[serde(rename = "case")]
    pub cases: Vec<CaseConfig>,

    /// Counter metric name -> substring identifying its output line
    pub counters: BTreeMap<String, String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            timeout_mins: 10,
            time_wrapper: vec![
                "/usr/bin/time".to_string(),
                "-f".to_string(),
                "Memory Usage: %M Time: %E".to_string(),
            ],
            concurrency_env: DEFAULT_CONCURRENCY_ENV.to_string(),
            sweep_degrees: vec![2, 4, 8, 16],
            skip: Vec::new(),
            cases: Vec::new(),
            counters: default_counters(),
        }
    }
}

/// Counters printed by the race detector runtime at exit
pub fn default_counters() -> BTreeMap<String, String> {
    [
        ("key_num_check_access_call", "Check Access Function Call"),
        (
            "key_num_memory_access_instrumentation_call",
            "Memory Access Instrumentation Call",
        ),
        ("key_num_access_control_contention", "Access Control Contention"),
        (
            "key_num_access_control_write_write_contention",
            "Access Control Write Write Contention",
        ),
        (
            "key_num_access_control_write_read_contention",
            "Access Control Write Read Contention",
        ),
        (
            "key_num_access_control_read_write_contention",
            "Access Control Read Write Contention",
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// `FileAbsent` if the file does not exist, `Toml` on syntax errors and
    /// `Config` if the values fail [`HarnessConfig::validate`].
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => HarnessError::FileAbsent(path.to_path_buf()),
            _ => HarnessError::Io(e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: HarnessConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(HarnessError::Config("iterations must be >= 1".to_string()));
        }

        if self.timeout_mins == 0 {
            return Err(HarnessError::Config("timeout_mins must be >= 1".to_string()));
        }

        if self.concurrency_env.is_empty() {
            return Err(HarnessError::Config(
                "concurrency_env must not be empty".to_string(),
            ));
        }

        if self.sweep_degrees.is_empty() || self.sweep_degrees.contains(&0) {
            return Err(HarnessError::Config(format!(
                "sweep_degrees must be a non-empty list of positive values, got {:?}",
                self.sweep_degrees
            )));
        }

        let mut seen = HashSet::new();
        for case in &self.cases {
            if case.name.trim().is_empty() {
                return Err(HarnessError::Config("case with empty name".to_string()));
            }
            if !seen.insert(case.name.as_str()) {
                return Err(HarnessError::Config(format!(
                    "duplicate case '{}'",
                    case.name
                )));
            }
        }

        if let Some((name, _)) = self.counters.iter().find(|(_, marker)| marker.trim().is_empty()) {
            return Err(HarnessError::Config(format!(
                "counter '{name}' has an empty marker"
            )));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_mins.saturating_mul(60))
    }

    /// Whether a case is excluded by the skip list (by full name or numeric id)
    pub fn is_skipped(&self, name: &str) -> bool {
        is_skipped(name, &self.skip)
    }

    /// Configured cases with binaries resolved against `root`, skip list applied
    pub fn cases(&self, root: &Path) -> Vec<BenchmarkCase> {
        self.cases
            .iter()
            .filter(|c| {
                let skipped = self.is_skipped(&c.name);
                if skipped {
                    tracing::info!("Skipping {}", c.name);
                }
                !skipped
            })
            .map(|c| c.to_case(root))
            .collect()
    }
}

/// First run of ASCII digits in a benchmark name, e.g. `"008"` in `DRB008-...`
pub fn benchmark_id(name: &str) -> Option<&str> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let rest = &name[start..];
    let len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..len])
}

fn is_skipped(name: &str, skip: &[String]) -> bool {
    let id = benchmark_id(name);
    skip.iter()
        .any(|entry| entry == name || Some(entry.as_str()) == id)
}

/// Build cases from every `*.inst` binary in `dir`, sorted by name
///
/// The original binary is assumed to sit next to it without the suffix.
/// Counter collection only runs the instrumented side, so it does not need
/// to exist. Parameters are empty.
pub fn discover_cases(dir: &Path, skip: &[String]) -> Result<Vec<BenchmarkCase>> {
    let entries = fs::read_dir(dir).map_err(|e| match e.kind() {
        ErrorKind::NotFound => HarnessError::FileAbsent(dir.to_path_buf()),
        _ => HarnessError::Io(e),
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if let Some(name) = file_name.strip_suffix(INSTRUMENTED_SUFFIX) {
            if is_skipped(name, skip) {
                tracing::debug!("Skipping {}", file_name);
                continue;
            }
            names.push(name.to_string());
        }
    }
    names.sort();

    Ok(names
        .into_iter()
        .map(|name| BenchmarkCase::new(name, "", dir))
        .collect())
}
