//! Benchmark cases, their paired variants and the artifacts a run leaves behind

use crate::runner::ExitOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File-name suffix of the instrumented build of a benchmark
pub const INSTRUMENTED_SUFFIX: &str = ".inst";

/// Appended to the artifact of an invocation that did not succeed
pub const FAILED_SUFFIX: &str = ".failed";

/// One of the two builds of a benchmark being compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Original,
    Instrumented,
}

impl Variant {
    /// Execution order within one iteration: original first, then instrumented
    pub const PAIR: [Variant; 2] = [Variant::Original, Variant::Instrumented];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Original => "original",
            Variant::Instrumented => "instrumented",
        }
    }

    /// Suffix appended to the case name in binary and artifact names
    pub fn suffix(&self) -> &'static str {
        match self {
            Variant::Original => "",
            Variant::Instrumented => INSTRUMENTED_SUFFIX,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A benchmark identity plus its fixed invocation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkCase {
    pub name: String,
    /// Passed verbatim to both variants
    pub parameters: String,
    pub original: PathBuf,
    pub instrumented: PathBuf,
}

impl BenchmarkCase {
    /// Case whose binaries live in `root` as `<name>` and `<name>.inst`
    pub fn new(name: impl Into<String>, parameters: impl Into<String>, root: &Path) -> Self {
        let name = name.into();
        Self {
            original: root.join(&name),
            instrumented: root.join(format!("{name}{INSTRUMENTED_SUFFIX}")),
            parameters: parameters.into(),
            name,
        }
    }

    pub fn binary(&self, variant: Variant) -> &Path {
        match variant {
            Variant::Original => &self.original,
            Variant::Instrumented => &self.instrumented,
        }
    }

    /// Deterministic artifact file name: `<name>[.inst]_<iteration>.out`
    pub fn artifact_name(&self, variant: Variant, iteration: u32) -> String {
        format!("{}{}_{}.out", self.name, variant.suffix(), iteration)
    }

    /// Command-line arguments, split on whitespace the way a shell would
    pub fn args(&self) -> Vec<String> {
        self.parameters
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// `<artifact>.failed`: where a failed invocation's output is kept for inspection
pub fn failed_artifact_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(FAILED_SUFFIX);
    PathBuf::from(name)
}

/// Captured output of one subprocess invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RunArtifact {
    pub case: String,
    pub variant: Variant,
    pub iteration: u32,
    pub path: PathBuf,
    pub status: ExitOutcome,
}
