//! Branch build step
//!
//! Building is an opaque pass/fail gate in front of orchestration: a
//! failed build aborts the branch before any case runs.

use crate::error::{HarnessError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

/// Build flavour passed to the build script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Optimized build for wall-clock measurement
    #[default]
    Release,
    /// Build with internal performance counters enabled
    Perf,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Release => "release",
            BuildMode::Perf => "perf",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that can produce the binaries for a branch
pub trait Builder {
    fn build(&self, branch: &str, mode: BuildMode) -> Result<()>;
}

/// `git checkout <branch>` followed by `<build_script> <mode>` in the source tree
#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    pub source_root: PathBuf,
    pub build_script: String,
}

impl ScriptBuilder {
    pub fn new(source_root: impl Into<PathBuf>, build_script: impl Into<String>) -> Self {
        Self {
            source_root: source_root.into(),
            build_script: build_script.into(),
        }
    }

    fn run_step(&self, cmd: &mut Command, program: &str, branch: &str, mode: BuildMode) -> Result<()> {
        let status = cmd
            .current_dir(&self.source_root)
            .status()
            .map_err(|source| HarnessError::Spawn {
                program: PathBuf::from(program),
                source,
            })?;

        if !status.success() {
            return Err(HarnessError::BuildFailure {
                branch: branch.to_string(),
                mode: mode.to_string(),
                reason: format!("`{program}` finished with {status}"),
            });
        }
        Ok(())
    }
}

impl Builder for ScriptBuilder {
    fn build(&self, branch: &str, mode: BuildMode) -> Result<()> {
        tracing::info!(
            "Building branch {} ({}) in {}",
            branch,
            mode,
            self.source_root.display()
        );
        self.run_step(
            Command::new("git").args(["checkout", branch]),
            "git checkout",
            branch,
            mode,
        )?;
        self.run_step(
            Command::new(&self.build_script).arg(mode.as_str()),
            &self.build_script,
            branch,
            mode,
        )
    }
}

/// Run the build if one is configured; any failure is fatal for the branch
pub fn ensure_built(builder: Option<&dyn Builder>, branch: &str, mode: BuildMode) -> Result<()> {
    match builder {
        Some(builder) => builder.build(branch, mode).map_err(|e| match e {
            HarnessError::BuildFailure { .. } => e,
            other => HarnessError::BuildFailure {
                branch: branch.to_string(),
                mode: mode.to_string(),
                reason: other.to_string(),
            },
        }),
        None => {
            tracing::info!("Build skipped for branch {}", branch);
            Ok(())
        }
    }
}
