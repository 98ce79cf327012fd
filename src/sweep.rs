//! Scalability sweep over concurrency degrees
//!
//! The same branch is measured once per degree, with the degree exported to
//! every benchmark invocation through an environment variable. The build
//! happens at most once before the first point; a point whose run cannot
//! complete is recorded and the sweep moves on.

use crate::build::{ensure_built, BuildMode, Builder};
use crate::case::BenchmarkCase;
use crate::error::Result;
use crate::orchestrator::{BranchRun, Orchestrator, RunSettings};
use std::path::Path;

/// Outcome of one sweep point
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub degree: u32,
    pub run: Option<BranchRun>,
    /// Why `run` is absent
    pub error: Option<String>,
}

/// What to sweep and how
#[derive(Debug, Clone)]
pub struct SweepPlan<'a> {
    pub branch: &'a str,
    pub degrees: &'a [u32],
    pub concurrency_env: &'a str,
    pub root: &'a Path,
    pub cases: &'a [BenchmarkCase],
}

/// Output label of one sweep point: `<branch>-<degree>`
pub fn point_label(branch: &str, degree: u32) -> String {
    format!("{branch}-{degree}")
}

/// Build once, then run every case at every degree in order
///
/// # Errors
/// Only a failed build is returned; per-point errors end up in
/// [`SweepPoint::error`].
pub fn run_sweep(
    plan: &SweepPlan<'_>,
    settings: &RunSettings,
    builder: Option<&dyn Builder>,
    mode: BuildMode,
) -> Result<Vec<SweepPoint>> {
    ensure_built(builder, plan.branch, mode)?;

    let mut points = Vec::with_capacity(plan.degrees.len());
    for &degree in plan.degrees {
        tracing::info!(
            "Sweep point {}={} on branch {}",
            plan.concurrency_env,
            degree,
            plan.branch
        );
        let orchestrator = Orchestrator::new(
            settings
                .clone()
                .with_env(plan.concurrency_env, degree.to_string()),
        );
        let label = point_label(plan.branch, degree);

        let point = match orchestrator.run_branch(plan.branch, &label, plan.root, plan.cases) {
            Ok(run) => SweepPoint {
                degree,
                run: Some(run),
                error: None,
            },
            Err(e) => {
                tracing::error!("Sweep point {} failed: {}", degree, e);
                SweepPoint {
                    degree,
                    run: None,
                    error: Some(e.to_string()),
                }
            }
        };
        points.push(point);
    }

    Ok(points)
}
