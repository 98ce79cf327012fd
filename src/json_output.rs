//! JSON output for aggregate records and branch comparisons
//!
//! Comparison files are laid out benchmark -> metric -> values, with the
//! ratio stored under `"<compare>/<baseline>"`:
//!
//! ```json
//! {
//!   "c_pi.par": {
//!     "original_time": { "main": 50.0, "optimized": 75.0, "optimized/main": 1.5 }
//!   }
//! }
//! ```
//!
//! Missing values and unavailable ratios are `null`.

use crate::aggregate::{AggregateRecord, Ratio};
use crate::compare::{ComparisonRecord, ComparisonSet};
use crate::error::{HarnessError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

type ComparisonFile = BTreeMap<String, BTreeMap<String, BTreeMap<String, Option<f64>>>>;

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => HarnessError::FileAbsent(path.to_path_buf()),
        _ => HarnessError::Io(e),
    })
}

fn number(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

/// Build the benchmark-major JSON document for a comparison
pub fn comparison_to_json(set: &ComparisonSet) -> Value {
    let tag = set.ratio_tag();
    let mut root = Map::new();

    for benchmark in set.benchmarks() {
        let mut metrics = Map::new();
        for (metric, by_bench) in &set.metrics {
            let Some(record) = by_bench.get(benchmark) else {
                continue;
            };
            let mut entry = Map::new();
            entry.insert(set.baseline_branch.clone(), number(record.baseline));
            entry.insert(set.compare_branch.clone(), number(record.compare));
            entry.insert(tag.clone(), number(record.ratio.value()));
            metrics.insert(metric.clone(), Value::Object(entry));
        }
        root.insert(benchmark.to_string(), Value::Object(metrics));
    }

    Value::Object(root)
}

/// `<root>/<baseline>_<compare>.json`
pub fn comparison_path(root: &Path, baseline_branch: &str, compare_branch: &str) -> PathBuf {
    root.join(format!("{baseline_branch}_{compare_branch}.json"))
}

/// Persist a comparison next to the branch output directories
pub fn write_comparison(root: &Path, set: &ComparisonSet) -> Result<PathBuf> {
    let path = comparison_path(root, &set.baseline_branch, &set.compare_branch);
    let json = serde_json::to_string_pretty(&comparison_to_json(set))?;
    fs::write(&path, json)?;
    tracing::info!("Comparison written to {}", path.display());
    Ok(path)
}

/// Load a comparison file written by [`write_comparison`]
pub fn read_comparison(
    path: &Path,
    baseline_branch: &str,
    compare_branch: &str,
) -> Result<ComparisonSet> {
    let file: ComparisonFile = serde_json::from_str(&read_file(path)?)?;
    let mut set = ComparisonSet::new(baseline_branch, compare_branch);
    let tag = set.ratio_tag();

    for (benchmark, metrics) in file {
        for (metric, values) in metrics {
            let record = ComparisonRecord {
                baseline: values.get(baseline_branch).copied().flatten(),
                compare: values.get(compare_branch).copied().flatten(),
                ratio: Ratio::from(values.get(&tag).copied().flatten()),
            };
            set.insert(&metric, &benchmark, record);
        }
    }

    Ok(set)
}

/// Write aggregate records as a pretty-printed JSON array
pub fn write_records(path: &Path, records: &[AggregateRecord]) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(records)?)?;
    Ok(())
}

pub fn read_records(path: &Path) -> Result<Vec<AggregateRecord>> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|e| HarnessError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
