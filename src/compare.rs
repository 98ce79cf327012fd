//! Cross-branch comparison
//!
//! Joins the results of a baseline branch with those of a compare branch by
//! benchmark name (wall-clock records) or by artifact file name (counter
//! outputs) and computes `compare / baseline` for every metric. Benchmarks
//! that only exist on one side, or whose counter run failed, are reported
//! and excluded, never compared against zero.

use crate::aggregate::{ratio, AggregateRecord, Ratio, WALL_CLOCK_METRICS};
use crate::case::{failed_artifact_path, FAILED_SUFFIX};
use crate::error::{HarnessError, Result};
use crate::extract::{extract, read_artifact};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Baseline value, compare value and their ratio for one (metric, benchmark)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonRecord {
    pub baseline: Option<f64>,
    pub compare: Option<f64>,
    pub ratio: Ratio,
}

impl ComparisonRecord {
    pub fn new(baseline: Option<f64>, compare: Option<f64>) -> Self {
        Self {
            baseline,
            compare,
            ratio: ratio(baseline, compare),
        }
    }
}

/// Comparison of two branches: metric -> benchmark -> record
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSet {
    pub baseline_branch: String,
    pub compare_branch: String,
    pub metrics: BTreeMap<String, BTreeMap<String, ComparisonRecord>>,
    /// Baseline benchmarks excluded from the comparison: no counterpart on
    /// the compare side, or a failed run on either side
    pub missing: Vec<String>,
}

impl ComparisonSet {
    pub fn new(baseline_branch: impl Into<String>, compare_branch: impl Into<String>) -> Self {
        Self {
            baseline_branch: baseline_branch.into(),
            compare_branch: compare_branch.into(),
            metrics: BTreeMap::new(),
            missing: Vec::new(),
        }
    }

    pub fn insert(&mut self, metric: &str, benchmark: &str, record: ComparisonRecord) {
        self.metrics
            .entry(metric.to_string())
            .or_default()
            .insert(benchmark.to_string(), record);
    }

    pub fn get(&self, metric: &str, benchmark: &str) -> Option<&ComparisonRecord> {
        self.metrics.get(metric)?.get(benchmark)
    }

    /// Key under which the ratio is stored in JSON: `<compare>/<baseline>`
    pub fn ratio_tag(&self) -> String {
        format!("{}/{}", self.compare_branch, self.baseline_branch)
    }

    /// Every benchmark with at least one record, sorted
    pub fn benchmarks(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .metrics
            .values()
            .flat_map(|by_bench| by_bench.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.values().all(BTreeMap::is_empty)
    }

    /// Ratios of `metric` worth plotting: positive numeric values only
    ///
    /// The set itself is left untouched.
    pub fn displayable(&self, metric: &str) -> BTreeMap<String, f64> {
        self.metrics
            .get(metric)
            .map(|by_bench| {
                by_bench
                    .iter()
                    .filter(|(_, record)| record.ratio.is_displayable())
                    .filter_map(|(bench, record)| Some((bench.clone(), record.ratio.value()?)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Compare two branches' aggregate records, joined on benchmark name
pub fn compare_records(
    baseline_branch: &str,
    baseline: &[AggregateRecord],
    compare_branch: &str,
    compare: &[AggregateRecord],
) -> ComparisonSet {
    let mut set = ComparisonSet::new(baseline_branch, compare_branch);
    let compare_by_name: BTreeMap<&str, &AggregateRecord> = compare
        .iter()
        .map(|record| (record.benchmark.as_str(), record))
        .collect();

    for base in baseline {
        let Some(other) = compare_by_name.get(base.benchmark.as_str()) else {
            tracing::warn!(
                "{} has no result on branch {}, skipped",
                base.benchmark,
                compare_branch
            );
            set.missing.push(base.benchmark.clone());
            continue;
        };

        for metric in WALL_CLOCK_METRICS {
            set.insert(
                metric,
                &base.benchmark,
                ComparisonRecord::new(base.metric(metric), other.metric(metric)),
            );
        }
    }

    let compare_only: Vec<&str> = compare
        .iter()
        .map(|record| record.benchmark.as_str())
        .filter(|name| !baseline.iter().any(|base| base.benchmark == *name))
        .collect();
    if !compare_only.is_empty() {
        tracing::debug!(
            "Only on branch {}, not compared: {}",
            compare_branch,
            compare_only.join(", ")
        );
    }

    set
}

/// Counter artifacts of one collection run
#[derive(Debug, Default)]
struct CounterArtifacts {
    /// Successful `.out` artifacts, sorted
    ok: Vec<PathBuf>,
    /// `.out` names of failed runs, sorted
    failed: Vec<String>,
}

fn counter_artifacts(dir: &Path) -> Result<CounterArtifacts> {
    let entries = fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => HarnessError::FileAbsent(dir.to_path_buf()),
        _ => HarnessError::Io(e),
    })?;

    let mut artifacts = CounterArtifacts::default();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if let Some(out_name) = name.strip_suffix(FAILED_SUFFIX) {
            if out_name.ends_with(".out") {
                artifacts.failed.push(out_name.to_string());
            }
        } else if name.ends_with(".out") {
            artifacts.ok.push(path);
        }
    }
    artifacts.ok.sort();
    artifacts.failed.sort();
    Ok(artifacts)
}

/// Compare internal counters of two collection runs, joined on artifact file name
///
/// Output of a run that exited unsuccessfully (`<file>.out.failed`) is
/// never read; its benchmark lands in `missing`.
///
/// # Errors
/// `FileAbsent` if the baseline directory does not exist. A missing compare
/// directory just leaves every benchmark in `missing`.
pub fn compare_counter_dirs(
    baseline_branch: &str,
    baseline_dir: &Path,
    compare_branch: &str,
    compare_dir: &Path,
    markers: &BTreeMap<String, String>,
) -> Result<ComparisonSet> {
    let mut set = ComparisonSet::new(baseline_branch, compare_branch);
    let baseline = counter_artifacts(baseline_dir)?;

    for file_name in baseline.failed {
        tracing::warn!(
            "{} failed on branch {}, excluded",
            file_name,
            baseline_branch
        );
        set.missing.push(file_name);
    }

    for base_path in baseline.ok {
        let Some(file_name) = base_path.file_name() else {
            continue;
        };
        let file_name = file_name.to_string_lossy().into_owned();
        let compare_path = compare_dir.join(&file_name);

        if failed_artifact_path(&compare_path).is_file() {
            tracing::warn!(
                "{} failed on branch {}, excluded",
                file_name,
                compare_branch
            );
            set.missing.push(file_name);
            continue;
        }

        let compare_text = match read_artifact(&compare_path) {
            Ok(text) => text,
            Err(HarnessError::FileAbsent(_)) => {
                tracing::warn!(
                    "{} not found in {}, skipped",
                    file_name,
                    compare_dir.display()
                );
                set.missing.push(file_name);
                continue;
            }
            Err(e) => return Err(e),
        };
        let base_text = read_artifact(&base_path)?;

        let base_values = extract(&base_text, markers);
        let compare_values = extract(&compare_text, markers);
        for metric in markers.keys() {
            let base = base_values.get(metric).and_then(|e| e.value().copied());
            let other = compare_values.get(metric).and_then(|e| e.value().copied());
            tracing::debug!("{} {}: {:?} -> {:?}", file_name, metric, base, other);
            set.insert(metric, &file_name, ComparisonRecord::new(base, other));
        }
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(benchmark: &str, original_time: f64, instrument_time: f64) -> AggregateRecord {
        AggregateRecord {
            benchmark: benchmark.to_string(),
            original_memory: 1000.0,
            original_time,
            instrument_memory: 2000.0,
            instrument_time,
            memory_overhead: Ratio::Value(2.0),
            time_overhead: ratio(Some(original_time), Some(instrument_time)),
            branch: String::new(),
        }
    }

    #[test]
    fn test_compare_records_ratio() {
        let baseline = vec![record("c_pi.par", 40.0, 50.0)];
        let compare = vec![record("c_pi.par", 40.0, 75.0)];

        let set = compare_records("main", &baseline, "optimized", &compare);
        let rec = set.get("instrument_time", "c_pi.par").unwrap();
        assert_eq!(rec.baseline, Some(50.0));
        assert_eq!(rec.compare, Some(75.0));
        assert_eq!(rec.ratio, Ratio::Value(1.5));
        assert_eq!(set.metric_names().count(), WALL_CLOCK_METRICS.len());
        assert_eq!(set.ratio_tag(), "optimized/main");
    }

    #[test]
    fn test_compare_records_zero_baseline_is_sentinel() {
        let baseline = vec![record("c_mandel.par", 0.0, 0.0)];
        let compare = vec![record("c_mandel.par", 10.0, 10.0)];

        let set = compare_records("main", &baseline, "optimized", &compare);
        assert_eq!(
            set.get("original_time", "c_mandel.par").unwrap().ratio,
            Ratio::NotAvailable
        );
        // time_overhead itself was unavailable on the baseline side
        let overhead = set.get("time_overhead", "c_mandel.par").unwrap();
        assert_eq!(overhead.baseline, None);
        assert_eq!(overhead.ratio, Ratio::NotAvailable);
    }

    #[test]
    fn test_compare_records_missing_counterpart() {
        let baseline = vec![record("a", 1.0, 2.0), record("b", 1.0, 2.0)];
        let compare = vec![record("a", 1.0, 3.0)];

        let set = compare_records("main", &baseline, "optimized", &compare);
        assert_eq!(set.missing, vec!["b".to_string()]);
        assert_eq!(set.benchmarks(), vec!["a"]);
        assert!(set.get("original_time", "b").is_none());
    }

    #[test]
    fn test_compare_records_ignores_compare_only() {
        let baseline = vec![record("a", 1.0, 2.0)];
        let compare = vec![record("a", 1.0, 3.0), record("new", 1.0, 1.0)];

        let set = compare_records("main", &baseline, "optimized", &compare);
        assert_eq!(set.benchmarks(), vec!["a"]);
        assert!(set.missing.is_empty());
        assert!(set.get("original_time", "new").is_none());
    }

    #[test]
    fn test_displayable_does_not_mutate() {
        let mut set = ComparisonSet::new("main", "optimized");
        set.insert("m", "pos", ComparisonRecord::new(Some(2.0), Some(3.0)));
        set.insert("m", "zero", ComparisonRecord::new(Some(2.0), Some(0.0)));
        set.insert("m", "na", ComparisonRecord::new(Some(0.0), Some(3.0)));

        let shown = set.displayable("m");
        assert_eq!(shown.len(), 1);
        assert_eq!(shown["pos"], 1.5);
        assert_eq!(set.metrics["m"].len(), 3);
        assert!(set.displayable("unknown").is_empty());
    }

    #[test]
    fn test_compare_counter_dirs() {
        let base = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        fs::write(
            base.path().join("DRB001-antidep1.inst.out"),
            "Check Access Function Call: 100\nAccess Control Contention: 0\n",
        )
        .unwrap();
        fs::write(
            other.path().join("DRB001-antidep1.inst.out"),
            "Check Access Function Call: 40\nAccess Control Contention: 5\n",
        )
        .unwrap();
        fs::write(base.path().join("DRB002-antidep1.inst.out"), "").unwrap();
        fs::write(base.path().join("notes.txt"), "ignored").unwrap();

        let mut markers = BTreeMap::new();
        markers.insert("calls".to_string(), "Check Access Function Call".to_string());
        markers.insert("contention".to_string(), "Access Control Contention".to_string());

        let set =
            compare_counter_dirs("main", base.path(), "optimized", other.path(), &markers).unwrap();

        assert_eq!(set.missing, vec!["DRB002-antidep1.inst.out".to_string()]);
        let calls = set.get("calls", "DRB001-antidep1.inst.out").unwrap();
        assert_eq!(calls.ratio, Ratio::Value(0.4));
        let contention = set.get("contention", "DRB001-antidep1.inst.out").unwrap();
        assert_eq!(contention.baseline, Some(0.0));
        assert_eq!(contention.ratio, Ratio::NotAvailable);
    }

    #[test]
    fn test_compare_counter_dirs_excludes_failed_runs() {
        let base = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let counter = "Check Access Function Call";

        // Crashed on the compare side after printing its counters
        fs::write(base.path().join("DRB001.inst.out"), format!("{counter}: 100\n")).unwrap();
        fs::write(
            other.path().join("DRB001.inst.out.failed"),
            format!("{counter}: 300\n"),
        )
        .unwrap();
        // Crashed on the baseline side
        fs::write(
            base.path().join("DRB002.inst.out.failed"),
            format!("{counter}: 100\n"),
        )
        .unwrap();
        fs::write(other.path().join("DRB002.inst.out"), format!("{counter}: 50\n")).unwrap();
        fs::write(base.path().join("DRB003.inst.out"), format!("{counter}: 10\n")).unwrap();
        fs::write(other.path().join("DRB003.inst.out"), format!("{counter}: 20\n")).unwrap();

        let mut markers = BTreeMap::new();
        markers.insert("calls".to_string(), counter.to_string());

        let set =
            compare_counter_dirs("main", base.path(), "optimized", other.path(), &markers).unwrap();

        assert_eq!(set.benchmarks(), vec!["DRB003.inst.out"]);
        assert_eq!(
            set.get("calls", "DRB003.inst.out").unwrap().ratio,
            Ratio::Value(2.0)
        );
        assert!(set.get("calls", "DRB001.inst.out").is_none());
        let mut missing = set.missing.clone();
        missing.sort();
        assert_eq!(missing, vec!["DRB001.inst.out", "DRB002.inst.out"]);
    }

    #[test]
    fn test_compare_counter_dirs_missing_baseline() {
        let other = TempDir::new().unwrap();
        let result = compare_counter_dirs(
            "main",
            Path::new("/nonexistent/pairbench/output-main"),
            "optimized",
            other.path(),
            &BTreeMap::new(),
        );
        assert!(matches!(result, Err(HarnessError::FileAbsent(_))));
    }
}
