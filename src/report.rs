//! Human-readable summaries of branch runs, sweeps and comparisons

use crate::compare::ComparisonSet;
use crate::orchestrator::BranchRun;
use crate::sweep::SweepPoint;

/// Statistics over the displayable ratios of one metric
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    pub metric: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Count and mean of the displayable ratios of each metric
///
/// Metrics not present in the set are reported with a zero count.
pub fn summarize<S: AsRef<str>>(set: &ComparisonSet, metrics: &[S]) -> Vec<MetricSummary> {
    metrics
        .iter()
        .map(|metric| {
            let metric = metric.as_ref();
            let values: Vec<f64> = set.displayable(metric).into_values().collect();
            let count = values.len();
            let mean = (count > 0).then(|| values.iter().sum::<f64>() / count as f64);
            MetricSummary {
                metric: metric.to_string(),
                count,
                mean,
                min: values.iter().copied().reduce(f64::min),
                max: values.iter().copied().reduce(f64::max),
            }
        })
        .collect()
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.3}"))
}

/// Report of a comparison: per-benchmark ratios followed by per-metric statistics
pub fn comparison_report(set: &ComparisonSet, summaries: &[MetricSummary]) -> String {
    let mut report = String::new();
    report.push_str(&format!(
        "=== {} vs {} ({}) ===\n",
        set.compare_branch,
        set.baseline_branch,
        set.ratio_tag()
    ));

    for summary in summaries {
        report.push_str(&format!("\n{}:\n", summary.metric));
        for (benchmark, ratio) in set.displayable(&summary.metric) {
            report.push_str(&format!("  {benchmark:<40} {ratio:.3}\n"));
        }
        report.push_str(&format!(
            "  mean {} over {} benchmarks (min {}, max {})\n",
            fmt_opt(summary.mean),
            summary.count,
            fmt_opt(summary.min),
            fmt_opt(summary.max)
        ));
    }

    if !set.missing.is_empty() {
        report.push_str(&format!(
            "\n⚠️  Excluded, missing or failed ({}): {}\n",
            set.missing.len(),
            set.missing.join(", ")
        ));
    }

    report
}

/// Report of one branch run: result table plus failed and empty cases
pub fn branch_report(run: &BranchRun) -> String {
    let mut report = String::new();
    report.push_str(&format!(
        "=== Branch {} ({}) ===\n",
        run.branch,
        run.output_dir.display()
    ));
    report.push_str(&format!(
        "{} measured, {} failed, {} without data\n",
        run.records.len(),
        run.failed.len(),
        run.no_data.len()
    ));

    if !run.records.is_empty() {
        report.push_str(&format!(
            "\n{:<40} {:>12} {:>12} {:>10} {:>10}\n",
            "benchmark", "orig ms", "inst ms", "time x", "mem x"
        ));
        for record in &run.records {
            report.push_str(&format!(
                "{:<40} {:>12.1} {:>12.1} {:>10} {:>10}\n",
                record.benchmark,
                record.original_time,
                record.instrument_time,
                fmt_opt(record.time_overhead.value()),
                fmt_opt(record.memory_overhead.value())
            ));
        }
    }

    if !run.failed.is_empty() {
        report.push_str("\n❌ Failed cases:\n");
        for (name, failure) in &run.failed {
            report.push_str(&format!(
                "  {}: {} iteration {} {}\n",
                name, failure.variant, failure.iteration, failure.status
            ));
        }
    }

    if !run.no_data.is_empty() {
        report.push_str(&format!(
            "\n⚠️  No measurements: {}\n",
            run.no_data.join(", ")
        ));
    }

    report
}

/// One line per sweep point
pub fn sweep_report(points: &[SweepPoint]) -> String {
    let mut report = String::from("=== Scalability sweep ===\n");
    for point in points {
        match &point.run {
            Some(run) => report.push_str(&format!(
                "degree {:>4}: {} measured, {} failed ({})\n",
                point.degree,
                run.records.len(),
                run.failed.len(),
                run.output_dir.display()
            )),
            None => report.push_str(&format!(
                "degree {:>4}: not run ({})\n",
                point.degree,
                point.error.as_deref().unwrap_or("unknown error")
            )),
        }
    }
    report
}
