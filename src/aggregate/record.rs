// Per-(case, branch) aggregate records
//
// A record is only built from the artifacts of a case whose iterations all
// succeeded. Individual samples that are missing or unparsable are skipped,
// but if any of the four series (original/instrumented x time/memory) ends
// up empty there is no record at all.

use crate::aggregate::ratio::{ratio, Ratio};
use crate::aggregate::trimmed::SampleSeries;
use crate::case::{RunArtifact, Variant};
use crate::error::{HarnessError, Result};
use crate::extract::{parse_wall_clock, read_artifact, Extraction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coefficient of variation above which a series is reported as noisy
const NOISE_WARN_THRESHOLD: f64 = 0.5;

/// Metric names of an aggregate record, in CSV column order
pub const WALL_CLOCK_METRICS: [&str; 6] = [
    "original_memory",
    "original_time",
    "instrument_memory",
    "instrument_time",
    "memory_overhead",
    "time_overhead",
];

/// Trimmed-mean time and memory of both variants of one case on one branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub benchmark: String,
    /// Kilobytes
    pub original_memory: f64,
    /// Milliseconds
    pub original_time: f64,
    pub instrument_memory: f64,
    pub instrument_time: f64,
    pub memory_overhead: Ratio,
    pub time_overhead: Ratio,
    pub branch: String,
}

impl AggregateRecord {
    /// Look up a metric by its column name
    pub fn metric(&self, name: &str) -> Option<f64> {
        match name {
            "original_memory" => Some(self.original_memory),
            "original_time" => Some(self.original_time),
            "instrument_memory" => Some(self.instrument_memory),
            "instrument_time" => Some(self.instrument_time),
            "memory_overhead" => self.memory_overhead.value(),
            "time_overhead" => self.time_overhead.value(),
            _ => None,
        }
    }
}

/// Wall-clock samples of one variant across iterations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantSamples {
    pub memory_kb: Vec<f64>,
    pub time_ms: Vec<f64>,
}

impl VariantSamples {
    pub fn push(&mut self, memory_kb: u64, time_ms: f64) {
        self.memory_kb.push(memory_kb as f64);
        self.time_ms.push(time_ms);
    }

    pub fn is_empty(&self) -> bool {
        self.memory_kb.is_empty() && self.time_ms.is_empty()
    }
}

/// Read every artifact and group its wall-clock sample by variant
///
/// Missing files, empty files and lines that fail to parse are logged and
/// skipped. Other I/O errors are returned.
pub fn collect_samples(artifacts: &[RunArtifact]) -> Result<BTreeMap<Variant, VariantSamples>> {
    let mut samples: BTreeMap<Variant, VariantSamples> = BTreeMap::new();

    for artifact in artifacts {
        let text = match read_artifact(&artifact.path) {
            Ok(text) => text,
            Err(HarnessError::FileAbsent(path)) => {
                tracing::warn!("Artifact {} is missing, sample skipped", path.display());
                continue;
            }
            Err(e) => return Err(e),
        };

        match parse_wall_clock(&text) {
            Extraction::Present(sample) => samples
                .entry(artifact.variant)
                .or_default()
                .push(sample.memory_kb, sample.time_ms),
            Extraction::Absent => {
                tracing::warn!(
                    "No measurement line in {} (iteration {}, {})",
                    artifact.path.display(),
                    artifact.iteration,
                    artifact.variant
                );
            }
            Extraction::Malformed(token) => {
                tracing::warn!(
                    "Unparsable measurement '{}' in {}",
                    token,
                    artifact.path.display()
                );
            }
        }
    }

    Ok(samples)
}

/// Reduce both variants' samples to a record, or `None` if any series is empty
pub fn aggregate_samples(
    benchmark: &str,
    branch: &str,
    original: &VariantSamples,
    instrumented: &VariantSamples,
) -> Option<AggregateRecord> {
    let series = [
        SampleSeries::new("original_memory", original.memory_kb.clone()),
        SampleSeries::new("original_time", original.time_ms.clone()),
        SampleSeries::new("instrument_memory", instrumented.memory_kb.clone()),
        SampleSeries::new("instrument_time", instrumented.time_ms.clone()),
    ];

    for s in &series {
        if s.is_noisy(NOISE_WARN_THRESHOLD) {
            tracing::warn!(
                "{}: {} is noisy (CV={:.2}) across {} samples",
                benchmark,
                s.name,
                s.coefficient_of_variation(),
                s.samples.len()
            );
        }
    }

    let (Some(original_memory), Some(original_time), Some(instrument_memory), Some(instrument_time)) = (
        series[0].trimmed_mean(),
        series[1].trimmed_mean(),
        series[2].trimmed_mean(),
        series[3].trimmed_mean(),
    ) else {
        tracing::warn!("{}: no usable samples for at least one variant", benchmark);
        return None;
    };

    Some(AggregateRecord {
        benchmark: benchmark.to_string(),
        original_memory,
        original_time,
        instrument_memory,
        instrument_time,
        memory_overhead: ratio(Some(original_memory), Some(instrument_memory)),
        time_overhead: ratio(Some(original_time), Some(instrument_time)),
        branch: branch.to_string(),
    })
}

/// Aggregate the artifacts of one successfully completed case
pub fn aggregate_case(
    benchmark: &str,
    branch: &str,
    artifacts: &[RunArtifact],
) -> Result<Option<AggregateRecord>> {
    let samples = collect_samples(artifacts)?;
    let empty = VariantSamples::default();
    let original = samples.get(&Variant::Original).unwrap_or(&empty);
    let instrumented = samples.get(&Variant::Instrumented).unwrap_or(&empty);

    Ok(aggregate_samples(benchmark, branch, original, instrumented))
}
