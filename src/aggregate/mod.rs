// Outlier-trimmed aggregation of repeated benchmark samples
//
// Repeated runs of the same binary are noisy: a single iteration can be
// slowed by page-cache misses, frequency scaling or a neighbour process.
// Samples are therefore reduced with a trimmed mean (drop the single lowest
// and single highest value once there are more than three), and overheads
// are expressed as instrumented/original ratios.
//
// A ratio whose denominator is zero or missing is the explicit
// `Ratio::NotAvailable` sentinel, never infinity or NaN.

mod ratio;
mod record;
mod trimmed;

pub use ratio::{ratio, Ratio};
pub use record::{
    aggregate_case, aggregate_samples, collect_samples, AggregateRecord, VariantSamples,
    WALL_CLOCK_METRICS,
};
pub use trimmed::{trimmed_mean, SampleSeries, TRIM_THRESHOLD};
