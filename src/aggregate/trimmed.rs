// Trimmed mean over repeated samples
//
// The trimming rule is fixed and uniform for time and memory: sort, drop one
// minimum and one maximum when there are more than TRIM_THRESHOLD samples,
// average the rest.

/// Sample counts above this are trimmed before averaging
pub const TRIM_THRESHOLD: usize = 3;

/// Arithmetic mean after discarding the single lowest and highest sample
///
/// With `TRIM_THRESHOLD` or fewer samples all of them are averaged.
/// Returns `None` for an empty slice.
///
/// # Example
/// ```
/// use pairbench::aggregate::trimmed_mean;
///
/// assert_eq!(trimmed_mean(&[10.0, 20.0, 30.0, 40.0, 1000.0]), Some(30.0));
/// assert_eq!(trimmed_mean(&[1.0, 2.0, 6.0]), Some(3.0));
/// assert_eq!(trimmed_mean(&[]), None);
/// ```
pub fn trimmed_mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let kept = if sorted.len() > TRIM_THRESHOLD {
        &sorted[1..sorted.len() - 1]
    } else {
        &sorted[..]
    };

    Some(kept.iter().sum::<f64>() / kept.len() as f64)
}

/// Named series of samples for one (case, variant, metric)
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSeries {
    pub name: String,
    pub samples: Vec<f64>,
}

impl SampleSeries {
    pub fn new(name: impl Into<String>, samples: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }

    pub fn trimmed_mean(&self) -> Option<f64> {
        trimmed_mean(&self.samples)
    }

    /// Coefficient of variation (population std-dev / |mean|) of the raw samples
    ///
    /// Used only for diagnostics: a high value means the trimmed mean is
    /// hiding a lot of run-to-run noise. Zero for empty or all-zero series.
    pub fn coefficient_of_variation(&self) -> f64 {
        let n = self.samples.len();
        if n == 0 {
            return 0.0;
        }

        let mean = self.samples.iter().sum::<f64>() / n as f64;
        if mean.abs() < 1e-9 {
            return 0.0;
        }

        let variance = self
            .samples
            .iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        variance.sqrt() / mean.abs()
    }

    pub fn is_noisy(&self, threshold: f64) -> bool {
        self.coefficient_of_variation() > threshold
    }
}
