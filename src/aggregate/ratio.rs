// Overhead ratios with an explicit "not available" sentinel

use serde::{Deserialize, Serialize};
use std::fmt;

/// A ratio value, or the sentinel used when it cannot be computed
///
/// Serializes as a JSON number, or `null` for the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Ratio {
    Value(f64),
    NotAvailable,
}

impl Ratio {
    pub fn value(self) -> Option<f64> {
        match self {
            Ratio::Value(v) => Some(v),
            Ratio::NotAvailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Ratio::Value(_))
    }

    /// Whether the ratio should be shown on a chart (positive numeric values only)
    pub fn is_displayable(self) -> bool {
        matches!(self, Ratio::Value(v) if v > 0.0)
    }
}

impl From<Option<f64>> for Ratio {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Ratio::Value(v),
            _ => Ratio::NotAvailable,
        }
    }
}

impl From<Ratio> for Option<f64> {
    fn from(ratio: Ratio) -> Self {
        ratio.value()
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Value(v) => write!(f, "{v}"),
            Ratio::NotAvailable => f.write_str("N/A"),
        }
    }
}

/// `measured / baseline`, or `NotAvailable` if the baseline is zero or either side is missing
///
/// # Example
/// ```
/// use pairbench::aggregate::{ratio, Ratio};
///
/// assert_eq!(ratio(Some(50.0), Some(75.0)), Ratio::Value(1.5));
/// assert_eq!(ratio(Some(0.0), Some(75.0)), Ratio::NotAvailable);
/// assert_eq!(ratio(None, Some(75.0)), Ratio::NotAvailable);
/// ```
pub fn ratio(baseline: Option<f64>, measured: Option<f64>) -> Ratio {
    match (baseline, measured) {
        (Some(b), Some(m)) if b != 0.0 && b.is_finite() && m.is_finite() => Ratio::from(Some(m / b)),
        _ => Ratio::NotAvailable,
    }
}
