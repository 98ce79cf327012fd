//! Metric extraction from captured benchmark output
//!
//! This is the only module that knows the textual format of benchmark
//! output. Everything downstream works on [`Extraction`] values.
//!
//! Two formats are understood:
//! - the wall-clock line printed by `/usr/bin/time -f "Memory Usage: %M Time: %E"`
//! - counter lines of the form `<label ...> <number>`, matched by a marker substring

use crate::error::{HarnessError, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::OnceLock;

/// Marker identifying the wall-clock measurement line
pub const WALL_CLOCK_MARKER: &str = "Memory Usage";

/// Result of looking for one value in a block of output
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    /// Marker found and value parsed
    Present(T),
    /// No line carries the marker
    Absent,
    /// Marker found but the value token could not be parsed
    Malformed(String),
}

impl<T> Extraction<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Extraction::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Extraction::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Extraction::Present(_))
    }
}

/// One wall-clock measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WallClockSample {
    /// Maximum resident set size in kilobytes
    pub memory_kb: u64,
    /// Elapsed wall-clock time in milliseconds
    pub time_ms: f64,
}

/// Read an artifact file as text
///
/// Benchmarks may print arbitrary bytes, so invalid UTF-8 is replaced
/// rather than rejected. A missing file is [`HarnessError::FileAbsent`].
pub fn read_artifact(path: &Path) -> Result<String> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(HarnessError::FileAbsent(path.to_path_buf())),
        Err(e) => Err(e.into()),
    }
}

/// Extract every registered counter from `text`
///
/// `markers` maps metric name to the substring identifying its line.
/// Every metric gets an entry; empty text yields all-`Absent`.
pub fn extract(text: &str, markers: &BTreeMap<String, String>) -> BTreeMap<String, Extraction<f64>> {
    markers
        .iter()
        .map(|(name, marker)| (name.clone(), extract_marker(text, marker)))
        .collect()
}

/// Trailing numeric token of the first line containing `marker`
pub fn extract_marker(text: &str, marker: &str) -> Extraction<f64> {
    let Some(line) = text.lines().find(|line| line.contains(marker)) else {
        return Extraction::Absent;
    };

    match line.split_whitespace().last() {
        Some(token) => match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Extraction::Present(value),
            _ => Extraction::Malformed(token.to_string()),
        },
        None => Extraction::Malformed(String::new()),
    }
}

fn wall_clock_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Memory Usage:\s*(\S+)\s+Time:\s*(\S+)").expect("wall-clock pattern is valid")
    })
}

/// Parse the `Memory Usage: <kb> Time: <mm:ss.frac>` line
pub fn parse_wall_clock(text: &str) -> Extraction<WallClockSample> {
    let Some(line) = text.lines().find(|line| line.contains(WALL_CLOCK_MARKER)) else {
        return Extraction::Absent;
    };

    let Some(caps) = wall_clock_regex().captures(line) else {
        return Extraction::Malformed(line.trim().to_string());
    };

    let memory = caps[1].parse::<u64>();
    let time = parse_elapsed_ms(&caps[2]);
    match (memory, time) {
        (Ok(memory_kb), Some(time_ms)) => Extraction::Present(WallClockSample { memory_kb, time_ms }),
        (Err(_), _) => Extraction::Malformed(caps[1].to_string()),
        (_, None) => Extraction::Malformed(caps[2].to_string()),
    }
}

/// Convert an elapsed-time token to milliseconds
///
/// Accepts `m:ss[.frac]` and `h:mm:ss[.frac]`. The fraction is read as
/// microseconds (at most six digits, right-padded) so the integral part
/// stays exact: `minutes*60000 + seconds*1000 + micros/1000`.
pub fn parse_elapsed_ms(token: &str) -> Option<f64> {
    let (clock, fraction) = match token.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (token, None),
    };

    let micros = match fraction {
        None => 0,
        Some(f) if f.is_empty() || f.len() > 6 => return None,
        Some(f) => digits(&format!("{f:0<6}"))?,
    };

    let fields: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match fields.as_slice() {
        [m, s] => (0, digits(m)?, digits(s)?),
        [h, m, s] => {
            let minutes = digits(m)?;
            if minutes >= 60 {
                return None;
            }
            (digits(h)?, minutes, digits(s)?)
        }
        _ => return None,
    };
    if seconds >= 60 {
        return None;
    }

    let whole_ms = hours
        .checked_mul(3_600_000)?
        .checked_add(minutes.checked_mul(60_000)?)?
        .checked_add(seconds * 1_000)?;
    Some(whole_ms as f64 + micros as f64 / 1000.0)
}

fn digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
