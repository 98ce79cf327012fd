//! Pairbench - paired original/instrumented benchmark overhead harness
//!
//! Runs each benchmark case as an original and an instrumented build for a
//! fixed number of iterations, extracts wall-clock time and peak memory (or
//! internal counters) from the captured output, reduces the samples with an
//! outlier-trimmed mean, and compares the resulting overhead ratios across
//! branches and concurrency degrees.

pub mod aggregate;
pub mod build;
pub mod case;
pub mod cli;
pub mod compare;
pub mod config;
pub mod csv_output;
pub mod error;
pub mod extract;
pub mod json_output;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod sweep;

pub use error::{HarnessError, Result};
