//! CSV output for per-branch aggregate records
//!
//! One row per successfully measured case, for spreadsheet analysis and
//! downstream plotting. Ratios without a meaningful value print as `N/A`.

use crate::aggregate::AggregateRecord;

/// Column header of `result.csv`
pub const RESULT_HEADER: &str = "benchmark,original_memory,original_time,instrument_memory,instrument_time,memory_overhead,time_overhead,branch";

/// CSV formatter for aggregate records
#[derive(Debug)]
pub struct CsvResultOutput {
    records: Vec<AggregateRecord>,
}

impl CsvResultOutput {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn add_record(&mut self, record: AggregateRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn format_record(record: &AggregateRecord) -> String {
        [
            Self::escape_field(&record.benchmark),
            record.original_memory.to_string(),
            record.original_time.to_string(),
            record.instrument_memory.to_string(),
            record.instrument_time.to_string(),
            record.memory_overhead.to_string(),
            record.time_overhead.to_string(),
            Self::escape_field(&record.branch),
        ]
        .join(",")
    }

    /// Header line followed by one line per record
    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str(RESULT_HEADER);
        output.push('\n');

        for record in &self.records {
            output.push_str(&Self::format_record(record));
            output.push('\n');
        }

        output
    }
}

impl Default for CsvResultOutput {
    fn default() -> Self {
        Self::new()
    }
}
