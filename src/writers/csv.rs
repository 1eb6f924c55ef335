//! Write the CVEs as CSV
//! It presents the CVEs in a CSV format and prints it on STDOUT.

use super::Writer;
use crate::models::CveRecord;

/// A writer to print the CVEs as CSV.
pub struct CsvWriter {}

impl CsvWriter {
    /// Create a new CsvWriter
    pub fn new() -> Self {
        Self {}
    }

    /// Quotes a field, escaping the quotes (") to avoid breaking the CSV
    fn field(value: &str) -> String {
        format!("\"{}\"", value.replace('"', "\"\""))
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for CsvWriter {
    /// Renders a header line and one line per CVE
    fn render(&self, _total_results: u64, records: &[&CveRecord]) -> String {
        let mut csv =
            "\"CVE ID\",\"Published\",\"Last modified\",\"Status\",\"Description\"".to_string();
        for record in records {
            let csv_line = [
                record.id.as_str(),
                record.published().unwrap_or_default(),
                record.last_modified().unwrap_or_default(),
                record.vuln_status().unwrap_or_default(),
                record.description().unwrap_or_default(),
            ]
            .iter()
            .map(|value| Self::field(value))
            .collect::<Vec<String>>()
            .join(",");
            csv.push('\n');
            csv.push_str(&csv_line);
        }
        csv
    }
}
