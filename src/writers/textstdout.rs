//! Write the CVEs to standard output
//! It is the default writer, it presents the CVEs in a text
//! format and prints it on STDOUT.

use super::Writer;
use crate::models::CveRecord;

/// A writer to print the CVEs in the terminal.
pub struct TextStdoutWriter {}

impl TextStdoutWriter {
    /// Create a new TextStdoutWriter
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for TextStdoutWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for TextStdoutWriter {
    /// Renders one block per CVE
    fn render(&self, total_results: u64, records: &[&CveRecord]) -> String {
        let mut text = format!(
            "----------{} of {} CVEs----------\n",
            records.len(),
            total_results
        );
        for record in records {
            text.push_str(&format!(
                "\n[{}] {} (published {})\n{}\n",
                record.id,
                record.vuln_status().unwrap_or("unknown status"),
                record.published().unwrap_or("unknown"),
                record.description().unwrap_or("No description.")
            ));
        }
        text
    }
}
