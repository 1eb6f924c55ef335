//! Writing CVEs
//!
//! Once the CVEs are fetched, it's up to a writer to present them. It
//! provides a common interface, allowing to change the output format without
//! affecting the fetching.

pub mod csv;
pub mod json;
pub mod textstdout;

use crate::models::{CveRecord, Snapshot, Writers};

/// A trait to have a common interface between writers.
/// A writer has the responsibility to render the [`CveRecord`]s and to print
/// them on standard output.
pub trait Writer {
    /// Renders the records.
    /// `total_results` is the number of CVEs announced by the NVD, which can
    /// be higher than the number of records when only one page is written.
    fn render(&self, total_results: u64, records: &[&CveRecord]) -> String;

    /// Prints the records on STDOUT
    fn write(&self, total_results: u64, records: &[&CveRecord]) {
        println!("{}", self.render(total_results, records));
    }

    /// Prints a whole snapshot on STDOUT
    fn write_snapshot(&self, snapshot: &Snapshot) {
        let records: Vec<&CveRecord> = snapshot.values().collect();
        self.write(records.len() as u64, &records);
    }
}

/// Creates the writer matching the command line choice.
pub fn from_choice(choice: Writers) -> Box<dyn Writer> {
    match choice {
        Writers::TextStdout => Box::new(textstdout::TextStdoutWriter::new()),
        Writers::Json => Box::new(json::JsonWriter::new()),
        Writers::Csv => Box::new(csv::CsvWriter::new()),
    }
}
