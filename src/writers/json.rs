//! Write the CVEs as JSON
//! It presents the CVEs in a JSON format and prints it on STDOUT.

use serde_json::value::Value;
use serde_json::Map;

use super::Writer;
use crate::models::CveRecord;

/// A writer to print the CVEs as JSON.
pub struct JsonWriter {}

impl JsonWriter {
    /// Create a new JsonWriter
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for JsonWriter {
    /// Renders { "totalResults": n, "cves": { "<id>": {...} } }
    fn render(&self, total_results: u64, records: &[&CveRecord]) -> String {
        let mut cves = Map::new();
        for record in records {
            cves.insert(record.id.clone(), record.data.clone());
        }

        let mut map = Map::new();
        map.insert(
            "totalResults".to_string(),
            Value::Number(total_results.into()),
        );
        map.insert("cves".to_string(), Value::Object(cves));
        format!("{:#}", Value::Object(map))
    }
}
