//! The JSON objects returned by the NVD CVE API 2.0.
//!
//! Only the fields needed to paginate are typed, each CVE is kept as raw JSON.

use log::trace;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConnectorError, Result};
use crate::models::{CveRecord, PageResponse};

/// Represents the main JSON object returned by the NVD CVE API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct APIResponse {
    /// The number of results by page.
    pub results_per_page: Option<u32>,
    /// The start index.
    pub start_index: Option<u64>,
    /// The number of CVEs matching the request.
    pub total_results: u64,
    /// The format.
    /// Example: NVD_CVE
    pub format: Option<String>,
    /// The version.
    pub version: Option<String>,
    /// The timestamp.
    pub timestamp: Option<String>,
    /// The list of vulnerabilities.
    pub vulnerabilities: Vec<Vulnerability>,
}

/// Represents a vulnerability returned as part of the APIResponse.
#[derive(Debug, Deserialize)]
pub struct Vulnerability {
    /// The CVE, kept untouched.
    pub cve: Value,
}

impl APIResponse {
    /// Converts the response into a page, extracting the CVE identifiers.
    pub fn into_page(self) -> Result<PageResponse> {
        let mut items = Vec::with_capacity(self.vulnerabilities.len());
        for (position, vulnerability) in self.vulnerabilities.into_iter().enumerate() {
            let id = vulnerability
                .cve
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ConnectorError::MalformedResponse(format!(
                        "vulnerability #{} has no cve.id",
                        position
                    ))
                })?
                .to_string();
            items.push(CveRecord {
                id,
                data: vulnerability.cve,
            });
        }

        Ok(PageResponse {
            total_results: self.total_results,
            results_per_page: self.results_per_page,
            start_index: self.start_index,
            items,
        })
    }
}

/// Decodes a response body into a page.
pub fn decode_page(body: &str) -> Result<PageResponse> {
    trace!("Running response::decode_page()");
    let response: APIResponse = serde_json::from_str(body)
        .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;
    response.into_page()
}
