//! In this module are declared the entities manipulated by this program

use std::collections::BTreeMap;
use std::fmt::Display;

use clap::{builder::PossibleValue, ValueEnum};
use serde_json::Value;

use crate::error::ConnectorError;

/// The maximum number of results the NVD CVE API 2.0 accepts per page.
pub const MAX_RESULTS_PER_PAGE: u32 = 2000;

/// The supplemental data that can be requested along with the CVEs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AddOns {
    /// Only the CVEs are returned.
    #[default]
    None,
    /// The CPE dictionary data is returned along with each CVE.
    DictionaryCpes,
}

impl AddOns {
    /// Builds the AddOns from a command line flag.
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            Self::DictionaryCpes
        } else {
            Self::None
        }
    }

    /// The value of the addOns query parameter, if any.
    pub fn query_value(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::DictionaryCpes => Some("dictionaryCpes"),
        }
    }
}

/// Represents the request of one page of CVEs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// The index of the first CVE of the page in the whole collection.
    pub start_index: u64,
    /// The maximum number of CVEs in the page.
    pub results_per_page: u32,
    /// The supplemental data to request.
    pub add_ons: AddOns,
}

impl PageRequest {
    /// Creates a new PageRequest
    pub fn new(start_index: u64, results_per_page: u32, add_ons: AddOns) -> Self {
        Self {
            start_index,
            results_per_page,
            add_ons,
        }
    }

    /// The smallest legal request, used to learn the total number of results.
    pub fn probe(add_ons: AddOns) -> Self {
        Self::new(0, 1, add_ons)
    }

    /// Checks the page size is accepted by the API.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.results_per_page == 0 || self.results_per_page > MAX_RESULTS_PER_PAGE {
            return Err(ConnectorError::InvalidPageSize {
                requested: self.results_per_page,
                max: MAX_RESULTS_PER_PAGE,
            });
        }
        Ok(())
    }

    /// The query parameters matching this request.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("startIndex", self.start_index.to_string()),
            ("resultsPerPage", self.results_per_page.to_string()),
        ];
        if let Some(add_ons) = self.add_ons.query_value() {
            params.push(("addOns", add_ons.to_string()));
        }
        params
    }
}

/// Represents a CVE as returned by the NVD.
///
/// The record is kept as the raw `cve` JSON object, only its identifier is
/// extracted.
#[derive(Clone, Debug, PartialEq)]
pub struct CveRecord {
    /// The CVE identifier.
    /// Example: CVE-2012-6708
    pub id: String,
    /// The whole `cve` object.
    pub data: Value,
}

impl CveRecord {
    /// Creates a new CveRecord
    pub fn new(id: &str, data: Value) -> Self {
        Self {
            id: id.to_string(),
            data,
        }
    }

    /// When the CVE was published.
    /// Example: 2018-01-18T23:29:00.213
    pub fn published(&self) -> Option<&str> {
        self.data.get("published").and_then(Value::as_str)
    }

    /// When the CVE was modified.
    pub fn last_modified(&self) -> Option<&str> {
        self.data.get("lastModified").and_then(Value::as_str)
    }

    /// The status of the vulnerability.
    /// Example: Modified
    pub fn vuln_status(&self) -> Option<&str> {
        self.data.get("vulnStatus").and_then(Value::as_str)
    }

    /// The english description of the CVE.
    pub fn description(&self) -> Option<&str> {
        self.data
            .get("descriptions")
            .and_then(Value::as_array)?
            .iter()
            .find(|d| d.get("lang").and_then(Value::as_str) == Some("en"))
            .and_then(|d| d.get("value"))
            .and_then(Value::as_str)
    }
}

/// Represents one page of CVEs.
#[derive(Clone, Debug, PartialEq)]
pub struct PageResponse {
    /// The number of CVEs matching the request, across all pages.
    pub total_results: u64,
    /// The page size reported by the API.
    pub results_per_page: Option<u32>,
    /// The start index reported by the API.
    pub start_index: Option<u64>,
    /// The CVEs of the page, in the order returned by the API.
    pub items: Vec<CveRecord>,
}

impl PageResponse {
    /// The first CVE of the page, None when the page is empty.
    pub fn into_first(self) -> Option<CveRecord> {
        self.items.into_iter().next()
    }
}

/// All the CVEs fetched during a bulk run, by identifier.
pub type Snapshot = BTreeMap<String, CveRecord>;

/// Reports how far a bulk run went.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// The offset reached, never above total.
    pub fetched: u64,
    /// The number of CVEs announced by the probe request.
    pub total: u64,
}

impl Progress {
    /// Creates a new Progress, capping the offset at the total.
    pub fn new(offset: u64, total: u64) -> Self {
        Self {
            fetched: offset.min(total),
            total,
        }
    }

    /// The completion, between 0 and 100.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.fetched as f64 * 100.0 / self.total as f64
    }
}

impl Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} CVEs ({:.1}%)",
            self.fetched,
            self.total,
            self.percent()
        )
    }
}

/// An enumeration to represent the writers
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Writers {
    TextStdout,
    Json,
    Csv,
}

impl ValueEnum for Writers {
    /// Lists the variants available for clap
    fn value_variants<'a>() -> &'a [Self] {
        &[Writers::TextStdout, Writers::Json, Writers::Csv]
    }

    /// Map each value to a possible value in clap
    fn to_possible_value(&self) -> Option<PossibleValue> {
        match &self {
            Writers::TextStdout => Some(PossibleValue::new("textstdout")),
            Writers::Json => Some(PossibleValue::new("json")),
            Writers::Csv => Some(PossibleValue::new("csv")),
        }
    }
}
