//! This module talks to the NVD CVE API 2.0.
//! https://nvd.nist.gov/developers/vulnerabilities

pub mod client;
pub mod response;

use std::time::Duration;

use crate::error::Result;
use crate::models::{PageRequest, PageResponse};
use crate::retry::RetryPolicy;

/// The root of all NVD REST endpoints.
pub const NVD_BASE_URL: &str = "https://services.nvd.nist.gov/rest/json";

/// The CVE endpoint, relative to the base URL.
pub const CVE_API_PATH: &str = "cves/2.0";

/// A common interface to everything able to return a page of CVEs.
pub trait CveSource {
    /// Fetches the page of CVEs described by the request.
    fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse>;
}

impl<S: CveSource + ?Sized> CveSource for &S {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse> {
        (**self).fetch_page(request)
    }
}

/// The settings shared by all requests sent to the NVD.
#[derive(Clone, Debug)]
pub struct NvdConfig {
    /// The root URL of the API.
    pub base_url: String,
    /// The API key, sent in the apiKey header when present.
    pub api_key: Option<String>,
    /// The timeout of one HTTP request.
    pub timeout: Duration,
    /// The pause between two consecutive requests of a bulk run.
    pub request_delay: Duration,
    /// How failed requests are retried.
    pub retry: RetryPolicy,
}

impl NvdConfig {
    /// Creates a new configuration with the public NVD URL.
    pub fn new(api_key: Option<String>) -> Self {
        let request_delay = Self::default_request_delay(api_key.is_some());
        Self {
            base_url: NVD_BASE_URL.to_string(),
            api_key,
            timeout: Duration::from_secs(30),
            request_delay,
            retry: RetryPolicy::default(),
        }
    }

    /// The pause matching the NVD public rate limits.
    pub fn default_request_delay(has_api_key: bool) -> Duration {
        if has_api_key {
            Duration::from_millis(600) // With API key: 50 requests/30s
        } else {
            Duration::from_secs(6) // Without API key: 5 requests/30s
        }
    }

    /// Replaces the base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Replaces the pause between two requests.
    pub fn with_request_delay(mut self, request_delay: Duration) -> Self {
        self.request_delay = request_delay;
        self
    }

    /// Returns the base URL concatenated with the given relative URL.
    pub fn create_api_url(&self, relative_url: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            relative_url.trim_start_matches('/')
        )
    }
}

impl Default for NvdConfig {
    fn default() -> Self {
        Self::new(None)
    }
}
