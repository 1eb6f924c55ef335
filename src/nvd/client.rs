//! This module implements the connector downloading CVEs from the NVD.
//!
//! Requests follow the API 2.0 conventions: the API key travels in the
//! `apiKey` header and a single CVE is selected with the `cveId` parameter.

use log::{debug, error, trace};
use reqwest::blocking::{Client, Request};
use reqwest::StatusCode;

use super::response::decode_page;
use super::{CveSource, NvdConfig, CVE_API_PATH};
use crate::error::{ConnectorError, Result};
use crate::models::{CveRecord, PageRequest, PageResponse};

/// The User-Agent sent with every request.
const USER_AGENT: &str = concat!("nvd_connector/", env!("CARGO_PKG_VERSION"));

/// This struct queries the NVD CVE API.
pub struct CveConnector {
    /// The HTTP client, reused between requests.
    client: Client,
    /// The URL, key and pacing of the API.
    config: NvdConfig,
}

impl CveConnector {
    /// Creates a new CveConnector.
    pub fn new(config: NvdConfig) -> Result<Self> {
        trace!("Running CveConnector::new()");
        let client = Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ConnectorError::ClientBuild)?;
        Ok(Self { client, config })
    }

    /// The configuration used by the connector.
    pub fn config(&self) -> &NvdConfig {
        &self.config
    }

    /// Returns a single CVE, or None if the NVD doesn't know it.
    pub fn get_cve(&self, cve_id: &str) -> Result<Option<CveRecord>> {
        trace!("Running CveConnector::get_cve()");
        let body = self.send(self.cve_request(cve_id)?)?;
        Ok(decode_page(&body)?.into_first())
    }

    /// Returns one page of CVEs.
    pub fn get_cves(&self, request: &PageRequest) -> Result<PageResponse> {
        trace!("Running CveConnector::get_cves()");
        let body = self.send(self.page_request(request)?)?;
        decode_page(&body)
    }

    /// Builds the request selecting a single CVE.
    fn cve_request(&self, cve_id: &str) -> Result<Request> {
        self.build_request(&[("cveId", cve_id.to_string())])
    }

    /// Builds the request of one page, rejecting invalid page sizes.
    fn page_request(&self, request: &PageRequest) -> Result<Request> {
        request.validate()?;
        self.build_request(&request.query_params())
    }

    /// Builds a GET request to the CVE endpoint.
    fn build_request(&self, params: &[(&str, String)]) -> Result<Request> {
        let url = self.config.create_api_url(CVE_API_PATH);
        debug!("Fetching CVEs: {} {:?}", url, params);

        let mut request = self.client.get(&url).query(params);
        if let Some(key) = self.config.api_key.as_ref() {
            request = request.header("apiKey", key);
        }
        Ok(request.build()?)
    }

    /// Sends the request and returns the body.
    fn send(&self, request: Request) -> Result<String> {
        let response = self.client.execute(request)?;
        let status = response.status();
        let body = response.text()?;
        read_body(status, body)
    }
}

/// Keeps the body of a successful response, turns any other into an error.
fn read_body(status: StatusCode, body: String) -> Result<String> {
    if !status.is_success() {
        error!("Invalid HTTP response code: {}", status);
        return Err(ConnectorError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

impl CveSource for CveConnector {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse> {
        self.get_cves(request)
    }
}
