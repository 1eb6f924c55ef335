//! Error types of the connector and of the bulk fetcher.

use thiserror::Error;

/// Result type alias using ConnectorError
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors raised while talking to the NVD API.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Error while communicating with NVD: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid HTTP response code: {status}")]
    Status { status: u16, body: String },

    #[error("Invalid JSON returned by NVD API: {0}")]
    MalformedResponse(String),

    #[error("resultsPerPage must be between 1 and {max}, got {requested}")]
    InvalidPageSize { requested: u32, max: u32 },

    #[error("Unable to create the HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl ConnectorError {
    /// Whether sending the same request again may succeed.
    ///
    /// Transport failures, timeouts, server errors and rate limiting are
    /// retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::MalformedResponse(_) | Self::InvalidPageSize { .. } | Self::ClientBuild(_) => {
                false
            }
        }
    }

    /// Whether the NVD refused the request because of its rate limit.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Status { status: 429, .. })
    }
}

/// Errors ending a bulk run. No snapshot is returned along with them.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Probe request failed, no page fetched: {source}")]
    Probe {
        #[source]
        source: ConnectorError,
    },

    #[error("Page request at offset {offset} failed after {pages_fetched} page(s): {source}")]
    Page {
        offset: u64,
        pages_fetched: u64,
        #[source]
        source: ConnectorError,
    },

    #[error("Fetch cancelled at offset {offset} after {pages_fetched} page(s)")]
    Cancelled { offset: u64, pages_fetched: u64 },
}

impl FetchError {
    /// The number of pages fetched before the run was aborted.
    pub fn pages_fetched(&self) -> u64 {
        match self {
            Self::Probe { .. } => 0,
            Self::Page { pages_fetched, .. } | Self::Cancelled { pages_fetched, .. } => {
                *pages_fetched
            }
        }
    }

    /// Whether some pages had been fetched before the run was aborted.
    pub fn made_progress(&self) -> bool {
        self.pages_fetched() > 0
    }
}

/// Errors reported by the command line application.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("CLI arguments haven't been read")]
    ArgsNotRead,
}
