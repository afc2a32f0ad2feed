//! Error types for remote calls.

use thiserror::Error;

/// Errors raised while talking to the GitLab REST API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connect, timeout, TLS).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("API request failed with status {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// A paginated fetch failed; pages fetched before the failure are discarded.
    #[error("Fetching '{url}' failed: {source}")]
    Pagination {
        /// URL of the page that failed.
        url: String,
        /// The underlying failure.
        #[source]
        source: Box<ClientError>,
    },

    /// An access-level code that does not map to a known permission.
    #[error("Unknown access level '{0}'")]
    InvalidPermission(String),

    /// The configured server URL or a followed link is not a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP client construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    /// Returns true if the server reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }
}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self {
        ClientError::InvalidUrl(e.to_string())
    }
}

/// Result type for remote calls.
pub type Result<T> = std::result::Result<T, ClientError>;
