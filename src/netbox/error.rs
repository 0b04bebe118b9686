//! NetBox client errors

use thiserror::Error;

/// Errors that can occur when talking to the NetBox API
#[derive(Debug, Error)]
pub enum NetBoxError {
    /// Transport-level failure (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// NetBox answered with a non-success status
    #[error("NetBox API error: {status} - {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// Token rejected (401/403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A `get` lookup matched more than one object
    #[error("get() returned more than one result for {endpoint} ({count} matches)")]
    MultipleResults {
        /// Endpoint that was queried
        endpoint: String,
        /// Number of matching objects reported by NetBox
        count: u64,
    },

    /// Response body could not be decoded
    #[error("error decoding response from {url}: {message}")]
    Decode {
        /// Request URL
        url: String,
        /// Decoder message plus a body excerpt
        message: String,
    },

    /// Base URL could not be parsed or joined
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
