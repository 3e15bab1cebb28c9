//! Error types for the PATCH API client.
//!
//! Every failure path in the crate is normalized into one [`Error`] variant.
//! Transport-level failures (DNS, connect, timeout) report status `0`; HTTP
//! failures carry the real status plus the decoded upstream payload. The
//! `Display` output never includes the upstream response body.

use thiserror::Error;

use crate::decode::ResponseBody;

/// Errors that can occur when talking to the PATCH API.
#[derive(Error, Debug)]
pub enum Error {
    /// Construction-time misconfiguration (bad base URL, bad timeout).
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// Per-call input rejected before any transport work (CR/LF injection,
    /// empty upload set, unsafe path segment).
    #[error("{0}")]
    Validation(String),

    /// The encoded multipart payload would exceed the configured ceiling.
    #[error("multipart payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The response body exceeded the configured ceiling.
    #[error("response exceeded {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// Network-level failure: connection refused, DNS, timeout, broken read.
    #[error("request failed: {method} {url}: {reason}")]
    Transport {
        method: String,
        url: String,
        reason: String,
    },

    /// Non-2xx HTTP response, including 3xx responses that were not followed.
    /// The payload is intentionally absent from the `Display` output.
    #[error("PATCH API request failed: {method} {url} returned status {status}")]
    Api {
        status: u16,
        method: String,
        url: String,
        payload: Option<ResponseBody>,
    },
}

impl Error {
    /// HTTP status associated with this error, or `0` when the failure never
    /// produced an HTTP response.
    pub fn status(&self) -> u16 {
        match self {
            Self::Api { status, .. } => *status,
            _ => 0,
        }
    }

    /// Decoded upstream payload for API errors.
    pub fn payload(&self) -> Option<&ResponseBody> {
        match self {
            Self::Api { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for PATCH client operations.
pub type Result<T> = std::result::Result<T, Error>;
