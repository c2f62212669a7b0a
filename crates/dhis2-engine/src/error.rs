//! Typed errors for the DHIS2 engine.

use thiserror::Error;

/// Errors surfaced by query execution, introspection and connection checks.
///
/// Cloneable so one in-flight remote request can hand the same outcome to
/// every caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// Connection or endpoint configuration is structurally invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The remote did not answer within the connection's timeout.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// Network-level failure before an HTTP status was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response from the remote (except the tolerated introspection conflict).
    #[error("DHIS2 rejected the request ({status}): {body}")]
    RemoteRejection { status: u16, body: String },

    /// The response did not match the shape expected for the endpoint.
    #[error("cannot normalize response: {0}")]
    Normalization(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn normalization(msg: impl Into<String>) -> Self {
        EngineError::Normalization(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        EngineError::Configuration(msg.into())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        let target = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "DHIS2".to_string());
        if e.is_timeout() {
            EngineError::Timeout(target)
        } else if e.is_builder() {
            EngineError::Configuration(e.to_string())
        } else {
            EngineError::Transport(e.to_string())
        }
    }
}

impl From<url::ParseError> for EngineError {
    fn from(e: url::ParseError) -> Self {
        EngineError::Configuration(format!("invalid URL: {}", e))
    }
}
