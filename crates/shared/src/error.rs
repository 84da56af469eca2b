//! Pipeline errors reported to callers of the engine

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use optimize_domain::DomainError;

/// HTTP-style status reported for a request that timed out
pub const TIMEOUT_STATUS: u16 = 408;
const TIMEOUT_TITLE: &str = "Request Timeout";
const TIMEOUT_DETAIL: &str = "Update/Get proposition request resulted in a timeout.";
const UNEXPECTED_TITLE: &str = "Unexpected Error";
const UNEXPECTED_DETAIL: &str = "An unexpected error occurred.";

/// Broad classification of an upstream error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CallbackTimeout,
    Unexpected,
}

/// Error object returned by the personalization service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamError {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Map<String, Value>>,
}

impl UpstreamError {
    /// The error reported when a request's deadline elapses.
    pub fn timeout() -> Self {
        Self {
            error_type: None,
            status: Some(TIMEOUT_STATUS),
            title: Some(TIMEOUT_TITLE.to_string()),
            detail: Some(TIMEOUT_DETAIL.to_string()),
            report: None,
        }
    }

    pub fn unexpected() -> Self {
        Self {
            error_type: None,
            status: None,
            title: Some(UNEXPECTED_TITLE.to_string()),
            detail: Some(UNEXPECTED_DETAIL.to_string()),
            report: None,
        }
    }

    /// Only 408 maps to a callback timeout; every other status is unexpected.
    pub fn kind(&self) -> ErrorKind {
        match self.status {
            Some(TIMEOUT_STATUS) => ErrorKind::CallbackTimeout,
            _ => ErrorKind::Unexpected,
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title.as_deref().unwrap_or(UNEXPECTED_TITLE))?;
        if let Some(status) = self.status {
            write!(f, " ({status})")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for UpstreamError {}

/// Errors produced by the proposition pipeline
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizeError {
    /// No requestable scope was supplied
    #[error("Invalid decision scopes: {0}")]
    InvalidScope(String),

    /// Required configuration is absent; nothing was sent
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    /// The request deadline elapsed before completion
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered with an error
    #[error("Upstream error: {0}")]
    Upstream(UpstreamError),

    /// A response could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A domain rule rejected the call
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// An event could not be handed to the host
    #[error("Failed to dispatch event: {0}")]
    Dispatch(String),

    /// The event-processing sequence has shut down
    #[error("Optimize extension is no longer running")]
    Cancelled,
}

impl OptimizeError {
    /// The service-style error describing this failure.
    pub fn to_upstream_error(&self) -> UpstreamError {
        match self {
            Self::Timeout(_) => UpstreamError::timeout(),
            Self::Upstream(error) => error.clone(),
            _ => UpstreamError::unexpected(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<UpstreamError> for OptimizeError {
    fn from(error: UpstreamError) -> Self {
        Self::Upstream(error)
    }
}
