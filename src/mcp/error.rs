//! Error types for the OHIP MCP implementation.
//!
//! This module contains the error type shared by the token manager, the API
//! client and the tools. It provides:
//! - `OhipError`: one variant per failure kind a caller can act on
//! - Conversions from the HTTP and serialization layers
//! - Conversion to RMCP's `ErrorData` for protocol-level failures

use rmcp::ErrorData;
use rmcp::model::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OhipError {
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid parameters: {0}")]
    Validation(String),

    #[error("OHIP API returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OhipError {
    /// Stable machine-readable name, used in the error envelope.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingConfig(_) => "configuration_missing",
            Self::Authentication(_) => "authentication_failure",
            Self::Validation(_) => "validation_failure",
            Self::Upstream { .. } => "upstream_failure",
            Self::Network(_) => "network_failure",
            Self::Serialization(_) | Self::Internal(_) => "internal_failure",
        }
    }

    /// Upstream HTTP status, when the failure came from the OHIP API.
    #[must_use]
    pub const fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Failures the tool caller cannot do anything about are reported at the
    /// protocol level instead of inside a tool result.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Serialization(_) | Self::Internal(_))
    }
}

impl From<reqwest::Error> for OhipError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<reqwest_middleware::Error> for OhipError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => {
                Self::Network(format!("HTTP middleware error: {e}"))
            }
        }
    }
}

impl From<OhipError> for ErrorData {
    fn from(err: OhipError) -> Self {
        match err {
            OhipError::Validation(msg) => Self::new(ErrorCode::INVALID_PARAMS, msg, None),
            OhipError::MissingConfig(msg) => Self::new(ErrorCode::INTERNAL_ERROR, msg, None),
            OhipError::Serialization(e) => Self::new(ErrorCode::INTERNAL_ERROR, e.to_string(), None),
            OhipError::Internal(e) => Self::new(ErrorCode::INTERNAL_ERROR, e.to_string(), None),
            other => Self::new(ErrorCode::INTERNAL_ERROR, other.to_string(), None),
        }
    }
}
