//! The fixed result shape returned to tool callers.
//!
//! Every tool answers with `{status, message, data?, error?}` so the caller
//! (an LLM or the terminal chat) can tell outcomes apart without parsing
//! free text.

use rmcp::{ErrorData, model::CallToolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::error::OhipError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(err: &OhipError) -> Self {
        Self {
            status: Status::Error,
            message: err.to_string(),
            data: None,
            error: Some(ErrorBody {
                kind: err.kind().to_string(),
                message: err.to_string(),
                upstream_status: err.upstream_status(),
            }),
        }
    }

    /// Collapses an operation outcome into an envelope.
    #[must_use]
    pub fn from_result(result: Result<Self, OhipError>) -> Self {
        result.unwrap_or_else(|err| Self::failure(&err))
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Converts an operation outcome into an MCP tool result.
///
/// Domain failures (validation, authentication, upstream, network) are
/// returned as error-flagged tool results carrying the envelope, so the model
/// can read and react to them. Only internal failures become protocol errors.
pub fn into_tool_result(result: Result<Envelope, OhipError>) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(envelope) => Ok(CallToolResult::structured(
            serde_json::to_value(envelope).map_err(OhipError::from)?,
        )),
        Err(err) if err.is_internal() => Err(err.into()),
        Err(err) => Ok(CallToolResult::structured_error(
            serde_json::to_value(Envelope::failure(&err)).map_err(OhipError::from)?,
        )),
    }
}
