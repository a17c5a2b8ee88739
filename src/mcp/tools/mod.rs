//! MCP tools for interacting with the OHIP API.
//!
//! Each module implements a specific tool:
//! - `patients`: Search patients by health card, name or date of birth
//! - `claims`: Claims history for a patient
//! - `submit_claim`: Submit a new claim
//! - `diagnostics`: OAuth token and connection tests
//!
//! All tools validate their arguments before any network call and answer
//! with an `Envelope`. `invoke` dispatches by tool name for callers that hold
//! untyped arguments, such as the terminal chat.

pub mod claims;
pub mod diagnostics;
pub mod patients;
pub mod submit_claim;

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::mcp::{envelope::Envelope, error::OhipError, http::OhipClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    SearchPatient,
    GetPatientClaims,
    SubmitClaim,
    TestOauthToken,
    TestApiConnection,
}

impl ToolName {
    pub const ALL: [Self; 5] = [
        Self::SearchPatient,
        Self::GetPatientClaims,
        Self::SubmitClaim,
        Self::TestOauthToken,
        Self::TestApiConnection,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SearchPatient => "ohip_search_patient",
            Self::GetPatientClaims => "ohip_get_patient_claims",
            Self::SubmitClaim => "ohip_submit_claim",
            Self::TestOauthToken => "test_oauth_token",
            Self::TestApiConnection => "test_api_connection",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = OhipError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| OhipError::Validation(format!("Unknown tool: {name}")))
    }
}

/// Runs `tool` with JSON `arguments`, validating them first.
pub async fn invoke(client: &OhipClient, tool: ToolName, arguments: Value) -> Result<Envelope, OhipError> {
    match tool {
        ToolName::SearchPatient => patients::search_patients(client, parse_arguments(arguments)?).await,
        ToolName::GetPatientClaims => claims::get_patient_claims(client, parse_arguments(arguments)?).await,
        ToolName::SubmitClaim => submit_claim::submit_claim(client, parse_arguments(arguments)?).await,
        ToolName::TestOauthToken => diagnostics::test_oauth_token(client).await,
        ToolName::TestApiConnection => diagnostics::test_api_connection(client).await,
    }
}

fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, OhipError> {
    let arguments = if arguments.is_null() {
        Value::Object(Map::new())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| OhipError::Validation(e.to_string()))
}

/// Trims a required field, rejecting blank values.
pub(crate) fn required(field: &str, value: &str) -> Result<String, OhipError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(OhipError::Validation(format!("{field} is required and cannot be empty")));
    }
    Ok(value.to_string())
}

/// Trims an optional field; blank counts as absent.
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(ToString::to_string)
}

/// Parses a `YYYY-MM-DD` date.
pub(crate) fn date(field: &str, value: &str) -> Result<NaiveDate, OhipError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        OhipError::Validation(format!("{field} must be a date in YYYY-MM-DD format, got '{value}'"))
    })
}

pub(crate) fn optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, OhipError> {
    optional(value).map(|v| date(field, &v)).transpose()
}
