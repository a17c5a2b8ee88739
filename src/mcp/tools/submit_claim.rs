//! Tool for submitting a new claim to OHIP.
//!
//! Every field is required. The amount is an opaque decimal string: it is
//! checked for shape only and forwarded exactly as written, with no rounding
//! or currency handling.

use std::borrow::Cow;

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;
use tracing::info;

use crate::mcp::{
    envelope::Envelope,
    error::OhipError,
    http::{ApiRequest, OhipClient},
    tools::{date, required},
};

/// A claim amount such as `"33.70"`.
///
/// Whole JSON numbers are exact and accepted as-is. A JSON number with a
/// fraction or exponent has already lost its written form (`33.70` arrives as
/// `33.7`), so it is rejected and the caller is asked for a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount {
    text: String,
    exact: bool,
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self { text, exact: true },
            Raw::Number(number) => Self {
                exact: !number.is_f64(),
                text: number.to_string(),
            },
        })
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl JsonSchema for Amount {
    fn schema_name() -> Cow<'static, str> {
        "Amount".into()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "description": "Non-negative decimal amount. Send amounts with cents as a string, e.g. \"33.70\"; whole numbers may be sent as JSON integers.",
            "oneOf": [
                { "type": "string", "pattern": "^[0-9]+(\\.[0-9]+)?$" },
                { "type": "integer", "minimum": 0 }
            ]
        })
    }
}

impl Amount {
    fn validate(&self) -> Result<String, OhipError> {
        if !self.exact {
            return Err(OhipError::Validation(format!(
                "amount {} was sent as a fractional JSON number; send it as a string such as \"33.70\"",
                self.text
            )));
        }

        let raw = self.text.trim();
        let (whole, fraction) = raw.split_once('.').map_or((raw, None), |(w, f)| (w, Some(f)));
        let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

        if digits(whole) && fraction.is_none_or(digits) {
            Ok(raw.to_string())
        } else {
            Err(OhipError::Validation(format!(
                "amount must be a non-negative decimal such as 33.70, got '{}'",
                self.text
            )))
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClaimSubmission {
    #[schemars(description = "Patient ID from the OHIP system")]
    pub patient_id: String,
    #[schemars(description = "Healthcare provider ID")]
    pub provider_id: String,
    #[schemars(description = "OHIP service (fee) code, e.g. A001")]
    pub service_code: String,
    #[schemars(description = "Date the service was provided, YYYY-MM-DD")]
    pub service_date: String,
    #[schemars(description = "Claim amount as a decimal string, e.g. \"33.70\"")]
    pub amount: Amount,
}

impl ClaimSubmission {
    fn into_request(self) -> Result<ApiRequest, OhipError> {
        let patient_id = required("patient_id", &self.patient_id)?;
        let provider_id = required("provider_id", &self.provider_id)?;
        let service_code = required("service_code", &self.service_code)?.to_uppercase();
        let service_date = date("service_date", &required("service_date", &self.service_date)?)?;
        let amount = self.amount.validate()?;

        Ok(ApiRequest::post(
            ["claims"],
            json!({
                "patient_id": patient_id,
                "provider_id": provider_id,
                "service_code": service_code,
                "service_date": service_date.format("%Y-%m-%d").to_string(),
                "amount": amount,
            }),
        ))
    }
}

pub async fn submit_claim(client: &OhipClient, args: ClaimSubmission) -> Result<Envelope, OhipError> {
    let request = args.into_request()?;
    info!("Submitting claim");

    let data = client.call(&request).await?;
    Ok(Envelope::success("Claim submitted successfully", data))
}
