//! Tool for searching patients registered with OHIP.
//!
//! All filters are optional; absent or blank ones are left out of the query.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::mcp::{
    envelope::Envelope,
    error::OhipError,
    http::{ApiRequest, OhipClient},
    tools::{optional, optional_date},
};

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct PatientSearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Patient's health card number, e.g. 1234-567-890")]
    pub health_card_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Patient's first name")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Patient's last name")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Patient's date of birth in YYYY-MM-DD format, e.g. 1980-04-23")]
    pub date_of_birth: Option<String>,
}

impl PatientSearchRequest {
    fn into_request(self) -> Result<ApiRequest, OhipError> {
        let date_of_birth = optional_date("date_of_birth", self.date_of_birth.as_deref())?;

        Ok(ApiRequest::get(["patients", "search"])
            .query("health_card_number", optional(self.health_card_number.as_deref()))
            .query("first_name", optional(self.first_name.as_deref()))
            .query("last_name", optional(self.last_name.as_deref()))
            .query(
                "date_of_birth",
                date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            ))
    }
}

pub async fn search_patients(
    client: &OhipClient,
    args: PatientSearchRequest,
) -> Result<Envelope, OhipError> {
    let request = args.into_request()?;
    info!("Searching for patients");

    let data = client.call(&request).await?;
    Ok(Envelope::success("Patient search completed", data))
}
