//! Tool for retrieving a patient's OHIP claims history.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::mcp::{
    envelope::Envelope,
    error::OhipError,
    http::{ApiRequest, OhipClient},
    tools::{optional_date, required},
};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClaimsHistoryRequest {
    #[schemars(description = "Patient ID from the OHIP system, as returned by ohip_search_patient")]
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Only claims on or after this date, YYYY-MM-DD")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Only claims on or before this date, YYYY-MM-DD")]
    pub end_date: Option<String>,
}

impl ClaimsHistoryRequest {
    fn into_request(self) -> Result<(String, ApiRequest), OhipError> {
        let patient_id = required("patient_id", &self.patient_id)?;
        let start = optional_date("start_date", self.start_date.as_deref())?;
        let end = optional_date("end_date", self.end_date.as_deref())?;

        if let Some((start, end)) = start.zip(end).filter(|(start, end)| start > end) {
            return Err(OhipError::Validation(format!(
                "start_date {start} is after end_date {end}"
            )));
        }

        let request = ApiRequest::get(["patients", patient_id.as_str(), "claims"])
            .query("start_date", start.map(|d| d.format("%Y-%m-%d").to_string()))
            .query("end_date", end.map(|d| d.format("%Y-%m-%d").to_string()));
        Ok((patient_id, request))
    }
}

pub async fn get_patient_claims(
    client: &OhipClient,
    args: ClaimsHistoryRequest,
) -> Result<Envelope, OhipError> {
    let (patient_id, request) = args.into_request()?;
    info!(%patient_id, "Getting claims history");

    let data = client.call(&request).await?;
    Ok(Envelope::success(
        format!("Claims retrieved for patient {patient_id}"),
        data,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::{
        envelope::{Envelope, Status},
        http::client::tests::{client, mount_token},
    };
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    fn request(patient_id: &str, start: Option<&str>, end: Option<&str>) -> ClaimsHistoryRequest {
        ClaimsHistoryRequest {
            patient_id: patient_id.to_string(),
            start_date: start.map(ToString::to_string),
            end_date: end.map(ToString::to_string),
        }
    }

    #[tokio::test]
    async fn fetches_claims_in_date_range() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;
        Mock::given(method("GET"))
            .and(path("/patients/p-42/claims"))
            .and(query_param("start_date", "2025-01-01"))
            .and(query_param("end_date", "2025-06-30"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "claim_id": "c1", "service_code": "A001", "amount": "33.70" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let envelope = get_patient_claims(
            &client(&server),
            request("p-42", Some("2025-01-01"), Some("2025-06-30")),
        )
        .await
        .unwrap();
        assert_eq!(envelope.message, "Claims retrieved for patient p-42");
        assert_eq!(envelope.data.unwrap()[0]["claim_id"], "c1");
    }

    #[tokio::test]
    async fn upstream_500_is_reported_with_status_and_body() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;
        Mock::given(method("GET"))
            .and(path("/patients/p-42/claims"))
            .respond_with(
                ResponseTemplate::new(500).set_body_string(r#"{"message":"claims service down"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = get_patient_claims(&client(&server), request("p-42", None, None)).await;
        let envelope = Envelope::from_result(result);
        assert_eq!(envelope.status, Status::Error);
        let error = envelope.error.unwrap();
        assert_eq!(error.kind, "upstream_failure");
        assert_eq!(error.upstream_status, Some(500));
        assert!(error.message.contains("claims service down"));
    }

    #[test]
    fn rejects_blank_patient_and_inverted_range() {
        assert!(matches!(
            request("  ", None, None).into_request(),
            Err(OhipError::Validation(_))
        ));
        assert!(matches!(
            request("p1", Some("2025-06-30"), Some("2025-01-01")).into_request(),
            Err(OhipError::Validation(_))
        ));
        assert!(matches!(
            request("p1", Some("June 1st"), None).into_request(),
            Err(OhipError::Validation(_))
        ));
    }
}
