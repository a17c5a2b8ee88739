//! Diagnostic tools: OAuth token acquisition and API connection tests.

use serde_json::json;
use tracing::info;

use crate::mcp::{envelope::Envelope, error::OhipError, http::OhipClient};

/// Acquires a token (from cache if still valid) and reports its shape without
/// exposing the full secret.
pub async fn test_oauth_token(client: &OhipClient) -> Result<Envelope, OhipError> {
    info!("Testing OAuth token endpoint");
    let cached = client.tokens().current().await;
    let token = client.tokens().token().await?;
    let from_cache = cached.is_some_and(|c| c.secret() == token.secret());

    Ok(Envelope::success(
        "OAuth token obtained successfully",
        json!({
            "token_preview": token.preview(),
            "token_length": token.secret().len(),
            "expires_at": token.expires_at().map(|at| at.to_rfc3339()),
            "from_cache": from_cache,
        }),
    ))
}

pub async fn test_api_connection(client: &OhipClient) -> Result<Envelope, OhipError> {
    info!("Testing API connection");
    let oauth_test = test_oauth_token(client).await?;
    let config = client.config();

    Ok(Envelope::success(
        "API connection test successful",
        json!({
            "oauth_test": oauth_test,
            "base_url": config.host,
            "enterprise_id": config.enterprise_id,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::http::client::tests::{client, mount_token};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    #[tokio::test]
    async fn token_test_reports_preview_only() {
        let server = MockServer::start().await;
        mount_token(&server, "abcdefghijklmnopqrstuvwxyz0123456789", 1).await;

        let envelope = test_oauth_token(&client(&server)).await.unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data["token_preview"], "abcdefghijklmnopqrst...");
        assert_eq!(data["token_length"], 36);
        assert!(data["expires_at"].is_string());
        assert_eq!(data["from_cache"], false);
    }

    #[tokio::test]
    async fn connection_test_includes_settings_and_reuses_token() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;

        let ohip = client(&server);
        test_oauth_token(&ohip).await.unwrap();
        let envelope = test_api_connection(&ohip).await.unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data["base_url"], server.uri());
        assert_eq!(data["enterprise_id"], "PSALES");
        assert_eq!(data["oauth_test"]["status"], "success");
        assert_eq!(data["oauth_test"]["data"]["from_cache"], true);
    }

    #[tokio::test]
    async fn token_test_surfaces_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v1/tokens"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "unauthorized_client" })))
            .mount(&server)
            .await;

        let err = test_oauth_token(&client(&server)).await.unwrap_err();
        assert_eq!(err.kind(), "authentication_failure");
    }
}
