//! Environment-based configuration for the OHIP client and the MCP server.
//!
//! Settings are read once at startup (after `.env` has been loaded) and are
//! immutable for the lifetime of the process.

use std::{env, sync::LazyLock, time::Duration};

use oauth2::ClientSecret;

use crate::mcp::error::OhipError;

const DEFAULT_ENTERPRISE_ID: &str = "PSALES";
const DEFAULT_TOKEN_SCOPE: &str = "urn:opc:hgbu:ws:__myscopes__";
const DEFAULT_MCP_HOST: &str = "0.0.0.0";
const DEFAULT_MCP_PORT: u16 = 3001;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REFRESH_SKEW_SECS: u64 = 300;

/// Process-wide settings, loaded from the environment on first use.
pub static SETTINGS: LazyLock<Result<OhipConfig, String>> =
    LazyLock::new(|| OhipConfig::from_env().map_err(|e| e.to_string()));

#[derive(Clone, Debug)]
pub struct OhipConfig {
    /// Base URL shared by the identity endpoint and the OHIP REST API.
    pub host: String,
    pub client_id: String,
    pub client_secret: ClientSecret,
    pub enterprise_id: String,
    pub app_key: String,
    pub token_scope: String,
    pub http_timeout: Duration,
    /// A cached token is treated as expired this long before its real expiry.
    pub refresh_skew: Duration,
    pub mcp_host: String,
    pub mcp_port: u16,
}

impl OhipConfig {
    pub fn from_env() -> Result<Self, OhipError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, OhipError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| OhipError::MissingConfig(format!("{key} must be set")))
        };
        let number = |key: &str, default: u64| -> Result<u64, OhipError> {
            get(key).map_or(Ok(default), |raw| {
                raw.parse()
                    .map_err(|e| OhipError::MissingConfig(format!("{key} is not a valid number: {e}")))
            })
        };

        let host = required("OHIP_HOST")?.trim_end_matches('/').to_string();
        reqwest::Url::parse(&host)
            .map_err(|e| OhipError::MissingConfig(format!("OHIP_HOST is not a valid URL: {e}")))?;

        let mcp_port = number("MCP_SERVER_PORT", u64::from(DEFAULT_MCP_PORT))?;
        let mcp_port = u16::try_from(mcp_port)
            .map_err(|_| OhipError::MissingConfig(format!("MCP_SERVER_PORT out of range: {mcp_port}")))?;

        Ok(Self {
            host,
            client_id: required("OHIP_CLIENT_ID")?,
            client_secret: ClientSecret::new(required("OHIP_CLIENT_SECRET")?),
            enterprise_id: get("OHIP_ENTERPRISE_ID").unwrap_or_else(|| DEFAULT_ENTERPRISE_ID.to_string()),
            app_key: required("OHIP_APP_KEY")?,
            token_scope: get("OHIP_TOKEN_SCOPE").unwrap_or_else(|| DEFAULT_TOKEN_SCOPE.to_string()),
            http_timeout: Duration::from_secs(number("OHIP_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?),
            refresh_skew: Duration::from_secs(number(
                "OHIP_TOKEN_REFRESH_SKEW_SECS",
                DEFAULT_REFRESH_SKEW_SECS,
            )?),
            mcp_host: get("MCP_SERVER_HOST").unwrap_or_else(|| DEFAULT_MCP_HOST.to_string()),
            mcp_port,
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.mcp_host, self.mcp_port)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Minimal valid configuration pointing at `host`, without refresh skew.
    pub(crate) fn test_config(host: &str) -> OhipConfig {
        let vars: HashMap<&str, String> = HashMap::from([
            ("OHIP_HOST", host.to_string()),
            ("OHIP_CLIENT_ID", "client-id".to_string()),
            ("OHIP_CLIENT_SECRET", "client-secret".to_string()),
            ("OHIP_APP_KEY", "app-key".to_string()),
            ("OHIP_TOKEN_REFRESH_SKEW_SECS", "0".to_string()),
            ("OHIP_HTTP_TIMEOUT_SECS", "5".to_string()),
        ]);
        OhipConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn applies_defaults() {
        let vars = HashMap::from([
            ("OHIP_HOST", "https://ohip.example.com/"),
            ("OHIP_CLIENT_ID", "id"),
            ("OHIP_CLIENT_SECRET", "secret"),
            ("OHIP_APP_KEY", "key"),
        ]);
        let config = OhipConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();

        assert_eq!(config.host, "https://ohip.example.com");
        assert_eq!(config.enterprise_id, "PSALES");
        assert_eq!(config.token_scope, DEFAULT_TOKEN_SCOPE);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.refresh_skew, Duration::from_secs(300));
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
        assert_eq!(config.client_secret.secret(), "secret");
    }

    #[test]
    fn reports_missing_required_variable() {
        let vars = HashMap::from([
            ("OHIP_HOST", "https://ohip.example.com"),
            ("OHIP_CLIENT_ID", "id"),
            ("OHIP_APP_KEY", "key"),
        ]);
        let err = OhipConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap_err();
        assert!(matches!(err, OhipError::MissingConfig(ref msg) if msg.contains("OHIP_CLIENT_SECRET")));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let vars = HashMap::from([
            ("OHIP_HOST", "https://ohip.example.com"),
            ("OHIP_CLIENT_ID", "   "),
            ("OHIP_CLIENT_SECRET", "secret"),
            ("OHIP_APP_KEY", "key"),
        ]);
        let err = OhipConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap_err();
        assert!(matches!(err, OhipError::MissingConfig(ref msg) if msg.contains("OHIP_CLIENT_ID")));
    }

    #[test]
    fn rejects_bad_port_and_host() {
        let vars = HashMap::from([
            ("OHIP_HOST", "https://ohip.example.com"),
            ("OHIP_CLIENT_ID", "id"),
            ("OHIP_CLIENT_SECRET", "secret"),
            ("OHIP_APP_KEY", "key"),
            ("MCP_SERVER_PORT", "70000"),
        ]);
        assert!(OhipConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).is_err());

        let vars = HashMap::from([
            ("OHIP_HOST", "not a url"),
            ("OHIP_CLIENT_ID", "id"),
            ("OHIP_CLIENT_SECRET", "secret"),
            ("OHIP_APP_KEY", "key"),
        ]);
        assert!(OhipConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).is_err());
    }
}
