//! Authenticated HTTP client for the OHIP REST API.
//!
//! This module provides:
//! - The shared middleware HTTP client with request tracing
//! - The OHIP application headers sent with every request
//! - `OhipClient`, which attaches the bearer token and applies the
//!   single refresh-and-retry on a 401

use std::{sync::Arc, time::Duration};

use http::{
    Extensions, HeaderMap, HeaderName, HeaderValue, StatusCode,
    header::{ACCEPT, CONTENT_TYPE},
};
use reqwest::{Method, Request, Response, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Result as MiddlewareResult};
use reqwest_tracing::{
    ReqwestOtelSpanBackend, TracingMiddleware, default_on_request_end, reqwest_otel_span,
};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{Span, debug, warn};

use crate::mcp::{
    config::OhipConfig,
    error::OhipError,
    http::token::{BearerToken, TokenManager},
};

const APP_KEY_HEADER: HeaderName = HeaderName::from_static("x-app-key");
const ENTERPRISE_ID_HEADER: HeaderName = HeaderName::from_static("enterpriseid");
const HASHED_APP_KEY_HEADER: HeaderName = HeaderName::from_static("hashedappkey");

// Span backend for outgoing requests. Headers and bodies stay out of the span:
// they carry credentials and patient data.
#[allow(dead_code)]
struct CustomTracing;

impl ReqwestOtelSpanBackend for CustomTracing {
    fn on_request_start(req: &Request, _extension: &mut Extensions) -> Span {
        reqwest_otel_span!(name = "ohip-api-request", req)
    }

    fn on_request_end(
        span: &Span,
        outcome: &MiddlewareResult<Response>,
        _extension: &mut Extensions,
    ) {
        default_on_request_end(span, outcome);
    }
}

/// Builds the HTTP client shared by token and API requests.
pub(crate) fn build_http_client(timeout: Duration) -> Result<ClientWithMiddleware, OhipError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        // Neither token nor API requests follow redirects; a 3xx is surfaced as-is.
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    Ok(ClientBuilder::new(client)
        .with(TracingMiddleware::<CustomTracing>::new())
        .build())
}

/// Lower-hex SHA-256 of the application key, sent as `HashedAppKey`.
#[must_use]
pub fn hashed_app_key(app_key: &str) -> String {
    format!("{:x}", Sha256::digest(app_key.as_bytes()))
}

/// Application headers required by both the identity endpoint and the API.
pub(crate) fn app_headers(config: &OhipConfig) -> Result<HeaderMap, OhipError> {
    let value = |name: &str, raw: &str| {
        HeaderValue::from_str(raw)
            .map_err(|e| OhipError::MissingConfig(format!("{name} is not a valid header value: {e}")))
    };

    let mut app_key = value("OHIP_APP_KEY", &config.app_key)?;
    app_key.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(APP_KEY_HEADER, app_key);
    headers.insert(
        ENTERPRISE_ID_HEADER,
        value("OHIP_ENTERPRISE_ID", &config.enterprise_id)?,
    );
    headers.insert(
        HASHED_APP_KEY_HEADER,
        value("HashedAppKey", &hashed_app_key(&config.app_key))?,
    );
    Ok(headers)
}

/// A request against the OHIP API, kept so it can be re-sent after a
/// token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    /// `segments` are percent-encoded individually, so ids taken from tool
    /// arguments cannot alter the path.
    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: Method::GET,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post<I, S>(segments: I, body: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get(segments)
        }
    }

    /// Adds a query parameter; `None` values are left out.
    #[must_use]
    pub fn query(mut self, key: &'static str, value: Option<String>) -> Self {
        if let Some(value) = value {
            self.query.push((key, value));
        }
        self
    }

    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

#[derive(Clone)]
pub struct OhipClient {
    config: Arc<OhipConfig>,
    http: ClientWithMiddleware,
    app_headers: HeaderMap,
    tokens: Arc<TokenManager>,
}

impl OhipClient {
    pub fn new(config: OhipConfig) -> Result<Self, OhipError> {
        let config = Arc::new(config);
        let http = build_http_client(config.http_timeout)?;
        let app_headers = app_headers(&config)?;
        let tokens = Arc::new(TokenManager::new(
            Arc::clone(&config),
            http.clone(),
            app_headers.clone(),
        ));

        Ok(Self {
            config,
            http,
            app_headers,
            tokens,
        })
    }

    #[must_use]
    pub fn config(&self) -> &OhipConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Sends `request` with a bearer token and returns the JSON payload.
    ///
    /// A 401 response causes exactly one token refresh and one retry. A second
    /// 401 is reported as an authentication failure; any other non-2xx status
    /// is an upstream failure and is never retried.
    ///
    /// # Errors
    /// * `Authentication` - no token could be obtained, or the API rejected a
    ///   freshly issued one
    /// * `Upstream` - the API answered with a non-2xx status
    /// * `Network` - timeout or connection failure
    pub async fn call(&self, request: &ApiRequest) -> Result<Value, OhipError> {
        let token = self.tokens.token().await?;
        let response = self.dispatch(request, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read_response(response).await;
        }

        warn!(path = %request.path(), "OHIP API rejected the access token, refreshing once");
        let token = self.tokens.refresh_rejected(&token).await?;
        let response = self.dispatch(request, &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            let body = response.text().await.unwrap_or_default();
            return Err(OhipError::Authentication(format!(
                "OHIP API rejected a freshly issued token: {body}"
            )));
        }

        read_response(response).await
    }

    fn url(&self, request: &ApiRequest) -> Result<Url, OhipError> {
        let mut url = Url::parse(&self.config.host)
            .map_err(|e| OhipError::MissingConfig(format!("OHIP_HOST is not a valid URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| OhipError::MissingConfig("OHIP_HOST cannot be used as a base URL".to_string()))?
            .pop_if_empty()
            .extend(&request.segments);
        Ok(url)
    }

    async fn dispatch(&self, request: &ApiRequest, token: &BearerToken) -> Result<Response, OhipError> {
        let url = self.url(request)?;
        debug!(method = %request.method, path = %url.path(), "Calling OHIP API");

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(self.app_headers.clone())
            .bearer_auth(token.secret())
            .header(ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        Ok(builder.send().await?)
    }
}

async fn read_response(response: Response) -> Result<Value, OhipError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!(status = status.as_u16(), "OHIP API request failed");
        return Err(OhipError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body).unwrap_or_else(|_| Value::String(body)))
}
