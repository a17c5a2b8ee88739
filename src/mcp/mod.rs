//! OHIP Model Context Protocol implementation.
//!
//! This module provides MCP tools for interacting with the OHIP claims REST API.
//! The implementation is organized into:
//!
//! - `config`: Environment-based settings
//! - `error`: Error types and conversions
//! - `envelope`: The result shape returned by every tool
//! - `http`: Token manager, HTTP client and API communication
//! - `tools`: Individual MCP tools for specific OHIP operations
//!
//! The main entry point is `OhipMcpServer`, which implements the MCP server
//! handler and registers all tools.

pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod tools;

use axum::http::request;
use rmcp::{
    ErrorData, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Implementation, InitializeRequestParam, InitializeResult,
        ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use tracing::info;

use crate::mcp::{
    envelope::into_tool_result,
    http::OhipClient,
    tools::{
        claims::{self, ClaimsHistoryRequest},
        diagnostics,
        patients::{self, PatientSearchRequest},
        submit_claim::{self, ClaimSubmission},
    },
};

#[derive(Clone)]
pub struct OhipMcpServer {
    client: OhipClient,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl OhipMcpServer {
    /// Every session shares `client`, and with it the cached token.
    pub fn new(client: OhipClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    // Thin delegating methods so the `tool_router` proc-macro (which scans
    // this impl block) can discover and register the tools. The operations
    // live in `mcp::tools::*`.

    #[tool(
        name = "ohip_search_patient",
        description = "Search for patients in the OHIP system by health card number, first name, last name and/or date of birth (YYYY-MM-DD). All filters are optional."
    )]
    async fn search_patient(
        &self,
        Parameters(args): Parameters<PatientSearchRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        into_tool_result(patients::search_patients(&self.client, args).await)
    }

    #[tool(
        name = "ohip_get_patient_claims",
        description = "Get the claims history for a patient by OHIP patient ID, optionally limited to a date range (YYYY-MM-DD)."
    )]
    async fn get_patient_claims(
        &self,
        Parameters(args): Parameters<ClaimsHistoryRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        into_tool_result(claims::get_patient_claims(&self.client, args).await)
    }

    #[tool(
        name = "ohip_submit_claim",
        description = "Submit a new claim to OHIP. Requires patient ID, provider ID, service code, service date (YYYY-MM-DD) and amount as a decimal string. Ask the user for any missing field instead of guessing."
    )]
    async fn submit_claim(
        &self,
        Parameters(args): Parameters<ClaimSubmission>,
    ) -> Result<CallToolResult, ErrorData> {
        into_tool_result(submit_claim::submit_claim(&self.client, args).await)
    }

    #[tool(
        name = "test_oauth_token",
        description = "Test the OAuth token endpoint and authentication. Returns a token preview and its expiry."
    )]
    async fn test_oauth_token(&self) -> Result<CallToolResult, ErrorData> {
        into_tool_result(diagnostics::test_oauth_token(&self.client).await)
    }

    #[tool(
        name = "test_api_connection",
        description = "Test the full API connection including OAuth authentication."
    )]
    async fn test_api_connection(&self) -> Result<CallToolResult, ErrorData> {
        into_tool_result(diagnostics::test_api_connection(&self.client).await)
    }
}

impl OhipMcpServer {
    #[must_use]
    pub fn client(&self) -> &OhipClient {
        &self.client
    }

    /// Tool descriptors as advertised to MCP clients.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }
}

#[tool_handler]
impl ServerHandler for OhipMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "OHIP claims MCP server: search patients, review claims history, submit claims, and test API authentication."
                    .to_string(),
            ),
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, ErrorData> {
        if let Some(http_request_part) = context.extensions.get::<request::Parts>() {
            let initialize_uri = &http_request_part.uri;
            info!(%initialize_uri, "initialize from http server");
        }
        Ok(self.get_info())
    }
}
