use anyhow::{Result, anyhow};
use axum::{Router, serve};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use rmcp::transport::{
    StreamableHttpServerConfig, StreamableHttpService,
    streamable_http_server::session::local::LocalSessionManager,
};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod chat;
mod mcp;
use mcp::{OhipMcpServer, config::SETTINGS, http::OhipClient};

#[derive(Parser)]
#[command(version, about = "OHIP claims MCP server and chat front end")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Serve the OHIP tools over MCP streamable HTTP at /mcp
    #[command(alias = "mcp")]
    Serve,
    /// Interactive terminal chat that routes requests onto the same tools
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load variables from .env file if it exists into the environment
    dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing; chat mode keeps stdout for the conversation
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".to_string().into());
    let registry = tracing_subscriber::registry().with(filter);
    match cli.mode {
        Mode::Serve => registry.with(tracing_subscriber::fmt::layer()).init(),
        Mode::Chat => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    // Configuration is required in both modes; fail fast if anything is missing
    let config = SETTINGS
        .as_ref()
        .map_err(|e| anyhow!("Failed to load configuration: {e}"))?
        .clone();
    let bind_address = config.bind_address();
    let server = OhipMcpServer::new(OhipClient::new(config)?);

    match cli.mode {
        Mode::Serve => serve_mcp(server, &bind_address).await,
        Mode::Chat => chat::run(server).await,
    }
}

async fn serve_mcp(server: OhipMcpServer, bind_address: &str) -> Result<()> {
    // Setting up the Streamable HTTP Service; every session shares one client
    info!("Setting up the Streamable HTTP Service for the OHIP tools");
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    // Starting the server... Setting up the router and TCP listener
    info!("Starting server on {}", bind_address);
    let router = Router::new().nest_service("/mcp", service);
    let tcp_listener = TcpListener::bind(bind_address).await?;

    // Graceful shutdown on CTRL+C
    let shutdown = async {
        signal::ctrl_c().await.unwrap_or_else(|e| {
            eprintln!("failed to install CTRL+C handler: {e}");
        });
    };

    // Finally start the server with graceful shutdown
    serve(tcp_listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
