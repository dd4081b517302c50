use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use polychat::config::{Config, Credentials};
use polychat::dispatch::ChatDispatcher;
use polychat::llm::ProviderRegistry;
use polychat::models::ModelRegistry;
use polychat::server::{self, AppState};

#[derive(Parser)]
#[command(name = "polychat", version, about = "Chat with several hosted LLMs through one endpoint")]
struct Cli {
    /// Path to the YAML config file (defaults apply when missing)
    #[arg(short, long, default_value = "polychat.yaml")]
    config: PathBuf,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env(|name| std::env::var(name).ok());
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let credentials = Credentials::from_env();
    let providers = ProviderRegistry::from_config(&config.gateway, &credentials);
    let dispatcher = ChatDispatcher::new(ModelRegistry::builtin(), providers, config.generation);

    let state = AppState::new(dispatcher, &config.server);
    let app = server::build_app(state, config.server.request_timeout_seconds);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, gateway = ?config.gateway.base_url, "Polychat listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
