//! Medical history assistant API server.
//!
//! Usage:
//!   medhist-api --config medhist.toml
//!   medhist-api --port 8501 --bind 0.0.0.0
//!   medhist-api --memory-backend in-memory
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY` - Completion and embedding credential (chat is disabled without it)
//! - `MEDHIST_BIND_ADDR` - Server bind address (default: 127.0.0.1)
//! - `MEDHIST_PORT` - Server port (default: 8501)
//! - `RUST_LOG` - Log filter

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use medhist_api::{serve, AppState};
use medhist_assistant::AssistantConfig;
use medhist_memory::MemoryBackend;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "medhist-api", version, about = "AI medical history assistant server")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "MEDHIST_PORT")]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long, env = "MEDHIST_BIND_ADDR")]
    bind: Option<String>,

    /// Memory backend: qdrant or in-memory
    #[arg(long)]
    memory_backend: Option<MemoryBackend>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,medhist_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            AssistantConfig::from_file(path)?
        }
        None => {
            tracing::info!("Using default configuration");
            AssistantConfig::default()
        }
    };

    // CLI flag > env var > config file
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(backend) = cli.memory_backend {
        config.memory.backend = backend;
    }

    if config.server.bind == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0 exposes patient data to all network interfaces. \
             Change the default [auth] credentials before doing this."
        );
    }

    let state = AppState::from_config(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    serve(Arc::new(state), addr).await?;

    Ok(())
}
