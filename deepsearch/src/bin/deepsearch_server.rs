//! `deepsearch-server`: serves the streaming web search endpoint.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use deepsearch::config::load_config;
use deepsearch::observability::init_tracing;
use deepsearch::server::{build_pipeline, router};

#[derive(Parser, Debug)]
#[command(name = "deepsearch-server", version, about = "Retrieval-augmented web search server")]
struct Args {
    /// Configuration file (defaults to ./deepsearch.toml when present).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration.
    #[arg(long)]
    bind: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing("info", args.json_logs);

    let mut config = load_config(args.config.as_deref()).context("loading configuration")?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    let pipeline = build_pipeline(&config).context("building pipeline")?;
    let app = router(Arc::new(pipeline), config.cors);

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
