//! Engram Server - witness-scoped semantic memory for AI agents
//!
//! One process, two protocol surfaces over one engine:
//! - REST under `/cam/*` (single-agent, multi-entity and curated
//!   operations, admin under `/api/v1/admin/*`)
//! - MCP JSON-RPC 2.0 under `/mcp/`
//!
//! Configuration comes from `ENGRAM_*` environment variables; the CLI
//! only overrides the data directory and bind address.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use engram_core::{
    CleanupScheduler, CurationPipeline, EngramConfig, HttpCurator, HttpEmbedder, MemoryEngine,
    MemoryStore,
};
use engram_server::http;
use engram_server::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "engram-server", version, about = "Witness-scoped semantic memory service")]
struct Cli {
    /// Custom database path (overrides ENGRAM_DB_PATH)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Bind port (overrides ENGRAM_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Bind host (overrides ENGRAM_HOST)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!("Engram server v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = EngramConfig::from_env();
    if let Some(data_dir) = cli.data_dir {
        config.db_path = Some(data_dir.join("engram.db"));
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    if config.auth_enabled && config.api_key.is_none() {
        error!("ENGRAM_ENABLE_AUTH is on but ENGRAM_API_KEY is unset; all requests would be rejected");
        std::process::exit(1);
    }

    let store = match MemoryStore::open(config.db_path.clone(), config.dimensions) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to open store: {e}");
            std::process::exit(1);
        }
    };
    info!(dimensions = config.dimensions, "store initialized");

    let engine = Arc::new(MemoryEngine::new(Arc::clone(&store)));
    let embedder = Arc::new(HttpEmbedder::new(
        &config.embedding_url,
        &config.embedding_model,
        config.dimensions,
    ));
    let curator = Arc::new(HttpCurator::new(&config.curator_url, &config.curator_model));
    let pipeline = Arc::new(CurationPipeline::new(
        Arc::clone(&engine),
        embedder.clone(),
        curator,
    ));

    // Background cleanup: TTL expiry, consolidation, importance decay
    let scheduler = CleanupScheduler::new(Arc::clone(&store), config.cleanup.clone());
    let _jobs = scheduler.spawn();
    info!("cleanup scheduler started (expiry/consolidation/decay)");

    let bind = format!("{}:{}", config.host, config.port);
    let state = AppState::new(engine, pipeline, embedder, config);
    let app = http::router(state);

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {bind}: {e}");
            std::process::exit(1);
        }
    };
    info!("listening on http://{bind}");

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {e}");
        std::process::exit(1);
    }

    info!("Engram server shutting down");
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
