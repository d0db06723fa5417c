//! Pose Backend - HTTP pose detection service
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 0.0.0.0:5000, sled store under ./data
//! cargo run --release
//!
//! # Explicit config and model
//! ./pose-backend --config /etc/pose_backend.toml --model models/movenet.onnx
//! ```
//!
//! # Environment Variables
//!
//! - `PORT`: Listen port (default: 5000)
//! - `POSE_CONFIG`: Path to a TOML config file
//! - `POSE_MODEL_PATH`: Path to the pose model
//! - `POSE_CORS_ORIGINS`: Comma-separated allowed origins
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use pose_backend::api::{create_app, ApiState};
use pose_backend::config::ServiceConfig;
use pose_backend::decoder::RasterDecoder;
use pose_backend::pipeline::DetectionOrchestrator;
use pose_backend::{estimator, storage};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "pose-backend")]
#[command(about = "Single-person pose detection service")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides POSE_CONFIG and ./pose_backend.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the server address (default: "0.0.0.0:5000")
    #[arg(short, long, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Override the pose model path
    #[arg(short, long, value_name = "FILE")]
    model: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, env = "POSE_LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Startup
// ============================================================================

/// Everything needed to serve, built before the listener binds.
struct ServiceCore {
    app: Router,
    addr: String,
}

/// Phase 1: config, storage and the model. Any failure aborts startup.
fn init_service(args: CliArgs) -> Result<ServiceCore> {
    let mut config = ServiceConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    if let Some(model) = args.model {
        config.estimator.model_path = model;
    }
    config.validate().context("Invalid configuration")?;

    info!(
        backend = ?config.storage.backend,
        path = %config.storage.path.display(),
        "Opening detection store"
    );
    let store = storage::open_store(&config.storage).context("Failed to open detection store")?;

    info!(model = %config.estimator.model_path.display(), "Loading pose model");
    let estimator = estimator::initialize(&config.estimator)
        .context("Failed to initialize pose estimator")?;

    let decoder = Arc::new(RasterDecoder::new(&config.decoder));
    let orchestrator = DetectionOrchestrator::new(decoder, estimator, store)
        .with_request_timeout(config.pipeline.request_timeout());

    let state = ApiState::new(Arc::new(orchestrator))
        .with_max_upload_bytes(config.server.max_upload_bytes);

    Ok(ServiceCore {
        app: create_app(state),
        addr: config.server.addr,
    })
}

/// Phase 2: bind and serve until cancelled.
async fn serve(core: ServiceCore, cancel_token: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&core.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", core.addr))?;

    info!("✓ HTTP server listening on {}", core.addr);

    let result = axum::serve(listener, core.app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
            info!("[HttpServer] Received shutdown signal");
        })
        .await;

    match result {
        Ok(()) => {
            info!("[HttpServer] Graceful shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("[HttpServer] Server error: {}", e);
            Err(anyhow::anyhow!("HTTP server error: {}", e))
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Pose Backend v{}", env!("CARGO_PKG_VERSION"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let core = init_service(args)?;

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    serve(core, cancel_token).await?;

    info!("✓ Pose Backend shutdown complete");
    Ok(())
}
