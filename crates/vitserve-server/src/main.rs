//! vitserve Server
//!
//! Hosting runtime for the image classification handler. Loads the model
//! once at startup, then serves the container contract hosted inference
//! platforms expect: `GET /ping` and `POST /invocations`.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use vitserve_classifiers::ImageClassificationHandler;

mod config;
mod routes;

use config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "vitserve-server")]
#[command(about = "Image classification inference server", long_about = None)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "vitserve.yaml")]
    config: String,

    /// Model id on the Hugging Face Hub, or a local model directory
    #[arg(short, long, env = "HF_MODEL_ID")]
    model_id: Option<String>,

    /// Inference device (auto, cpu, cuda, cuda:N, metal)
    #[arg(short, long)]
    device: Option<String>,

    /// Directory the hosting platform mounts model artifacts into
    #[arg(long, env = "SM_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Listen address
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long, env = "SAGEMAKER_BIND_TO_PORT")]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    info!("Starting vitserve");

    // Load configuration
    let config = ServerConfig::load(&cli.config, &cli)?;
    let model_config = config.model_config()?;
    info!("Configuration loaded successfully");
    info!("Model: {}", model_config.model_id());
    info!("Model dir: {}", config.model_dir.display());
    info!("Device: {:?}", model_config.device);

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    // Load the model before accepting traffic; failure aborts startup
    info!("Loading model...");
    let handler = tokio::task::spawn_blocking(move || ImageClassificationHandler::from_config(&model_config))
        .await??;
    info!(
        "Model {} ready on {}",
        handler.context().model_id(),
        handler.context().device()
    );

    let state = routes::AppState {
        handler: Arc::new(handler),
        metrics: Some(metrics_handle),
    };

    let addr: SocketAddr = format!("{}:{}", config.listen, config.port).parse()?;
    let app = routes::create_router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    // Graceful shutdown handler
    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("vitserve=debug,vitserve_core=debug,vitserve_classifiers=debug,vitserve_server=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("vitserve_core=info,vitserve_classifiers=info,vitserve_server=info")
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "vitserve_requests_total",
        "Total number of invocation requests received"
    );
    metrics::describe_counter!("vitserve_errors_total", "Total number of failed invocations by type");
    metrics::describe_histogram!(
        "vitserve_inference_latency_us",
        metrics::Unit::Microseconds,
        "Decode, predict, and encode latency in microseconds"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
