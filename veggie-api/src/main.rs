//! veggie-api - Veggie Vision service
//!
//! Subscribes to ambient telemetry over MQTT and serves:
//! - `GET /ambient`: latest temperature/humidity reading
//! - `POST /analysis`: produce classification + ripeness estimate
//! - `POST /analyze-ripening`: ripeness estimate for a known label
//! - `GET /health`, `GET /events` (SSE)

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};
use veggie_common::config::{load_toml_config, ServiceConfig};
use veggie_common::events::EventBus;

use veggie_api::cache::AmbientCache;
use veggie_api::classifier::DigestClassifier;
use veggie_api::cli::Args;
use veggie_api::estimator::{OpenAiReasoningClient, RipenessEstimator};
use veggie_api::orchestrator::AnalysisOrchestrator;
use veggie_api::telemetry::{TelemetryIngest, TelemetrySubscriber};
use veggie_api::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing before config loading so its messages are kept.
    // RUST_LOG wins; otherwise the configured level replaces the startup one.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let filter_from_env = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| EnvFilter::new(args.startup_log_level())),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let toml = load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let config = ServiceConfig::resolve(args.overrides(), toml)
        .context("Invalid configuration")?;

    if !filter_from_env {
        filter_handle
            .reload(EnvFilter::new(&config.logging.level))
            .context("Failed to apply configured log level")?;
    }

    info!(
        "Starting veggie-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    info!(reasoning = ?config.reasoning, "Reasoning service configured");

    let event_bus = EventBus::new(config.analysis.event_capacity);
    info!(capacity = event_bus.capacity(), "Event bus initialized");
    let cache = AmbientCache::new();

    // Broker must be reachable before HTTP comes up
    let ingest = TelemetryIngest::new(cache.clone(), event_bus.clone());
    let subscriber = TelemetrySubscriber::start(config.broker.clone(), ingest, event_bus.clone())
        .await
        .context("Telemetry subscriber failed to start")?;

    let reasoning = OpenAiReasoningClient::new(&config.reasoning)
        .context("Failed to build reasoning client")?;
    let estimator = RipenessEstimator::new(
        Arc::new(reasoning),
        config.reasoning.timeout,
        event_bus.clone(),
    );
    let orchestrator = AnalysisOrchestrator::new(
        Arc::new(DigestClassifier::new()),
        cache.clone(),
        Arc::new(estimator),
        config.analysis.classifier_timeout,
        event_bus.clone(),
    );

    let state = AppState::new(
        cache,
        Arc::new(orchestrator),
        event_bus,
        subscriber.state_watch(),
    );
    let app = veggie_api::build_router(state, config.http.max_upload_bytes);

    let addr = config.http.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    subscriber.stop().await;
    info!("Server shutdown complete");
    served
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
