//! Main entry point for the Scriptorium rating service
//!
//! Wires the rating engine and claim coordinator against the configured
//! store, cache, and notification sinks, with structured logging and
//! graceful shutdown.

use anyhow::Result;
use clap::Parser;
use scriptorium::cache::InMemoryCache;
use scriptorium::claim::ClaimCoordinator;
use scriptorium::config::AppConfig;
use scriptorium::rating::RatingEngine;
use scriptorium::relay::amqp::AmqpConnection;
use scriptorium::relay::{AmqpEventRelay, CompositeRelay, NotificationRelay, WorkflowNotifier};
use scriptorium::store::InMemoryRatingStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Scriptorium - Elo rating and job-claim coordination service
#[derive(Parser)]
#[command(
    name = "scriptorium",
    version,
    about = "Elo rating and job-claim coordination for transcription QA workers",
    long_about = "Scriptorium tracks transcriber skill ratings from pairwise and three-way \
                 comparison resolutions, and coordinates exclusive job claiming with \
                 lease-based mutual exclusion and availability bookkeeping."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// AMQP host override
    #[arg(long, value_name = "HOST", help = "Override AMQP broker host")]
    amqp_host: Option<String>,

    /// Workflow endpoint override
    #[arg(long, value_name = "URL", help = "Override workflow notification endpoint")]
    workflow_endpoint: Option<String>,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
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
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Scriptorium Rating Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   AMQP: {}:{}", config.amqp.host, config.amqp.port);
    info!("   Exchange: {}", config.amqp.exchange_name);
    info!("   Workflow endpoint: {}", config.workflow.endpoint);
    info!("   Seed rating: {}", config.rating.seed_rating);
    info!("   Book-out window: {} min", config.claim.book_out_minutes);
    info!("   Lease TTL: {} s", config.cache_ttl.lease_secs);
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if let Some(amqp_host) = &args.amqp_host {
        config.amqp.host = amqp_host.clone();
    }
    if let Some(endpoint) = &args.workflow_endpoint {
        config.workflow.endpoint = endpoint.clone();
    }

    Ok(config)
}

/// Build the notification relay stack: workflow HTTP sink plus the AMQP
/// event bus, fanned out behind one composite
async fn build_relay(config: &AppConfig) -> Result<Arc<dyn NotificationRelay>> {
    let workflow = Arc::new(WorkflowNotifier::new(&config.workflow)?);

    let connection = AmqpConnection::connect(&config.amqp).await?;
    let channel = connection.open_channel().await?;
    let events =
        Arc::new(AmqpEventRelay::new(channel, Some(config.amqp.exchange_name.clone())).await?);

    Ok(Arc::new(CompositeRelay::new(workflow, events)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let relay = match build_relay(&config).await {
        Ok(relay) => relay,
        Err(e) => {
            error!("Failed to initialize notification relay: {}", e);
            std::process::exit(1);
        }
    };

    // In-memory store and cache; swap for backed implementations by
    // providing other RatingStore / SnapshotCache impls here.
    let store = Arc::new(InMemoryRatingStore::new());
    let cache = Arc::new(InMemoryCache::new());

    let engine = Arc::new(RatingEngine::new(
        store.clone(),
        cache.clone(),
        relay.clone(),
        config.rating.clone(),
        config.cache_ttl.clone(),
    ));
    let _coordinator = Arc::new(ClaimCoordinator::new(
        store,
        cache,
        relay,
        engine,
        config.claim.clone(),
        config.cache_ttl.clone(),
    ));

    info!("Scriptorium Rating Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");
    match tokio::time::timeout(config.shutdown_timeout(), async {
        // Outstanding best-effort dispatches finish on their own; nothing
        // durable is in flight once request handling stops.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    })
    .await
    {
        Ok(()) => info!("Graceful shutdown completed"),
        Err(_) => error!("Shutdown timeout exceeded, forcing exit"),
    }

    info!("Scriptorium Rating Service stopped");
    Ok(())
}
