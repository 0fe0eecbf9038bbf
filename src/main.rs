//! Main entry point for the Tunes Rankings service
//!
//! Loads configuration, initializes logging, and serves the rankings API
//! until SIGINT/SIGTERM, then shuts down gracefully.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tunes_rankings::config::{validate_config, AppConfig};
use tunes_rankings::server::HttpServer;
use tunes_rankings::service::{AppState, HealthCheck, HealthStatus};

/// Tunes Rankings Service - pairwise Elo voting for a playlist
#[derive(Parser)]
#[command(
    name = "tunes-rankings",
    version,
    about = "Rank the tracks of a playlist by head-to-head listener votes",
    long_about = "Tunes Rankings serves an HTTP API where listeners pick the better of two \
                 tracks. Every vote updates Elo ratings, is recorded in a vote log, and is \
                 persisted to remote key-value stores or local files with in-memory fallback."
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

    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Data directory override
    #[arg(long, value_name = "DIR", help = "Store rankings as JSON files in this directory")]
    data_dir: Option<PathBuf>,

    /// Tracks file override
    #[arg(long, value_name = "FILE", help = "JSON export of the collection's tracks")]
    tracks_file: Option<PathBuf>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

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

/// Check storage and the current snapshot, then exit with a status code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = Arc::new(AppState::new(config)?);
    app_state.start().await;

    match HealthCheck::check(app_state.clone()).await {
        Ok(health) => {
            println!("Health Check: {}", health.status);
            println!("  Collection: {}", health.stats.collection_id);
            println!("  Backends: {}", health.stats.backends.join(" -> "));
            match (health.stats.tracks, health.stats.total_votes) {
                (Some(tracks), Some(votes)) => {
                    println!("  Tracks: {}", tracks);
                    println!("  Total votes: {}", votes);
                }
                _ => println!("  No rankings stored yet"),
            }
            for check in &health.checks {
                if let Some(message) = &check.message {
                    println!("  {}: {} ({})", check.name, check.status, message);
                }
            }
            app_state.shutdown().await;

            if health.status == HealthStatus::Healthy {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
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
    let storage = &config.storage;
    info!("Tunes Rankings Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   HTTP: {}:{}",
        config.service.host, config.service.http_port
    );
    info!(
        "   Collection: {} ({})",
        config.rankings.collection_id, config.rankings.collection_name
    );
    info!(
        "   Remote KV: primary {}, secondary {}",
        if storage.primary_kv.is_some() { "on" } else { "off" },
        if storage.secondary_kv.is_some() { "on" } else { "off" }
    );
    match &storage.data_dir {
        Some(dir) => info!("   Data dir: {}", dir.display()),
        None => info!("   Data dir: none"),
    }
    info!("   Backend timeout: {:?}", storage.backend_timeout());
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if let Some(data_dir) = &args.data_dir {
        config.storage.data_dir = Some(data_dir.clone());
    }

    if let Some(tracks_file) = &args.tracks_file {
        config.rankings.tracks_file = Some(tracks_file.clone());
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    let app_state = match AppState::new(config.clone()) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };
    app_state.start().await;

    // Seed or refresh the snapshot before taking traffic
    match app_state.rankings().fetch_rankings().await {
        Ok(snapshot) => info!(
            "Loaded rankings for '{}': {} tracks, {} votes",
            snapshot.collection_id,
            snapshot.tracks.len(),
            snapshot.total_votes
        ),
        Err(e) => warn!("Rankings not available yet: {:#}", e),
    }

    let server = HttpServer::new(app_state.clone())?;
    info!("Tunes Rankings Service is running on http://{}", server.addr());
    info!("Press Ctrl+C to shutdown gracefully...");

    if let Err(e) = server.run(wait_for_shutdown_signal()).await {
        error!("HTTP server failed: {:#}", e);
    }

    info!("Shutdown signal received, stopping service components...");
    let shutdown_timeout = config.shutdown_timeout();
    if tokio::time::timeout(shutdown_timeout, app_state.shutdown())
        .await
        .is_err()
    {
        warn!("Shutdown timeout exceeded, forcing exit");
    }

    info!("Tunes Rankings Service stopped");
    Ok(())
}
