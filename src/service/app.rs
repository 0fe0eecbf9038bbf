//! Main application state and service coordination
//!
//! AppState wires configuration into the store, the track source, metrics
//! and the ranking service, and owns the background health monitor.

use crate::config::AppConfig;
use crate::metrics::MetricsCollector;
use crate::rating::RankingEngine;
use crate::service::health::HealthCheck;
use crate::service::rankings::RankingService;
use crate::source::{JsonFileTrackSource, StaticTrackSource, TrackSource};
use crate::storage::RankingStore;
use crate::types::ObservedCollection;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

const HEALTH_MONITOR_INTERVAL: Duration = Duration::from_secs(15);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Shared state of a running rankings service
pub struct AppState {
    config: AppConfig,
    store: Arc<RankingStore>,
    rankings: Arc<RankingService>,
    metrics: Arc<MetricsCollector>,
    is_running: Arc<RwLock<bool>>,
    started_at: RwLock<Instant>,
    background_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AppState {
    /// Build every component from configuration; nothing is started yet
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} service components", config.service.name);

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let store = Arc::new(
            RankingStore::from_settings(&config.storage)
                .map_err(|e| ServiceError::Configuration {
                    message: format!("Invalid storage settings: {:#}", e),
                })?
                .with_metrics(metrics.clone()),
        );

        let settings = &config.rankings;
        let source: Arc<dyn TrackSource> = match &settings.tracks_file {
            Some(path) => {
                info!("Reading tracks from {}", path.display());
                Arc::new(JsonFileTrackSource::new(
                    path,
                    settings.collection_id.clone(),
                    settings.collection_name.clone(),
                ))
            }
            None => {
                warn!("No tracks file configured, the collection starts empty");
                Arc::new(StaticTrackSource::new(ObservedCollection {
                    collection_id: settings.collection_id.clone(),
                    collection_name: settings.collection_name.clone(),
                    tracks: Vec::new(),
                }))
            }
        };

        let rankings = Arc::new(
            RankingService::new(
                settings.collection_id.clone(),
                settings.collection_name.clone(),
                RankingEngine::default(),
                store.clone(),
                source,
            )
            .with_max_vote_attempts(settings.max_vote_attempts)
            .with_metrics(metrics.clone()),
        );

        Ok(Self {
            config,
            store,
            rankings,
            metrics,
            is_running: Arc::new(RwLock::new(false)),
            started_at: RwLock::new(Instant::now()),
            background_tasks: Mutex::new(Vec::new()),
        })
    }

    /// Mark the service as running and start the health monitor
    pub async fn start(&self) {
        info!("Starting {}", self.config.service.name);
        *self.is_running.write().await = true;
        *self.started_at.write().await = Instant::now();
        self.start_health_monitor().await;
    }

    /// Stop background tasks, waiting up to the configured shutdown timeout
    pub async fn shutdown(&self) {
        info!("Shutting down {}", self.config.service.name);
        *self.is_running.write().await = false;

        let timeout = self.config.shutdown_timeout();
        let tasks: Vec<_> = self.background_tasks.lock().await.drain(..).collect();
        for task in tasks {
            task.abort();
            if tokio::time::timeout(timeout, task).await.is_err() {
                warn!("Background task did not stop within {:?}", timeout);
            }
        }
        info!("Service shutdown complete");
    }

    async fn start_health_monitor(&self) {
        let is_running = self.is_running.clone();
        let store = self.store.clone();
        let metrics = self.metrics.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEALTH_MONITOR_INTERVAL);
            while *is_running.read().await {
                interval.tick().await;
                let status = HealthCheck::storage_status(&store);
                metrics.update_health_status(status.as_gauge());
                debug!("Health monitor: storage {}", status);
            }
        });
        self.background_tasks.lock().await.push(task);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<RankingStore> {
        &self.store
    }

    pub fn rankings(&self) -> Arc<RankingService> {
        self.rankings.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn uptime(&self) -> Duration {
        self.started_at.read().await.elapsed()
    }
}
