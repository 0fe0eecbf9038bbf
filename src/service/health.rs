//! Health checks for the rankings service
//!
//! Storage that can only write to memory while durable backends are
//! configured is reported as degraded: the service keeps answering, but
//! votes will not survive a restart.

use crate::service::app::AppState;
use crate::storage::{RankingStore, SaveOutcome};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported to Prometheus
    pub fn as_gauge(self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: HealthStatus) -> HealthStatus {
        if self.as_gauge() <= other.as_gauge() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Why the component is not healthy
    pub message: Option<String>,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub collection_id: String,
    /// Tracks in the stored snapshot, if one exists
    pub tracks: Option<usize>,
    pub total_votes: Option<u64>,
    /// Storage tiers in priority order
    pub backends: Vec<String>,
    pub degraded_saves: u64,
    pub backend_failures: u64,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a full health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let service_check = Self::check_service_running(&app_state).await;
        let storage_check = Self::check_storage(&app_state);
        let status = service_check.status.worst(storage_check.status);

        let stats = Self::gather_service_stats(&app_state).await;

        debug!("Health check complete: {}", status);
        Ok(HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks: vec![service_check, storage_check],
            stats,
        })
    }

    /// Liveness plus storage state, without touching any backend
    pub async fn quick_status(app_state: &AppState) -> HealthStatus {
        if !app_state.is_running().await {
            return HealthStatus::Unhealthy;
        }
        Self::check_storage(app_state).status
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        if app_state.is_running().await {
            ComponentCheck {
                name: "service".to_string(),
                status: HealthStatus::Healthy,
                message: None,
            }
        } else {
            ComponentCheck {
                name: "service".to_string(),
                status: HealthStatus::Unhealthy,
                message: Some("Service is not running".to_string()),
            }
        }
    }

    /// Storage health from the outcome of the most recent write
    pub fn storage_status(store: &RankingStore) -> HealthStatus {
        Self::assess_storage(store).0
    }

    fn assess_storage(store: &RankingStore) -> (HealthStatus, Option<String>) {
        if !store.has_durable_backends() {
            return (
                HealthStatus::Degraded,
                Some("No durable storage configured".to_string()),
            );
        }
        match store.status().last_save {
            Some(SaveOutcome::MemoryOnly) => (
                HealthStatus::Degraded,
                Some("Last write reached only the in-memory store".to_string()),
            ),
            _ => (HealthStatus::Healthy, None),
        }
    }

    fn check_storage(app_state: &AppState) -> ComponentCheck {
        let (status, message) = Self::assess_storage(app_state.store());
        ComponentCheck {
            name: "storage".to_string(),
            status,
            message,
        }
    }

    async fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let rankings = app_state.rankings();
        let snapshot = app_state.store().load(rankings.collection_id()).await;
        let status = app_state.store().status();

        ServiceStats {
            collection_id: rankings.collection_id().to_string(),
            tracks: snapshot.as_ref().map(|s| s.tracks.len()),
            total_votes: snapshot.as_ref().map(|s| s.total_votes),
            backends: status.backends,
            degraded_saves: status.degraded_saves,
            backend_failures: status.backend_failures,
            uptime_seconds: app_state.uptime().await.as_secs(),
        }
    }
}
