//! HTTP API, health and Prometheus endpoints
//!
//! Serves the rankings operations over axum. Domain errors are mapped to
//! status codes by their `RankingError` kind; anything else is a 500.

use crate::error::RankingError;
use crate::rating::ranked_tracks;
use crate::service::{AppState, HealthCheck, HealthStatus};
use crate::types::{RankedTrack, RankingSnapshot, VoteRequest};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Snapshot plus its leaderboard
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsResponse {
    pub rankings: RankingSnapshot,
    pub leaderboard: Vec<RankedTrack>,
}

impl From<RankingSnapshot> for RankingsResponse {
    fn from(snapshot: RankingSnapshot) -> Self {
        Self {
            leaderboard: ranked_tracks(&snapshot),
            rankings: snapshot,
        }
    }
}

/// Error returned by API handlers
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match RankingError::classify(&self.0) {
            Some(RankingError::InvalidVote { .. }) => StatusCode::BAD_REQUEST,
            Some(RankingError::TrackNotFound { .. }) => StatusCode::NOT_FOUND,
            Some(RankingError::NotEnoughTracks { .. }) => StatusCode::CONFLICT,
            Some(RankingError::SourceUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:#}", self.0);
        } else {
            debug!("Request rejected: {}", self.0);
        }
        (
            status,
            Json(json!({
                "success": false,
                "error": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

/// HTTP server for the rankings API
pub struct HttpServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(app_state: Arc<AppState>) -> Result<Self> {
        let service = &app_state.config().service;
        let addr: SocketAddr = format!("{}:{}", service.host, service.http_port)
            .parse()
            .context("Invalid HTTP server address")?;
        Ok(Self { addr, app_state })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until `shutdown` completes, then drain in-flight requests
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        info!("HTTP server listening on http://{}", self.addr);

        axum::serve(listener, create_router(self.app_state))
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("HTTP server shutdown signal received");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

/// Router with every endpoint of the service
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/rankings", get(rankings_handler))
        .route("/api/rankings/vote", post(vote_handler))
        .route("/api/rankings/matchup", get(matchup_handler))
        .route("/api/rankings/analytics", get(analytics_handler))
        .with_state(app_state)
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "tunes-rankings",
        "version": crate::VERSION,
        "endpoints": [
            "/health",
            "/metrics",
            "/api/rankings",
            "/api/rankings/vote",
            "/api/rankings/matchup",
            "/api/rankings/analytics"
        ]
    }))
}

async fn health_handler(State(app_state): State<Arc<AppState>>) -> Response {
    debug!("Health check requested");

    match HealthCheck::check(app_state).await {
        Ok(health) => {
            let status = match health.status {
                HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
                HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            };
            (status, Json(health)).into_response()
        }
        Err(e) => {
            error!("Health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn metrics_handler(State(app_state): State<Arc<AppState>>) -> Response {
    match app_state.metrics().render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to encode metrics: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

async fn rankings_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<RankingsResponse>, ApiError> {
    let snapshot = app_state.rankings().fetch_rankings().await?;
    Ok(Json(snapshot.into()))
}

async fn vote_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = app_state.rankings().submit_vote(request).await?;
    Ok(Json(json!({
        "success": true,
        "rankings": snapshot,
    })))
}

async fn matchup_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let matchup = app_state.rankings().next_matchup().await?;
    Ok(Json(matchup))
}

async fn analytics_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let analytics = app_state.rankings().vote_analytics().await?;
    Ok(Json(analytics))
}
