//! Service layer for the tunes-rankings service
//!
//! This module contains the ranking operations, the application state that
//! wires them to configuration, and health reporting.

pub mod app;
pub mod health;
pub mod rankings;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use rankings::{validate_vote_request, CollectionLocks, RankingService};
