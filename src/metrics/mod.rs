//! Metrics and monitoring for the rankings service
//!
//! This module provides Prometheus metrics collection for votes, storage
//! backends and overall service health.

pub mod collector;

pub use collector::{MetricsCollector, MetricsTimer, ServiceMetrics, StorageMetrics, VoteMetrics};
