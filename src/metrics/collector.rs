//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the rankings service using
//! Prometheus metrics.

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the rankings service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Vote-related metrics
    vote_metrics: VoteMetrics,

    /// Storage-related metrics
    storage_metrics: StorageMetrics,

    /// Service-level metrics
    service_metrics: ServiceMetrics,
}

/// Vote-related metrics
#[derive(Clone)]
pub struct VoteMetrics {
    /// Total accepted votes
    pub votes_accepted_total: IntCounter,

    /// Rejected votes by reason
    pub votes_rejected_total: IntCounterVec,

    /// Snapshot version conflicts that forced a retry
    pub version_conflicts_total: IntCounter,

    /// End-to-end vote processing time
    pub vote_duration_seconds: Histogram,
}

/// Storage-related metrics
#[derive(Clone)]
pub struct StorageMetrics {
    /// Failed or timed out backend attempts
    pub backend_failures_total: IntCounterVec,

    /// Writes by outcome (durable, memory_only)
    pub saves_total: IntCounterVec,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Tracks in the current snapshot
    pub tracked_tracks: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let vote_metrics = VoteMetrics::new(&registry)?;
        let storage_metrics = StorageMetrics::new(&registry)?;
        let service_metrics = ServiceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            vote_metrics,
            storage_metrics,
            service_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn votes(&self) -> &VoteMetrics {
        &self.vote_metrics
    }

    pub fn storage(&self) -> &StorageMetrics {
        &self.storage_metrics
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Record an accepted vote and how long it took
    pub fn record_vote(&self, duration: Duration) {
        self.vote_metrics.votes_accepted_total.inc();
        self.vote_metrics
            .vote_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record a rejected vote
    pub fn record_rejected_vote(&self, reason: &str) {
        self.vote_metrics
            .votes_rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_version_conflict(&self) {
        self.vote_metrics.version_conflicts_total.inc();
    }

    /// Record a failed backend attempt
    pub fn record_backend_failure(&self, backend: &str, operation: &str) {
        self.storage_metrics
            .backend_failures_total
            .with_label_values(&[backend, operation])
            .inc();
    }

    /// Record where a write ended up
    pub fn record_save(&self, outcome: &str) {
        self.storage_metrics
            .saves_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    pub fn update_track_count(&self, count: usize) {
        self.service_metrics.tracked_tracks.set(count as i64);
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::start()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl VoteMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let votes_accepted_total =
            IntCounter::new("tunes_rankings_votes_accepted_total", "Total accepted votes")?;
        registry.register(Box::new(votes_accepted_total.clone()))?;

        let votes_rejected_total = IntCounterVec::new(
            Opts::new("tunes_rankings_votes_rejected_total", "Total rejected votes"),
            &["reason"],
        )?;
        registry.register(Box::new(votes_rejected_total.clone()))?;

        let version_conflicts_total = IntCounter::new(
            "tunes_rankings_version_conflicts_total",
            "Snapshot saves rejected because of a stale version",
        )?;
        registry.register(Box::new(version_conflicts_total.clone()))?;

        let vote_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "tunes_rankings_vote_duration_seconds",
                "Vote processing duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(vote_duration_seconds.clone()))?;

        Ok(Self {
            votes_accepted_total,
            votes_rejected_total,
            version_conflicts_total,
            vote_duration_seconds,
        })
    }
}

impl StorageMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let backend_failures_total = IntCounterVec::new(
            Opts::new(
                "tunes_rankings_backend_failures_total",
                "Failed or timed out storage backend attempts",
            ),
            &["backend", "operation"],
        )?;
        registry.register(Box::new(backend_failures_total.clone()))?;

        let saves_total = IntCounterVec::new(
            Opts::new("tunes_rankings_saves_total", "Storage writes by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(saves_total.clone()))?;

        Ok(Self {
            backend_failures_total,
            saves_total,
        })
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let health_status = IntGauge::new(
            "tunes_rankings_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let tracked_tracks = IntGauge::new(
            "tunes_rankings_tracked_tracks",
            "Tracks in the current ranking snapshot",
        )?;
        registry.register(Box::new(tracked_tracks.clone()))?;

        Ok(Self {
            health_status,
            tracked_tracks,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_vote(Duration::from_millis(3));
        collector.record_vote(Duration::from_millis(7));
        collector.record_rejected_vote("invalid_vote");

        assert_eq!(collector.votes().votes_accepted_total.get(), 2);
        assert_eq!(
            collector
                .votes()
                .votes_rejected_total
                .with_label_values(&["invalid_vote"])
                .get(),
            1
        );
    }

    #[test]
    fn test_storage_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_backend_failure("primary_kv", "load_snapshot");
        collector.record_save("memory_only");

        assert_eq!(
            collector
                .storage()
                .backend_failures_total
                .with_label_values(&["primary_kv", "load_snapshot"])
                .get(),
            1
        );
    }

    #[test]
    fn test_render_text_format() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        collector.update_health_status(2);
        collector.update_track_count(12);

        let text = collector.render().unwrap();
        assert!(text.contains("tunes_rankings_health_status 2"));
        assert!(text.contains("tunes_rankings_tracked_tracks 12"));
    }

    #[test]
    fn test_shared_registry() {
        let registry = Arc::new(Registry::new());
        let collector = MetricsCollector::with_registry(registry.clone()).unwrap();
        collector.record_vote(Duration::from_millis(1));

        assert!(Arc::ptr_eq(&collector.registry(), &registry));
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|family| family.get_name() == "tunes_rankings_votes_accepted_total"));

        // Metric names are already taken in this registry
        assert!(MetricsCollector::with_registry(registry).is_err());
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.stop() >= Duration::from_millis(10));
    }
}
