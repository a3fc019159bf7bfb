//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the allocation core.
//!
//! # Metrics
//!
//! - `allocation_decisions_total{outcome}` - Audit records written, by outcome
//! - `allocation_queue_depth{class}` - Pending requests per class
//! - `allocation_available{class}` - Units available per class
//! - `allocation_drain_duration_seconds` - Histogram of drain latencies

use crate::types::{ClassCounts, Outcome, ResourceClass};
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Decisions by outcome
    pub decisions: IntCounterVec,

    /// Pending requests by class
    pub queue_depth: IntGaugeVec,

    /// Availability by class
    pub available: IntGaugeVec,

    /// Drain duration histogram
    pub drain_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let decisions = IntCounterVec::new(
            Opts::new("allocation_decisions_total", "Audit records written, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(decisions.clone()))?;

        let queue_depth = IntGaugeVec::new(
            Opts::new("allocation_queue_depth", "Pending requests per class"),
            &["class"],
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        let available = IntGaugeVec::new(
            Opts::new("allocation_available", "Units available per class"),
            &["class"],
        )?;
        registry.register(Box::new(available.clone()))?;

        let drain_duration = Histogram::with_opts(
            HistogramOpts::new(
                "allocation_drain_duration_seconds",
                "Histogram of drain latencies",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500]),
        )?;
        registry.register(Box::new(drain_duration.clone()))?;

        Ok(Self {
            decisions,
            queue_depth,
            available,
            drain_duration,
            registry,
        })
    }

    /// Record an audit decision
    pub fn record_decision(&self, outcome: Outcome) {
        self.decisions
            .with_label_values(&[outcome.label()])
            .inc();
    }

    /// Number of decisions recorded with `outcome`
    pub fn decision_count(&self, outcome: Outcome) -> u64 {
        self.decisions
            .with_label_values(&[outcome.label()])
            .get()
    }

    /// Update queue depth gauge
    pub fn set_queue_depth(&self, class: ResourceClass, depth: usize) {
        self.queue_depth
            .with_label_values(&[class.label()])
            .set(depth as i64);
    }

    /// Update availability gauges
    pub fn set_available(&self, available: &ClassCounts) {
        for (class, count) in available.iter() {
            self.available
                .with_label_values(&[class.label()])
                .set(i64::from(count));
        }
    }

    /// Record drain duration
    pub fn record_drain_duration(&self, duration_seconds: f64) {
        self.drain_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.decision_count(Outcome::Approved), 0);
        // Independent registries, so a second collector is fine
        assert!(Metrics::new().is_ok());
    }

    #[test]
    fn test_record_decision() {
        let metrics = Metrics::new().unwrap();
        metrics.record_decision(Outcome::Approved);
        metrics.record_decision(Outcome::Approved);
        metrics.record_decision(Outcome::Denied);
        assert_eq!(metrics.decision_count(Outcome::Approved), 2);
        assert_eq!(metrics.decision_count(Outcome::Denied), 1);
    }

    #[test]
    fn test_gauges() {
        let metrics = Metrics::new().unwrap();
        metrics.set_queue_depth(ResourceClass::Vip, 3);
        metrics.set_available(&ClassCounts::new(7, 190));

        assert_eq!(metrics.queue_depth.with_label_values(&["VIP"]).get(), 3);
        assert_eq!(metrics.available.with_label_values(&["Regular"]).get(), 190);
        assert!(!metrics.registry().gather().is_empty());
    }
}
