// Prometheus metrics for webhook delivery
//
// Mirrors the status tally as cumulative counters:
// - Responses by status code (counter)
// - Current backoff interval (gauge)
//
// Each telemetry context owns its registry, so separate contexts (and tests)
// never collide on registration.

use prometheus::{Encoder, Gauge, IntCounterVec, Registry, TextEncoder};
use std::time::Duration;

/// Delivery metrics bound to one registry
#[derive(Clone)]
pub struct DeliveryMetrics {
    registry: Registry,
    responses_total: IntCounterVec,
    backoff_interval_seconds: Gauge,
}

impl DeliveryMetrics {
    /// Create and register the delivery metrics
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let responses_total = IntCounterVec::new(
            prometheus::Opts::new(
                "webhook_responses_total",
                "Total number of webhook responses by HTTP status code",
            ),
            &["status"],
        )?;
        let backoff_interval_seconds = Gauge::new(
            "webhook_backoff_interval_seconds",
            "Current shared backoff interval between webhook sends",
        )?;

        registry.register(Box::new(responses_total.clone()))?;
        registry.register(Box::new(backoff_interval_seconds.clone()))?;

        Ok(Self {
            registry,
            responses_total,
            backoff_interval_seconds,
        })
    }

    /// Count one response with the given status
    pub fn observe_status(&self, code: u16) {
        self.responses_total
            .with_label_values(&[code.to_string().as_str()])
            .inc();
    }

    /// Record the current backoff interval
    pub fn observe_backoff(&self, interval: Duration) {
        self.backoff_interval_seconds.set(interval.as_secs_f64());
    }

    /// Total responses recorded for a status code
    pub fn responses(&self, code: u16) -> u64 {
        self.responses_total
            .with_label_values(&[code.to_string().as_str()])
            .get()
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
        String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
    }
}

impl std::fmt::Debug for DeliveryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryMetrics").finish_non_exhaustive()
    }
}
