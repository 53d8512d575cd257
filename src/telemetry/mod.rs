//! Delivery Telemetry
//!
//! Tracks HTTP status codes seen by the webhook sender and reports them on a
//! fixed interval.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Telemetry                    │
//! ├──────────────────────────────────────────────┤
//! │  Mutex ─┬─ StatusTally   (code -> count)      │
//! │         └─ TickerState   (Idle/Running/Stop)  │
//! │  SharedBackoff (read for reports)             │
//! │  DeliveryMetrics (prometheus registry)        │
//! │  broadcast::Sender<StatusReport>              │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The tally and the ticker handle share one mutex, so two concurrent
//! `start_ticker` calls can never both spawn a reporter, and an increment can
//! never interleave with a drain.

pub mod metrics;
pub mod tally;
pub mod ticker;

pub use metrics::DeliveryMetrics;
pub use tally::StatusTally;
pub use ticker::TickerStatus;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::webhooks::backoff::{BackoffSnapshot, SharedBackoff};
use ticker::{TickerHandle, TickerState};

/// Capacity of the report broadcast channel
const REPORT_CHANNEL_CAPACITY: usize = 16;

/// One periodic status-code report
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Counts observed since the previous report
    pub counts: BTreeMap<u16, u64>,
    /// Backoff state at report time
    pub backoff: BackoffSnapshot,
    /// Interval between reports
    pub report_interval: Duration,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug)]
struct TelemetryState {
    tally: StatusTally,
    ticker: TickerState,
}

#[derive(Debug)]
pub(crate) struct Inner {
    state: Mutex<TelemetryState>,
    backoff: SharedBackoff,
    report_interval: Duration,
    metrics: DeliveryMetrics,
    reports: broadcast::Sender<StatusReport>,
    pub(crate) active_reporters: AtomicUsize,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TelemetryState> {
        // Counters and a task handle only, usable after a panic elsewhere
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drain the tally, log it and publish it to subscribers
    pub(crate) fn report(&self) -> StatusReport {
        let counts = self.lock().tally.drain();
        let backoff = self.backoff.snapshot();
        self.metrics.observe_backoff(backoff.interval);

        info!(
            "Webhook HTTP response codes = {:?} (report_interval={:?}, retry_interval={:?}, retry_increment={:?}, retry_decrement={:?})",
            counts, self.report_interval, backoff.interval, backoff.increment, backoff.decrement
        );

        let report = StatusReport {
            counts,
            backoff,
            report_interval: self.report_interval,
            reported_at: Utc::now(),
        };
        // No subscribers is fine
        let _ = self.reports.send(report.clone());
        report
    }
}

/// Shared telemetry handle
///
/// Cheap to clone; all clones observe the same tally and ticker.
#[derive(Debug, Clone)]
pub struct Telemetry {
    inner: Arc<Inner>,
}

impl Telemetry {
    /// Create a telemetry context reporting every `report_interval`
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics registry cannot be created.
    pub fn new(report_interval: Duration, backoff: SharedBackoff) -> Result<Self> {
        let metrics = DeliveryMetrics::new().context("Failed to create delivery metrics")?;
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(TelemetryState {
                    tally: StatusTally::new(),
                    ticker: TickerState::Idle,
                }),
                backoff,
                report_interval,
                metrics,
                reports,
                active_reporters: AtomicUsize::new(0),
            }),
        })
    }

    /// Count one observed status code
    pub fn record_status(&self, code: u16) {
        self.inner.lock().tally.increment(code);
        self.inner.metrics.observe_status(code);
    }

    /// Record the current backoff interval in metrics
    pub fn observe_backoff(&self, interval: Duration) {
        self.inner.metrics.observe_backoff(interval);
    }

    /// Current counts without resetting them
    pub fn snapshot(&self) -> BTreeMap<u16, u64> {
        self.inner.lock().tally.snapshot()
    }

    /// Return the current counts and reset them to zero, keeping known codes
    pub fn drain(&self) -> BTreeMap<u16, u64> {
        self.inner.lock().tally.drain()
    }

    /// Produce a report immediately, as the ticker would
    pub fn report_now(&self) -> StatusReport {
        self.inner.report()
    }

    /// Subscribe to periodic reports
    pub fn subscribe(&self) -> broadcast::Receiver<StatusReport> {
        self.inner.reports.subscribe()
    }

    /// Prometheus metrics for this context
    pub fn metrics(&self) -> &DeliveryMetrics {
        &self.inner.metrics
    }

    pub fn report_interval(&self) -> Duration {
        self.inner.report_interval
    }

    pub fn ticker_status(&self) -> TickerStatus {
        self.inner.lock().ticker.status()
    }

    /// Number of reporter tasks currently running (0 or 1)
    pub fn active_reporters(&self) -> usize {
        self.inner.active_reporters.load(Ordering::SeqCst)
    }

    /// Start the periodic reporter
    ///
    /// Only the first call on an idle ticker spawns a task; later calls are
    /// no-ops, including after the ticker has been stopped.
    ///
    /// # Returns
    /// `true` if this call started the reporter
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a Tokio runtime.
    pub fn start_ticker(&self) -> Result<bool> {
        let mut state = self.inner.lock();
        if !matches!(state.ticker, TickerState::Idle) {
            tracing::debug!("Status code ticker already {:?}", state.ticker.status());
            return Ok(false);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .context("Status code ticker requires a Tokio runtime")?;

        info!("Initialising status code ticker ({:?})", self.inner.report_interval);
        let cancel = CancellationToken::new();
        let task = ticker::spawn_reporter(
            &runtime,
            Arc::downgrade(&self.inner),
            self.inner.report_interval,
            cancel.clone(),
        );
        state.ticker = TickerState::Running(TickerHandle { cancel, task });
        Ok(true)
    }

    /// Stop the periodic reporter and wait for its task to exit
    ///
    /// Stopping an idle or already stopped ticker is a no-op.
    ///
    /// # Returns
    /// `true` if a running reporter was stopped
    pub async fn stop_ticker(&self) -> bool {
        let handle = {
            let mut state = self.inner.lock();
            match std::mem::replace(&mut state.ticker, TickerState::Stopped) {
                TickerState::Running(handle) => handle,
                previous => {
                    warn!("Stop requested for status code ticker in state {:?}", previous.status());
                    state.ticker = previous;
                    return false;
                }
            }
        };

        info!("Stopping status code ticker ({:?})", self.inner.report_interval);
        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            warn!("Status code ticker task ended abnormally: {}", e);
        }
        true
    }
}
