// Periodic status-code reporter
//
// Lifecycle: Idle -> Running -> Stopped. The handle is created at most once
// per telemetry context; starting again after a stop is a no-op.

use std::sync::atomic::Ordering;
use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Inner;

/// Observable ticker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerStatus {
    /// Never started
    Idle,
    /// Reporter task is active
    Running,
    /// Reporter task was stopped and will not restart
    Stopped,
}

/// Ticker state held under the telemetry mutex
#[derive(Debug)]
pub(crate) enum TickerState {
    Idle,
    Running(TickerHandle),
    Stopped,
}

#[derive(Debug)]
pub(crate) struct TickerHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

impl TickerState {
    pub(crate) fn status(&self) -> TickerStatus {
        match self {
            TickerState::Idle => TickerStatus::Idle,
            TickerState::Running(_) => TickerStatus::Running,
            TickerState::Stopped => TickerStatus::Stopped,
        }
    }
}

/// Spawn the reporter task on the current runtime
///
/// The first report fires one full `period` after spawning. The task exits
/// when `cancel` fires or when the telemetry context has been dropped.
pub(crate) fn spawn_reporter(
    runtime: &tokio::runtime::Handle,
    inner: Weak<Inner>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);

        if let Some(inner) = inner.upgrade() {
            inner.active_reporters.fetch_add(1, Ordering::SeqCst);
        } else {
            return;
        }
        info!("Status code ticker started ({:?})", period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Exiting status code ticker ({:?})", period);
                    break;
                }
                _ = interval.tick() => {
                    match inner.upgrade() {
                        Some(inner) => {
                            inner.report();
                        }
                        None => {
                            debug!("Telemetry dropped, status code ticker exiting");
                            return;
                        }
                    }
                }
            }
        }

        if let Some(inner) = inner.upgrade() {
            inner.active_reporters.fetch_sub(1, Ordering::SeqCst);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(TickerState::Idle.status(), TickerStatus::Idle);
        assert_eq!(TickerState::Stopped.status(), TickerStatus::Stopped);

        let handle = TickerHandle {
            cancel: CancellationToken::new(),
            task: tokio::spawn(async {}),
        };
        assert_eq!(TickerState::Running(handle).status(), TickerStatus::Running);
    }
}
