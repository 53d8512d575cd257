// Adaptive pacing shared by every delivery
//
// A single interval, slept before every status evaluation:
// - Grows by `increment` on each 429, capped by Retry-After (or 4s without it)
// - Shrinks by `decrement` on each success
// - Never drops below `min`; never exceeds `max` when one is configured
//
// All senders built from one context share the interval, so concurrent
// callers converge on one pace against the upstream rate limit.

use crate::config::BackoffConfig;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Growth ceiling applied when a 429 carries no Retry-After header
pub const ABSENT_RETRY_AFTER_CEILING: Duration = Duration::from_secs(4);

/// Point-in-time view of the backoff state and its tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackoffSnapshot {
    pub interval: Duration,
    pub min: Duration,
    pub max: Option<Duration>,
    pub increment: Duration,
    pub decrement: Duration,
}

#[derive(Debug)]
struct BackoffState {
    interval: Duration,
    min: Duration,
    max: Option<Duration>,
    increment: Duration,
    decrement: Duration,
}

/// Shared adaptive backoff interval
#[derive(Debug, Clone)]
pub struct SharedBackoff {
    state: Arc<Mutex<BackoffState>>,
}

impl SharedBackoff {
    /// Create a new backoff starting at the configured initial interval
    pub fn new(config: &BackoffConfig) -> Self {
        let min = config.min();
        let max = config.max().map(|max| max.max(min));
        Self {
            state: Arc::new(Mutex::new(BackoffState {
                interval: bound(config.initial(), min, max),
                min,
                max,
                increment: config.increment(),
                decrement: config.decrement(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackoffState> {
        // Plain durations, so a poisoned lock still holds a usable value
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current interval
    pub fn current(&self) -> Duration {
        self.lock().interval
    }

    /// Current interval together with its tuning parameters
    pub fn snapshot(&self) -> BackoffSnapshot {
        let state = self.lock();
        BackoffSnapshot {
            interval: state.interval,
            min: state.min,
            max: state.max,
            increment: state.increment,
            decrement: state.decrement,
        }
    }

    /// Grow the interval after a rate-limited response
    ///
    /// # Arguments
    /// * `retry_after_secs` - Parsed Retry-After header, if present
    ///
    /// # Returns
    /// The new interval
    pub fn grow(&self, retry_after_secs: Option<u64>) -> Duration {
        let mut state = self.lock();
        let ceiling = match retry_after_secs {
            Some(secs) => Duration::from_secs(secs),
            None => ABSENT_RETRY_AFTER_CEILING,
        };
        let grown = state.interval.saturating_add(state.increment).min(ceiling);
        state.interval = bound(grown, state.min, state.max);

        debug!(
            "Backoff grown to {:?} (retry_after: {:?})",
            state.interval, retry_after_secs
        );
        state.interval
    }

    /// Shrink the interval after a successful delivery
    ///
    /// # Returns
    /// The new interval
    pub fn shrink(&self) -> Duration {
        let mut state = self.lock();
        state.interval = state.interval.saturating_sub(state.decrement).max(state.min);
        state.interval
    }
}

/// Keep `interval` at or above `min` and, if set, at or below `max`
fn bound(interval: Duration, min: Duration, max: Option<Duration>) -> Duration {
    let interval = interval.max(min);
    match max {
        Some(max) => interval.min(max),
        None => interval,
    }
}

impl Default for SharedBackoff {
    fn default() -> Self {
        Self::new(&BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(initial: u64, increment: u64, decrement: u64) -> BackoffConfig {
        BackoffConfig {
            initial_interval_us: initial * 1000,
            increment_us: increment * 1000,
            decrement_us: decrement * 1000,
            ..BackoffConfig::default()
        }
    }

    #[test]
    fn test_initial_interval() {
        let backoff = SharedBackoff::default();
        assert_eq!(backoff.current(), Duration::from_millis(100));
    }

    #[test]
    fn test_grow_without_header() {
        let backoff = SharedBackoff::new(&config(100, 100, 1));
        assert_eq!(backoff.grow(None), Duration::from_millis(200));
        assert_eq!(backoff.grow(None), Duration::from_millis(300));
    }

    #[test]
    fn test_grow_without_header_capped_at_four_seconds() {
        let backoff = SharedBackoff::new(&BackoffConfig {
            initial_interval_us: 3_950_000,
            ..BackoffConfig::default()
        });
        assert_eq!(backoff.grow(None), Duration::from_secs(4));
        assert_eq!(backoff.grow(None), Duration::from_secs(4));
    }

    #[test]
    fn test_retry_after_above_four_seconds_is_not_capped() {
        let backoff = SharedBackoff::new(&BackoffConfig {
            initial_interval_us: 3_950_000,
            ..BackoffConfig::default()
        });
        assert_eq!(backoff.grow(Some(10)), Duration::from_millis(4050));
        assert_eq!(backoff.grow(Some(10)), Duration::from_millis(4150));
    }

    #[test]
    fn test_grow_capped_by_retry_after() {
        let backoff = SharedBackoff::new(&config(1500, 1000, 1));
        assert_eq!(backoff.grow(Some(2)), Duration::from_secs(2));

        let backoff = SharedBackoff::new(&config(100, 100, 1));
        assert_eq!(backoff.grow(Some(0)), Duration::ZERO);
    }

    #[test]
    fn test_grow_uses_increment_below_retry_after() {
        let backoff = SharedBackoff::new(&config(100, 100, 1));
        assert_eq!(backoff.grow(Some(30)), Duration::from_millis(200));
    }

    #[test]
    fn test_grow_respects_hard_ceiling() {
        let backoff = SharedBackoff::new(&BackoffConfig {
            initial_interval_us: 900_000,
            max_interval_us: Some(1_000_000),
            increment_us: 500_000,
            ..BackoffConfig::default()
        });
        assert_eq!(backoff.grow(Some(60)), Duration::from_secs(1));
    }

    #[test]
    fn test_shrink_floors_at_zero() {
        let backoff = SharedBackoff::new(&config(2, 1, 1));
        assert_eq!(backoff.shrink(), Duration::from_millis(1));
        assert_eq!(backoff.shrink(), Duration::ZERO);
        assert_eq!(backoff.shrink(), Duration::ZERO);
    }

    #[test]
    fn test_shrink_floors_at_min() {
        let backoff = SharedBackoff::new(&BackoffConfig {
            initial_interval_us: 60_000,
            min_interval_us: 50_000,
            decrement_us: 25_000,
            ..BackoffConfig::default()
        });
        assert_eq!(backoff.shrink(), Duration::from_millis(50));
    }

    #[test]
    fn test_clones_share_state() {
        let backoff = SharedBackoff::new(&config(100, 100, 1));
        let other = backoff.clone();
        other.grow(None);
        assert_eq!(backoff.current(), Duration::from_millis(200));
    }

    #[test]
    fn test_snapshot_reports_tuning() {
        let snapshot = SharedBackoff::new(&config(10, 5, 2)).snapshot();
        assert_eq!(snapshot.interval, Duration::from_millis(10));
        assert_eq!(snapshot.increment, Duration::from_millis(5));
        assert_eq!(snapshot.decrement, Duration::from_millis(2));
        assert_eq!(snapshot.max, None);
    }

    #[test]
    fn test_microsecond_tunables() {
        let backoff = SharedBackoff::new(&BackoffConfig::from_durations(
            Duration::from_micros(1000),
            Duration::from_micros(1000),
            Duration::from_micros(1),
        ));
        assert_eq!(backoff.grow(None), Duration::from_micros(2000));
        assert_eq!(backoff.shrink(), Duration::from_micros(1999));
    }
}
