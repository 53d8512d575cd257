// Notifier configuration
//
// Tunables for delivery pacing, the status-code reporter and the HTTP
// transport. Values are captured once when a sender is built; environment
// variables override the defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment flag enabling status-code telemetry (any non-empty value)
pub const TELEMETRY_ENV: &str = "SLACK_WEBHOOK_DEBUG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifierConfig {
    /// Record status codes and run the periodic reporter
    pub telemetry_enabled: bool,

    /// Interval between status-code reports in seconds
    pub report_interval_secs: u64,

    /// Adaptive backoff tuning
    pub backoff: BackoffConfig,

    /// HTTP transport settings
    pub transport: TransportConfig,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            telemetry_enabled: false,
            report_interval_secs: 3600,
            backoff: BackoffConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

/// Backoff configuration
///
/// The interval starts at `initial_interval_us`, grows by `increment_us` on
/// every rate-limited response and shrinks by `decrement_us` on success. It
/// never drops below `min_interval_us`; `max_interval_us` adds a hard upper
/// bound only when set. Values are microseconds so sub-millisecond pacing
/// can be expressed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_interval_us: u64,
    pub min_interval_us: u64,
    pub max_interval_us: Option<u64>,
    pub increment_us: u64,
    pub decrement_us: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval_us: 100_000,
            min_interval_us: 0,
            max_interval_us: None,
            increment_us: 100_000,
            decrement_us: 1_000,
        }
    }
}

impl BackoffConfig {
    /// Build a configuration from durations, keeping the default bounds
    pub fn from_durations(initial: Duration, increment: Duration, decrement: Duration) -> Self {
        Self {
            initial_interval_us: as_micros(initial),
            increment_us: as_micros(increment),
            decrement_us: as_micros(decrement),
            ..Self::default()
        }
    }

    pub fn initial(&self) -> Duration {
        Duration::from_micros(self.initial_interval_us)
    }

    pub fn min(&self) -> Duration {
        Duration::from_micros(self.min_interval_us)
    }

    /// Hard upper bound, if any
    pub fn max(&self) -> Option<Duration> {
        self.max_interval_us.map(Duration::from_micros)
    }

    pub fn increment(&self) -> Duration {
        Duration::from_micros(self.increment_us)
    }

    pub fn decrement(&self) -> Duration {
        Duration::from_micros(self.decrement_us)
    }
}

fn as_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Per-request timeout in seconds (0 disables the timeout)
    pub request_timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: format!("slack-webhook/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl NotifierConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> Self {
        Self::default().apply_env_overrides()
    }

    /// Enable or disable telemetry
    pub fn with_telemetry(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = enabled;
        self
    }

    /// Get the report interval
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over current values:
    /// - SLACK_WEBHOOK_DEBUG
    /// - SLACK_WEBHOOK_REPORT_INTERVAL_SECS
    /// - SLACK_WEBHOOK_BACKOFF_{INITIAL,MIN,MAX,INCREMENT,DECREMENT}_US
    /// - SLACK_WEBHOOK_REQUEST_TIMEOUT_SECS
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(flag) = std::env::var(TELEMETRY_ENV) {
            self.telemetry_enabled = !flag.is_empty();
        }

        if let Some(secs) = env_u64("SLACK_WEBHOOK_REPORT_INTERVAL_SECS") {
            if secs > 0 {
                self.report_interval_secs = secs;
            }
        }

        if let Some(us) = env_u64("SLACK_WEBHOOK_BACKOFF_INITIAL_US") {
            self.backoff.initial_interval_us = us;
        }
        if let Some(us) = env_u64("SLACK_WEBHOOK_BACKOFF_MIN_US") {
            self.backoff.min_interval_us = us;
        }
        if let Some(us) = env_u64("SLACK_WEBHOOK_BACKOFF_MAX_US") {
            self.backoff.max_interval_us = Some(us);
        }
        if let Some(us) = env_u64("SLACK_WEBHOOK_BACKOFF_INCREMENT_US") {
            self.backoff.increment_us = us;
        }
        if let Some(us) = env_u64("SLACK_WEBHOOK_BACKOFF_DECREMENT_US") {
            self.backoff.decrement_us = us;
        }

        if let Some(secs) = env_u64("SLACK_WEBHOOK_REQUEST_TIMEOUT_SECS") {
            self.transport.request_timeout_secs = secs;
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the report interval is zero or the backoff bounds
    /// are inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.report_interval_secs == 0 {
            anyhow::bail!("Report interval must be > 0 seconds");
        }

        let backoff = &self.backoff;
        if backoff.initial_interval_us < backoff.min_interval_us {
            anyhow::bail!(
                "Backoff initial interval ({} us) is below min interval ({} us)",
                backoff.initial_interval_us,
                backoff.min_interval_us
            );
        }
        if let Some(max) = backoff.max_interval_us {
            if backoff.min_interval_us > max {
                anyhow::bail!(
                    "Backoff min interval ({} us) exceeds max interval ({} us)",
                    backoff.min_interval_us,
                    max
                );
            }
            if backoff.initial_interval_us > max {
                anyhow::bail!(
                    "Backoff initial interval ({} us) exceeds max interval ({} us)",
                    backoff.initial_interval_us,
                    max
                );
            }
        }

        if self.transport.user_agent.is_empty() {
            anyhow::bail!("User agent must not be empty");
        }

        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}
