//! Slack-style incoming-webhook delivery
//!
//! This library posts message payloads to an incoming-webhook endpoint,
//! pacing every send with a shared adaptive backoff interval that grows on
//! rate-limited responses and shrinks on success. Observed HTTP status codes
//! are counted and reported on a fixed interval when telemetry is enabled.
//!
//! # Example
//!
//! ```ignore
//! use slack_webhook::{NotifierConfig, Payload, WebhookSender};
//!
//! let sender = WebhookSender::new(NotifierConfig::from_env())?;
//! sender.init()?;
//! sender.send("https://hooks.example.com/services/T000/B000/XXX", None, &Payload::text("deployed")).await?;
//! sender.exit().await;
//! ```

pub mod config;
pub mod payload;
pub mod telemetry;
pub mod webhooks;

pub use config::{BackoffConfig, NotifierConfig, TransportConfig};
pub use payload::{Action, Attachment, Field, Payload};
pub use telemetry::{StatusReport, Telemetry, TickerStatus};
pub use webhooks::{DeliveryError, SharedBackoff, WebhookSender};
