// Webhook sender with adaptive rate-limit pacing
//
// Delivers one payload per call:
// - POST the JSON body, record the status, then always sleep the shared interval
// - 429: grow the interval (bounded by Retry-After) and try again
// - other >= 400: give up with the status
// - success: shrink the interval
//
// The loop is unbounded unless the caller supplies a deadline or a
// cancellation token.

use std::future::Future;

use anyhow::Context;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::NotifierConfig;
use crate::payload::Payload;
use crate::telemetry::Telemetry;
use crate::webhooks::backoff::SharedBackoff;
use crate::webhooks::error::{DeliveryError, Result};
use crate::webhooks::transport::HttpTransport;

/// Outcome of evaluating one response
#[derive(Debug, Clone, PartialEq, Eq)]
enum Attempt {
    Delivered,
    RateLimited { retry_after_secs: Option<u64> },
}

/// Webhook sender
///
/// Clones share the backoff interval, the telemetry context and the HTTP
/// transport. Concurrency is up to the caller: run `send` from as many tasks
/// as needed.
#[derive(Debug, Clone)]
pub struct WebhookSender {
    transport: HttpTransport,
    backoff: SharedBackoff,
    telemetry: Telemetry,
    telemetry_enabled: bool,
}

impl WebhookSender {
    /// Create a sender with its own backoff and telemetry context
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: NotifierConfig) -> anyhow::Result<Self> {
        config.validate().context("Invalid notifier configuration")?;

        let backoff = SharedBackoff::new(&config.backoff);
        let telemetry = Telemetry::new(config.report_interval(), backoff.clone())?;
        let transport =
            HttpTransport::new(config.transport.clone()).context("Failed to build HTTP transport")?;

        Ok(Self {
            transport,
            backoff,
            telemetry,
            telemetry_enabled: config.telemetry_enabled,
        })
    }

    /// Create a sender from defaults plus environment overrides
    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(NotifierConfig::from_env())
    }

    pub fn backoff(&self) -> &SharedBackoff {
        &self.backoff
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.telemetry_enabled
    }

    /// Start periodic status reporting if telemetry is enabled
    pub fn init(&self) -> anyhow::Result<()> {
        if self.telemetry_enabled {
            self.telemetry.start_ticker()?;
        }
        Ok(())
    }

    /// Stop periodic status reporting if telemetry is enabled
    pub async fn exit(&self) {
        if self.telemetry_enabled {
            self.telemetry.stop_ticker().await;
        }
    }

    /// Deliver a payload, retrying while the endpoint is rate limiting
    ///
    /// # Arguments
    /// * `endpoint` - Webhook URL
    /// * `proxy` - Proxy URL; `None` or empty for a direct connection
    /// * `payload` - Message to deliver
    ///
    /// # Errors
    ///
    /// Returns the single failure that ended the delivery. Rate-limited
    /// responses are never returned; they are retried.
    pub async fn send(&self, endpoint: &str, proxy: Option<&str>, payload: &Payload) -> Result<()> {
        self.deliver(endpoint, proxy, payload).await
    }

    /// Like [`send`](Self::send), giving up with `DeadlineExceeded` at `deadline`
    pub async fn send_with_deadline(
        &self,
        endpoint: &str,
        proxy: Option<&str>,
        payload: &Payload,
        deadline: Instant,
    ) -> Result<()> {
        tokio::select! {
            result = self.deliver(endpoint, proxy, payload) => result,
            _ = tokio::time::sleep_until(deadline) => {
                warn!("Webhook delivery exceeded its deadline");
                Err(DeliveryError::DeadlineExceeded)
            }
        }
    }

    /// Like [`send`](Self::send), giving up with `Cancelled` once `cancel` fires
    pub async fn send_cancellable(
        &self,
        endpoint: &str,
        proxy: Option<&str>,
        payload: &Payload,
        cancel: &CancellationToken,
    ) -> Result<()> {
        with_cancellation(cancel, self.deliver(endpoint, proxy, payload)).await
    }

    async fn deliver(&self, endpoint: &str, proxy: Option<&str>, payload: &Payload) -> Result<()> {
        let body = serde_json::to_vec(payload)?;
        let client = self.transport.client_for(proxy)?;

        if endpoint.is_empty() {
            return Err(DeliveryError::InvalidEndpoint {
                endpoint: String::new(),
                reason: "empty URL".to_string(),
            });
        }
        let url = reqwest::Url::parse(endpoint).map_err(|e| DeliveryError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        // The URL path carries the webhook secret, so logs name the host only
        let target = url.host_str().unwrap_or("<no host>").to_string();

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let response = client
                .post(url.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await
                .map_err(|e| {
                    warn!("Webhook {} attempt {} failed: {}", target, attempt, e);
                    DeliveryError::Transport(e)
                })?;

            let status = response.status();
            debug!("Webhook {} attempt {} - status {}", target, attempt, status.as_u16());

            if self.telemetry_enabled {
                self.telemetry.record_status(status.as_u16());
            }

            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
            // Release the connection before pacing
            drop(response);

            // Every send is paced, not only retries
            tokio::time::sleep(self.backoff.current()).await;

            match evaluate(status, retry_after.as_deref()) {
                Ok(Attempt::RateLimited { retry_after_secs }) => {
                    let interval = self.backoff.grow(retry_after_secs);
                    if self.telemetry_enabled {
                        self.telemetry.observe_backoff(interval);
                    }
                    warn!(
                        "Webhook {} rate limited on attempt {}, backoff now {:?}",
                        target, attempt, interval
                    );
                }
                Ok(Attempt::Delivered) => {
                    let interval = self.backoff.shrink();
                    if self.telemetry_enabled {
                        self.telemetry.observe_backoff(interval);
                    }
                    debug!("Webhook {} delivered after {} attempt(s)", target, attempt);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Webhook {} delivery failed ({}): {}", target, e.kind(), e);
                    return Err(e);
                }
            }
        }
    }
}

/// Classify a response status and its Retry-After header
fn evaluate(status: StatusCode, retry_after: Option<&str>) -> Result<Attempt> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        // An empty header counts as absent
        let retry_after_secs = match retry_after {
            Some(value) if !value.is_empty() => Some(parse_retry_after(value)?),
            _ => None,
        };
        Ok(Attempt::RateLimited { retry_after_secs })
    } else if status.as_u16() >= 400 {
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
        })
    } else {
        Ok(Attempt::Delivered)
    }
}

/// Parse a Retry-After header given as a whole number of seconds
fn parse_retry_after(value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| DeliveryError::RetryAfterParse {
        value: value.to_string(),
    })
}

async fn with_cancellation<F>(cancel: &CancellationToken, delivery: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::select! {
        result = delivery => result,
        _ = cancel.cancelled() => Err(DeliveryError::Cancelled),
    }
}
