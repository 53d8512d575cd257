//! Webhook Delivery Error Types
//!
//! Every failed `send` resolves to exactly one of these. Rate-limited
//! responses are retried internally and never surface here.

/// Result type alias for delivery operations
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error types for webhook delivery
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Payload could not be encoded as JSON
    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Endpoint URL is empty or malformed
    #[error("Invalid webhook endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Proxy URL could not be used to build a client
    #[error("Invalid proxy configuration '{proxy}': {reason}")]
    ProxyConfiguration { proxy: String, reason: String },

    /// DNS, connect, TLS or timeout failure
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// 429 response carried a Retry-After header that is not a second count
    #[error("Error parsing Retry-After header: {value}")]
    RetryAfterParse { value: String },

    /// Endpoint answered with a non-rate-limit error status
    #[error("Error sending msg. Status: {status}")]
    Rejected { status: u16 },

    /// Caller cancelled the delivery
    #[error("Delivery cancelled")]
    Cancelled,

    /// Caller-supplied deadline elapsed before delivery finished
    #[error("Delivery deadline exceeded")]
    DeadlineExceeded,
}

impl DeliveryError {
    /// HTTP status carried by a rejection, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::Rejected { status } => Some(*status),
            DeliveryError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Serialization(_) => "serialization",
            DeliveryError::InvalidEndpoint { .. } => "invalid_endpoint",
            DeliveryError::ProxyConfiguration { .. } => "proxy_configuration",
            DeliveryError::Transport(_) => "transport",
            DeliveryError::RetryAfterParse { .. } => "retry_after_parse",
            DeliveryError::Rejected { .. } => "rejected",
            DeliveryError::Cancelled => "cancelled",
            DeliveryError::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_carries_status() {
        let err = DeliveryError::Rejected { status: 500 };
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.kind(), "rejected");
        assert_eq!(err.to_string(), "Error sending msg. Status: 500");
    }

    #[test]
    fn test_retry_after_parse_message() {
        let err = DeliveryError::RetryAfterParse {
            value: "soon".to_string(),
        };
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_serialization_from_serde() {
        let serde_err = serde_json::from_str::<u8>("x").unwrap_err();
        let err: DeliveryError = serde_err.into();
        assert_eq!(err.kind(), "serialization");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(DeliveryError::Cancelled.kind(), "cancelled");
        assert_eq!(DeliveryError::DeadlineExceeded.kind(), "deadline_exceeded");
        assert_eq!(
            DeliveryError::RetryAfterParse { value: String::new() }.kind(),
            "retry_after_parse"
        );
    }
}
