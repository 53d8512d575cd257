// Webhook delivery with adaptive pacing
//
// Handles:
// - HTTP transport with per-call proxy selection
// - Shared backoff interval tuned by rate-limit responses
// - The send loop and its error taxonomy

pub mod backoff;
pub mod error;
pub mod sender;
pub mod transport;

pub use backoff::{BackoffSnapshot, SharedBackoff};
pub use error::DeliveryError;
pub use sender::WebhookSender;
pub use transport::HttpTransport;
