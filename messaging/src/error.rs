//! Messaging error taxonomy.
//!
//! Transient broker unavailability is retried locally and only surfaces as
//! [`MessagingError::ConnectExhausted`] once the bounded connect retry gives
//! up. Handler-level business failures stay `anyhow::Error` on the handler
//! side; the library logs them and applies the queue's nack/requeue policy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    /// Initial connection retry exhausted; the service continues degraded.
    #[error("broker connection failed after {attempts} attempts")]
    ConnectExhausted {
        attempts: u32,
        #[source]
        source: lapin::Error,
    },

    /// A broker operation failed on an established channel.
    #[error("broker operation failed: {0}")]
    Broker(#[from] lapin::Error),

    /// Message body could not be serialized or decoded as JSON.
    #[error("malformed message body: {0}")]
    Decode(#[from] serde_json::Error),
}
