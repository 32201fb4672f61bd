//! Error types for the notification channels.

use thiserror::Error;

/// Result type alias for notification operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors raised by a single outbound send or generation request.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("smtp error: {0}")]
    Smtp(String),

    #[error("channel not configured: {0}")]
    NotConfigured(String),

    #[error("{0} timed out")]
    Timeout(&'static str),
}
