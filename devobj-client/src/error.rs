//! Client error types.

use devobj_protocol::Status;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] devobj_protocol::ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("device error: {status}")]
    Device { status: Status, payload: String },
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Timeout => true,
            ClientError::ConnectionClosed => true,
            ClientError::Device { status, .. } => *status == Status::DeviceBusy,
            _ => false,
        }
    }

    /// Protocol status reported by the device, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            ClientError::Device { status, .. } => Some(*status),
            _ => None,
        }
    }
}
