//! Server error types.

use crate::config::ConfigError;
use devobj_protocol::{ProtocolError, Status};
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] devobj_core::RegistryError),

    #[error("device thread is not running")]
    DeviceGone,

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Status to report to a peer for this error, if the peer caused it or
    /// can retry.
    pub fn status(&self) -> Option<Status> {
        match self {
            ServerError::Protocol(ProtocolError::LineTooLong { .. }) => {
                Some(Status::RequestTooLong)
            }
            ServerError::Protocol(_) => Some(Status::WrongFormat),
            ServerError::DeviceGone | ServerError::ShuttingDown => Some(Status::DeviceBusy),
            ServerError::Io(_) | ServerError::Config(_) | ServerError::Registry(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ServerError::from(ProtocolError::LineTooLong { len: 10, max: 4 });
        assert_eq!(err.status(), Some(Status::RequestTooLong));
        assert_eq!(
            ServerError::from(ProtocolError::InvalidUtf8).status(),
            Some(Status::WrongFormat)
        );
        assert_eq!(ServerError::DeviceGone.status(), Some(Status::DeviceBusy));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(ServerError::from(io).status(), None);
    }
}
