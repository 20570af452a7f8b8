//! Error types for transport operations.
//!
//! These cover what can go wrong between the controller and the wire:
//! the handle could not be acquired, the session is closed, a write or read
//! failed, or the binding lacks a capability.

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The session is not open.
    #[error("Not connected")]
    NotConnected,

    /// The underlying handle could not be acquired.
    #[error("Open failed for {address}: {message}")]
    OpenFailed { address: String, message: String },

    /// A write did not complete. Partial writes count as failures.
    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    /// A read failed for a reason other than timeout.
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    /// The binding does not implement this capability.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// The command text could not be framed for this transport.
    #[error("Protocol error: {0}")]
    Protocol(#[from] olfactory_core::Error),

    /// Serial port error.
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn open_failed(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    pub fn read_failed(message: impl Into<String>) -> Self {
        Self::ReadFailed {
            message: message.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_failed_error() {
        let error = TransportError::open_failed("COM9", "No such file or directory");
        assert!(matches!(error, TransportError::OpenFailed { .. }));
        assert_eq!(
            error.to_string(),
            "Open failed for COM9: No such file or directory"
        );
    }

    #[test]
    fn test_unsupported_error() {
        let error = TransportError::unsupported("send_binary32");
        assert_eq!(error.to_string(), "Unsupported operation: send_binary32");
    }

    #[test]
    fn test_protocol_error_from_core() {
        let error: TransportError = olfactory_core::Error::malformed("bad").into();
        assert!(matches!(error, TransportError::Protocol(_)));
    }
}
