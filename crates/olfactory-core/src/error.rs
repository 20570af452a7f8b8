//! Error taxonomy for device control operations.
//!
//! The facade reports failures with these variants unchanged, so callers can
//! tell an open failure from a transmit failure without reading logs. A soft
//! cooldown rejection is never an error.

use thiserror::Error;

/// Result code returned by a C-style export shim on success.
pub const RESULT_SUCCESS: i32 = 0;

/// The runtime library could not be located.
pub const RESULT_LIBRARY_NOT_FOUND: i32 = -1;

/// The requested operation is not supported.
pub const RESULT_FUNCTION_UNSUPPORTED: i32 = -2;

/// Any failure without a more specific code.
pub const RESULT_UNKNOWN: i32 = -3;

/// A command could not be delivered to the device.
pub const RESULT_SEND_DEVICE_COMMAND_FAILED: i32 = -4;

#[derive(Error, Debug)]
pub enum Error {
    // Session lifecycle
    #[error("Session already active: {device}")]
    AlreadyActive { device: String },

    #[error("No active session: {device}")]
    NoActiveSession { device: String },

    #[error("Failed to open device {device}: {reason}")]
    OpenFailed { device: String, reason: String },

    // Transmission
    #[error("Failed to transmit to device {device}: {reason}")]
    TransmitFailed { device: String, reason: String },

    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    // Arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    // Wire format
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    // Configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn already_active(device: impl Into<String>) -> Self {
        Self::AlreadyActive {
            device: device.into(),
        }
    }

    pub fn no_active_session(device: impl Into<String>) -> Self {
        Self::NoActiveSession {
            device: device.into(),
        }
    }

    pub fn open_failed(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            device: device.into(),
            reason: reason.into(),
        }
    }

    pub fn transmit_failed(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransmitFailed {
            device: device.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn unknown_device(device: impl Into<String>) -> Self {
        Self::UnknownDevice(device.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage(message.into())
    }

    /// Map the error to the integer code of the C-style result enum.
    ///
    /// The C result enum has no dedicated code for most session errors, so
    /// they share [`RESULT_UNKNOWN`]. The variant itself is still logged.
    ///
    /// # Examples
    ///
    /// ```
    /// use olfactory_core::error::{Error, RESULT_FUNCTION_UNSUPPORTED};
    ///
    /// let err = Error::unsupported("set_orientation");
    /// assert_eq!(err.result_code(), RESULT_FUNCTION_UNSUPPORTED);
    /// ```
    #[must_use]
    pub fn result_code(&self) -> i32 {
        match self {
            Self::Unsupported { .. } => RESULT_FUNCTION_UNSUPPORTED,
            Self::TransmitFailed { .. } => RESULT_SEND_DEVICE_COMMAND_FAILED,
            Self::AlreadyActive { .. }
            | Self::NoActiveSession { .. }
            | Self::OpenFailed { .. }
            | Self::InvalidArgument(_)
            | Self::UnknownDevice(_)
            | Self::MalformedMessage(_)
            | Self::Config(_)
            | Self::Io(_) => RESULT_UNKNOWN,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Collapse an operation result into its C-style result code.
pub fn result_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => RESULT_SUCCESS,
        Err(e) => e.result_code(),
    }
}
