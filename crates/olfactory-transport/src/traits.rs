//! Transport session trait.
//!
//! A session is a half-duplex command channel to one physical device. The
//! facade only ever talks to hardware through this trait, so serial, network
//! and stub bindings are interchangeable at runtime.
//!
//! # Dispatch
//!
//! The trait is object-safe, but the controller stores sessions as the
//! [`AnySession`](crate::devices::AnySession) enum so the binding is chosen
//! once, when the session is constructed, from configuration.
//!
//! # Examples
//!
//! ```
//! use olfactory_transport::stub::StubSession;
//! use olfactory_transport::traits::DeviceSession;
//!
//! let (mut session, handle) = StubSession::new();
//! session.open("COM3").unwrap();
//! session.send_text("release(0,10)").unwrap();
//!
//! assert!(session.is_connected());
//! assert_eq!(handle.sent_text(), vec!["release(0,10)".to_string()]);
//! ```

use crate::error::Result;
use olfactory_core::TransportKind;

/// Half-duplex command channel to a device.
///
/// Implementations must be `Send` so the background pump can drive them from
/// its worker thread.
pub trait DeviceSession: Send {
    /// Which binding this is.
    fn kind(&self) -> TransportKind;

    /// Acquire the underlying handle.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::OpenFailed`](crate::TransportError::OpenFailed)
    /// if the port cannot be opened or the address cannot be resolved.
    fn open(&mut self, address: &str) -> Result<()>;

    /// Release the handle. Calling this on a closed session does nothing.
    fn close(&mut self);

    /// Cached connection state; performs no I/O.
    fn is_connected(&self) -> bool;

    /// Send one text command.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` when closed and `WriteFailed` when the write
    /// fails or completes only partially.
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Send a 32-bit word as four big-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` on bindings without binary writes.
    fn send_binary32(&mut self, word: u32) -> Result<()>;

    /// Read whatever response text is available.
    ///
    /// An empty string means nothing arrived before the read timeout; that
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` when closed and `ReadFailed` on I/O errors.
    fn receive_text(&mut self) -> Result<String>;
}
