//! Enum dispatch over transport bindings.
//!
//! The binding is picked once from [`ControllerConfig::transport`] when a
//! session is constructed. Everything above this layer holds an
//! [`AnySession`] and never branches on the transport kind again.
//!
//! # Examples
//!
//! ```
//! use olfactory_core::{ControllerConfig, TransportKind};
//! use olfactory_transport::devices::AnySession;
//! use olfactory_transport::traits::DeviceSession;
//!
//! let config = ControllerConfig::with_transport(TransportKind::Network);
//! let session = AnySession::from_config(&config);
//! assert_eq!(session.kind(), TransportKind::Network);
//! ```

use crate::error::Result;
use crate::network::NetworkSession;
use crate::serial::SerialSession;
use crate::stub::{StubHandle, StubSession};
use crate::traits::DeviceSession;
use olfactory_core::{ControllerConfig, TransportKind};

/// A session over any supported binding.
#[derive(Debug)]
pub enum AnySession {
    Serial(SerialSession),
    Network(NetworkSession),
    Stub(StubSession),
}

impl AnySession {
    /// Build an unopened session of the configured kind.
    ///
    /// A stub built this way has no reachable handle; use
    /// [`AnySession::stub`] when the writes need inspecting.
    pub fn from_config(config: &ControllerConfig) -> Self {
        match config.transport {
            TransportKind::Serial => Self::Serial(SerialSession::new(config.serial.clone())),
            TransportKind::Network => Self::Network(
                NetworkSession::new(config.network.clone())
                    .with_binary(config.orientation_over_network),
            ),
            TransportKind::Stub => Self::stub().0,
        }
    }

    /// Build a stub session and its handle.
    pub fn stub() -> (Self, StubHandle) {
        let (session, handle) = StubSession::new();
        (Self::Stub(session), handle)
    }
}

impl DeviceSession for AnySession {
    fn kind(&self) -> TransportKind {
        match self {
            Self::Serial(session) => session.kind(),
            Self::Network(session) => session.kind(),
            Self::Stub(session) => session.kind(),
        }
    }

    fn open(&mut self, address: &str) -> Result<()> {
        match self {
            Self::Serial(session) => session.open(address),
            Self::Network(session) => session.open(address),
            Self::Stub(session) => session.open(address),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Serial(session) => session.close(),
            Self::Network(session) => session.close(),
            Self::Stub(session) => session.close(),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Self::Serial(session) => session.is_connected(),
            Self::Network(session) => session.is_connected(),
            Self::Stub(session) => session.is_connected(),
        }
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        match self {
            Self::Serial(session) => session.send_text(text),
            Self::Network(session) => session.send_text(text),
            Self::Stub(session) => session.send_text(text),
        }
    }

    fn send_binary32(&mut self, word: u32) -> Result<()> {
        match self {
            Self::Serial(session) => session.send_binary32(word),
            Self::Network(session) => session.send_binary32(word),
            Self::Stub(session) => session.send_binary32(word),
        }
    }

    fn receive_text(&mut self) -> Result<String> {
        match self {
            Self::Serial(session) => session.receive_text(),
            Self::Network(session) => session.receive_text(),
            Self::Stub(session) => session.receive_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TransportKind::Serial)]
    #[case(TransportKind::Network)]
    #[case(TransportKind::Stub)]
    fn test_from_config_kind(#[case] kind: TransportKind) {
        let session = AnySession::from_config(&ControllerConfig::with_transport(kind));
        assert_eq!(session.kind(), kind);
        assert!(!session.is_connected());
    }

    #[test]
    fn test_stub_dispatch() {
        let (mut session, handle) = AnySession::stub();
        session.open("stub-1").unwrap();
        session.send_text("fan(1,30)").unwrap();
        session.close();

        assert_eq!(handle.sent_text(), vec!["fan(1,30)".to_string()]);
        assert!(!handle.is_connected());
    }
}
