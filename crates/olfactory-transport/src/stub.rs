//! In-process stub binding for host-side testing.
//!
//! The stub performs no I/O. Every write lands in a log shared with a
//! [`StubHandle`], which tests use to inspect what would have gone over the
//! wire and to inject failures.

use crate::error::{Result, TransportError};
use crate::traits::DeviceSession;
use olfactory_core::TransportKind;
use olfactory_protocol::Command;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// A single write recorded by the stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireWrite {
    Text(String),
    Word(u32),
}

#[derive(Debug, Default)]
struct StubState {
    connected: bool,
    address: Option<String>,
    open_count: usize,
    writes: Vec<WireWrite>,
    responses: VecDeque<String>,
    fail_open: bool,
    fail_writes: bool,
}

fn lock(state: &Mutex<StubState>) -> MutexGuard<'_, StubState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Stub session that records writes instead of sending them.
#[derive(Debug)]
pub struct StubSession {
    state: Arc<Mutex<StubState>>,
}

impl StubSession {
    /// Create a stub session and the handle observing it.
    pub fn new() -> (Self, StubHandle) {
        let state = Arc::new(Mutex::new(StubState::default()));
        let handle = StubHandle {
            state: Arc::clone(&state),
        };
        (Self { state }, handle)
    }

    fn record(&self, write: WireWrite) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_writes {
            return Err(TransportError::write_failed("Injected write failure"));
        }
        debug!(write = ?write, "Stub write");
        state.writes.push(write);
        Ok(())
    }
}

impl DeviceSession for StubSession {
    fn kind(&self) -> TransportKind {
        TransportKind::Stub
    }

    fn open(&mut self, address: &str) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_open {
            return Err(TransportError::open_failed(address, "Injected open failure"));
        }
        state.connected = true;
        state.address = Some(address.to_string());
        state.open_count += 1;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = lock(&self.state);
        state.connected = false;
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        self.record(WireWrite::Text(text.to_string()))
    }

    fn send_binary32(&mut self, word: u32) -> Result<()> {
        self.record(WireWrite::Word(word))
    }

    fn receive_text(&mut self) -> Result<String> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        Ok(state.responses.pop_front().unwrap_or_default())
    }
}

/// Observer and fault injector for a [`StubSession`].
///
/// Cloning the handle shares the same log.
#[derive(Debug, Clone)]
pub struct StubHandle {
    state: Arc<Mutex<StubState>>,
}

impl StubHandle {
    /// Another session sharing this handle's log and fault settings.
    ///
    /// Connection state is shared too, so the new session starts out
    /// connected if the previous one was left open.
    pub fn session(&self) -> StubSession {
        StubSession {
            state: Arc::clone(&self.state),
        }
    }

    /// Every recorded write, in order.
    pub fn writes(&self) -> Vec<WireWrite> {
        lock(&self.state).writes.clone()
    }

    /// Text commands sent, in order.
    pub fn sent_text(&self) -> Vec<String> {
        lock(&self.state)
            .writes
            .iter()
            .filter_map(|write| match write {
                WireWrite::Text(text) => Some(text.clone()),
                WireWrite::Word(_) => None,
            })
            .collect()
    }

    /// Text commands sent, parsed. Lines that are not valid commands are
    /// skipped.
    pub fn sent_commands(&self) -> Vec<Command> {
        self.sent_text()
            .iter()
            .filter_map(|text| text.parse().ok())
            .collect()
    }

    /// 32-bit words sent, in order.
    pub fn sent_words(&self) -> Vec<u32> {
        lock(&self.state)
            .writes
            .iter()
            .filter_map(|write| match write {
                WireWrite::Word(word) => Some(*word),
                WireWrite::Text(_) => None,
            })
            .collect()
    }

    /// Forget recorded writes.
    pub fn clear(&self) {
        lock(&self.state).writes.clear();
    }

    /// Make subsequent opens fail.
    pub fn set_fail_open(&self, fail: bool) {
        lock(&self.state).fail_open = fail;
    }

    /// Make subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Queue a response for the next `receive_text`.
    pub fn push_response(&self, response: impl Into<String>) {
        lock(&self.state).responses.push_back(response.into());
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// Address passed to the most recent successful open.
    pub fn address(&self) -> Option<String> {
        lock(&self.state).address.clone()
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olfactory_core::ChannelIndex;

    #[test]
    fn test_records_writes_in_order() {
        let (mut session, handle) = StubSession::new();
        session.open("stub-1").unwrap();

        session.send_text("motor(0,30)").unwrap();
        session.send_binary32(0x001E_0028).unwrap();
        session.send_text("release(1,20)").unwrap();

        assert_eq!(
            handle.writes(),
            vec![
                WireWrite::Text("motor(0,30)".into()),
                WireWrite::Word(0x001E_0028),
                WireWrite::Text("release(1,20)".into()),
            ]
        );
        assert_eq!(handle.sent_words(), vec![0x001E_0028]);
        assert_eq!(
            handle.sent_commands(),
            vec![
                Command::Motor { id: 0, speed: 30 },
                Command::Release {
                    channel: ChannelIndex::new(1).unwrap(),
                    amount: 20
                },
            ]
        );
    }

    #[test]
    fn test_closed_session_rejects_writes() {
        let (mut session, handle) = StubSession::new();

        assert!(matches!(
            session.send_text("fan(0,0)"),
            Err(TransportError::NotConnected)
        ));

        session.open("stub-1").unwrap();
        session.close();
        session.close();
        assert!(!handle.is_connected());
        assert!(handle.writes().is_empty());
    }

    #[test]
    fn test_injected_failures() {
        let (mut session, handle) = StubSession::new();

        handle.set_fail_open(true);
        assert!(matches!(
            session.open("stub-1"),
            Err(TransportError::OpenFailed { .. })
        ));
        assert_eq!(handle.open_count(), 0);

        handle.set_fail_open(false);
        session.open("stub-1").unwrap();
        assert_eq!(handle.address().as_deref(), Some("stub-1"));

        handle.set_fail_writes(true);
        assert!(matches!(
            session.send_text("release(0,10)"),
            Err(TransportError::WriteFailed { .. })
        ));
        assert!(handle.sent_text().is_empty());
    }

    #[test]
    fn test_receive_empty_is_ok() {
        let (mut session, handle) = StubSession::new();
        session.open("stub-1").unwrap();

        assert_eq!(session.receive_text().unwrap(), "");

        handle.push_response("ok");
        assert_eq!(session.receive_text().unwrap(), "ok");
        assert_eq!(session.receive_text().unwrap(), "");
    }
}
