//! Background command pump.
//!
//! One worker thread per device session drains two pending-command slots at
//! a fixed cadence, so callers never block on transport latency:
//!
//! - the **scent slot**, which either keeps only the most recent command
//!   ([`SlotPolicy::Latest`], the default) or queues up to
//!   [`MAX_FIFO_DEPTH`] commands in order ([`SlotPolicy::Fifo`]);
//! - the **actuator slot** for fan/motor commands, which always keeps only
//!   the most recent command and is cleared once sent.
//!
//! ```text
//! caller ── set_scent ──► [scent slot]   ─┐
//!                                         ├─► worker ── send_text ──► session
//! caller ── set_command ► [actuator slot] ┘     (every interval)
//! ```
//!
//! Every command is set together with the wait the worker sleeps between
//! passes; the most recent wait wins. A command overwritten in a `Latest`
//! slot before the worker ran is never sent. [`CommandPump::stop`] wakes the
//! worker, waits for it to exit, and delivers whatever is still pending on
//! the way out.
//!
//! The worker holds the session lock from taking the slots until the last
//! command is written. A caller that clears the scent slot and then writes
//! on the session itself can therefore never be overtaken by a command the
//! worker already took.

use crate::devices::AnySession;
use crate::error::{Result, TransportError};
use crate::traits::DeviceSession;
use olfactory_core::DeviceId;
use olfactory_core::config::{PumpConfig, SlotPolicy};
use olfactory_core::constants::MAX_FIFO_DEPTH;
use olfactory_protocol::Command;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// A session shared between the caller's thread and the pump worker.
pub type SharedSession = Arc<Mutex<AnySession>>;

/// Lock a shared session, recovering from a poisoned lock.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, AnySession> {
    session
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
enum ScentSlot {
    Latest(Option<Command>),
    Fifo(VecDeque<Command>),
}

impl ScentSlot {
    fn new(policy: SlotPolicy) -> Self {
        match policy {
            SlotPolicy::Latest => Self::Latest(None),
            SlotPolicy::Fifo => Self::Fifo(VecDeque::new()),
        }
    }

    fn put(&mut self, command: Command, device: &DeviceId) {
        match self {
            Self::Latest(slot) => {
                if let Some(previous) = slot.replace(command) {
                    trace!(device = %device, dropped = %previous, "Pending scent command replaced");
                }
            }
            Self::Fifo(queue) => {
                if queue.len() >= MAX_FIFO_DEPTH
                    && let Some(dropped) = queue.pop_front()
                {
                    warn!(device = %device, dropped = %dropped, "Scent queue full, dropping oldest");
                }
                queue.push_back(command);
            }
        }
    }

    fn take_all(&mut self) -> Vec<Command> {
        match self {
            Self::Latest(slot) => slot.take().into_iter().collect(),
            Self::Fifo(queue) => queue.drain(..).collect(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Latest(slot) => usize::from(slot.is_some()),
            Self::Fifo(queue) => queue.len(),
        }
    }
}

#[derive(Debug)]
struct Slots {
    scent: ScentSlot,
    actuator: Option<Command>,
    wait: Duration,
}

#[derive(Debug)]
struct Shared {
    slots: Mutex<Slots>,
    running: AtomicBool,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Counters of pump deliveries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub sent: u64,
    pub failed: u64,
}

/// Background sender for one device session.
#[derive(Debug)]
pub struct CommandPump {
    device: DeviceId,
    interval: Duration,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl CommandPump {
    /// Spawn the worker thread.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if the thread cannot be spawned.
    pub fn start(session: SharedSession, device: DeviceId, config: &PumpConfig) -> Result<Self> {
        let interval = config.interval();
        let shared = Arc::new(Shared {
            slots: Mutex::new(Slots {
                scent: ScentSlot::new(config.scent_slot),
                actuator: None,
                wait: interval,
            }),
            running: AtomicBool::new(true),
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            let device = device.clone();
            thread::Builder::new()
                .name(format!("olfactory-pump-{device}"))
                .spawn(move || run(&shared, &session, &device))
                .map_err(TransportError::Io)?
        };

        info!(
            device = %device,
            interval_ms = config.interval_ms,
            policy = ?config.scent_slot,
            "Command pump started"
        );

        Ok(Self {
            device,
            interval,
            shared,
            worker: Some(worker),
        })
    }

    /// Queue a scent command according to the slot policy and set the
    /// worker's wait.
    pub fn set_scent(&self, command: Command, wait: Duration) {
        let previous = {
            let mut slots = self.shared.slots();
            slots.scent.put(command, &self.device);
            std::mem::replace(&mut slots.wait, wait)
        };
        self.wake_if_shorter(previous, wait);
    }

    /// Set the pending actuator command, replacing any unsent one, and set
    /// the worker's wait.
    pub fn set_command(&self, command: Command, wait: Duration) {
        let previous = {
            let mut slots = self.shared.slots();
            slots.actuator = Some(command);
            std::mem::replace(&mut slots.wait, wait)
        };
        self.wake_if_shorter(previous, wait);
    }

    // A worker parked on a longer wait would otherwise sleep it out first
    fn wake_if_shorter(&self, previous: Duration, wait: Duration) {
        if wait < previous
            && let Some(worker) = &self.worker
        {
            trace!(
                device = %self.device,
                wait_ms = wait.as_millis() as u64,
                "Pump wait shortened"
            );
            worker.thread().unpark();
        }
    }

    /// Wait configured at start.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait the worker currently sleeps between passes.
    pub fn wait(&self) -> Duration {
        self.shared.slots().wait
    }

    /// Discard pending scent commands. Returns how many were dropped.
    pub fn clear_scent(&self) -> usize {
        let dropped = self.shared.slots().scent.take_all().len();
        if dropped > 0 {
            debug!(device = %self.device, dropped, "Pending scent commands cleared");
        }
        dropped
    }

    /// Number of commands waiting for the worker.
    pub fn pending(&self) -> usize {
        let slots = self.shared.slots();
        slots.scent.len() + usize::from(slots.actuator.is_some())
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some() && self.shared.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PumpStats {
        PumpStats {
            sent: self.shared.sent.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// Pending commands are delivered before the worker exits. Calling this
    /// more than once does nothing.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.shared.running.store(false, Ordering::Release);
        worker.thread().unpark();

        if worker.join().is_err() {
            error!(device = %self.device, "Command pump worker panicked");
        }

        let stats = self.stats();
        info!(
            device = %self.device,
            sent = stats.sent,
            failed = stats.failed,
            "Command pump stopped"
        );
    }
}

impl Drop for CommandPump {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared, session: &SharedSession, device: &DeviceId) {
    debug!(device = %device, "Pump worker running");

    while shared.running.load(Ordering::Acquire) {
        drain(shared, session, device);
        let wait = shared.slots().wait;
        thread::park_timeout(wait);
    }

    // Final pass so commands set just before stop still go out
    drain(shared, session, device);
    debug!(device = %device, "Pump worker exiting");
}

fn drain(shared: &Shared, session: &SharedSession, device: &DeviceId) {
    // Session first, then slots: nothing taken here can be delivered after
    // a write the caller makes once it has cleared the slots
    let mut session = lock_session(session);
    let (scents, actuator) = {
        let mut slots = shared.slots();
        (slots.scent.take_all(), slots.actuator.take())
    };

    for command in scents.into_iter().chain(actuator) {
        deliver(shared, &mut session, device, &command);
    }
}

fn deliver(shared: &Shared, session: &mut AnySession, device: &DeviceId, command: &Command) {
    let text = command.to_string();

    match session.send_text(&text) {
        Ok(()) => {
            shared.sent.fetch_add(1, Ordering::Relaxed);
            match session.receive_text() {
                Ok(response) if !response.is_empty() => {
                    trace!(device = %device, response = %response, "Device response");
                }
                Ok(_) => {}
                Err(e) => debug!(device = %device, error = %e, "No response"),
            }
        }
        Err(e) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            warn!(device = %device, command = %text, error = %e, "Pump send failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubHandle;
    use olfactory_core::ChannelIndex;
    use olfactory_core::config::Actuator;
    use std::time::Instant;

    fn ch(i: u8) -> ChannelIndex {
        ChannelIndex::new(i).unwrap()
    }

    fn open_stub() -> (SharedSession, StubHandle) {
        let (mut session, handle) = AnySession::stub();
        session.open("pump-test").unwrap();
        (Arc::new(Mutex::new(session)), handle)
    }

    fn config(interval_ms: u64, scent_slot: SlotPolicy) -> PumpConfig {
        PumpConfig {
            interval_ms,
            scent_slot,
        }
    }

    const LONG: Duration = Duration::from_secs(10);

    fn wait_for(handle: &StubHandle, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while handle.sent_text().len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_latest_slot_keeps_most_recent() {
        let (session, handle) = open_stub();
        // Long interval: the worker's first pass runs before anything is set
        let mut pump = CommandPump::start(
            session,
            DeviceId::new("dev").unwrap(),
            &config(10_000, SlotPolicy::Latest),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(20));

        pump.set_scent(Command::release_for(ch(0), 1.0), LONG);
        pump.set_scent(Command::release_for(ch(1), 2.0), LONG);
        assert_eq!(pump.pending(), 1);

        pump.stop();
        assert_eq!(handle.sent_text(), vec!["release(1,20)"]);
        assert_eq!(pump.stats(), PumpStats { sent: 1, failed: 0 });
    }

    #[test]
    fn test_fifo_slot_keeps_order() {
        let (session, handle) = open_stub();
        let mut pump = CommandPump::start(
            session,
            DeviceId::new("dev").unwrap(),
            &config(10_000, SlotPolicy::Fifo),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(20));

        pump.set_scent(Command::release_for(ch(0), 1.0), LONG);
        pump.set_scent(Command::release_for(ch(1), 2.0), LONG);
        pump.set_command(Command::actuator(Actuator::fan(0), 50), LONG);
        assert_eq!(pump.pending(), 3);

        pump.stop();
        assert_eq!(
            handle.sent_text(),
            vec!["release(0,10)", "release(1,20)", "fan(0,50)"]
        );
    }

    #[test]
    fn test_fifo_drops_oldest_when_full() {
        let device = DeviceId::new("dev").unwrap();
        let mut slot = ScentSlot::new(SlotPolicy::Fifo);
        for amount in 0..=MAX_FIFO_DEPTH as u8 {
            slot.put(
                Command::Release {
                    channel: ch(0),
                    amount,
                },
                &device,
            );
        }

        let drained = slot.take_all();
        assert_eq!(drained.len(), MAX_FIFO_DEPTH);
        assert_eq!(
            drained[0],
            Command::Release {
                channel: ch(0),
                amount: 1
            }
        );
        assert_eq!(slot.len(), 0);
    }

    #[test]
    fn test_actuator_command_is_one_shot() {
        let (session, handle) = open_stub();
        let mut pump = CommandPump::start(
            session,
            DeviceId::new("dev").unwrap(),
            &config(2, SlotPolicy::Latest),
        )
        .unwrap();

        pump.set_command(Command::actuator(Actuator::motor(0), 30), Duration::from_millis(2));
        wait_for(&handle, 1);
        thread::sleep(Duration::from_millis(20));
        pump.stop();

        assert_eq!(handle.sent_text(), vec!["motor(0,30)"]);
    }

    #[test]
    fn test_send_failures_are_counted() {
        let (session, handle) = open_stub();
        handle.set_fail_writes(true);

        let mut pump = CommandPump::start(
            session,
            DeviceId::new("dev").unwrap(),
            &config(10_000, SlotPolicy::Latest),
        )
        .unwrap();
        pump.set_scent(Command::stop(ch(2)), LONG);
        pump.stop();

        assert_eq!(pump.stats(), PumpStats { sent: 0, failed: 1 });
        assert!(handle.sent_text().is_empty());
    }

    #[test]
    fn test_clear_scent_keeps_actuator_command() {
        let (session, handle) = open_stub();
        let mut pump = CommandPump::start(
            session,
            DeviceId::new("dev").unwrap(),
            &config(10_000, SlotPolicy::Fifo),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(20));

        pump.set_scent(Command::release_for(ch(0), 1.0), LONG);
        pump.set_scent(Command::release_for(ch(1), 1.0), LONG);
        pump.set_command(Command::actuator(Actuator::fan(0), 10), LONG);
        assert_eq!(pump.clear_scent(), 2);

        pump.stop();
        assert_eq!(handle.sent_text(), vec!["fan(0,10)"]);
    }

    #[test]
    fn test_shorter_wait_takes_effect() {
        let (session, handle) = open_stub();
        let mut pump = CommandPump::start(
            session,
            DeviceId::new("dev").unwrap(),
            &config(10_000, SlotPolicy::Latest),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(pump.interval(), LONG);

        let short = Duration::from_millis(2);
        pump.set_command(Command::actuator(Actuator::fan(0), 40), short);
        assert_eq!(pump.wait(), short);
        wait_for(&handle, 1);
        assert_eq!(handle.sent_text(), vec!["fan(0,40)"]);

        // Same wait again: picked up by the next pass, not by a wake-up
        pump.set_scent(Command::release_for(ch(3), 1.0), short);
        wait_for(&handle, 2);
        assert_eq!(handle.sent_text(), vec!["fan(0,40)", "release(3,10)"]);

        pump.stop();
    }

    #[test]
    fn test_clear_scent_while_session_busy() {
        let (session, handle) = open_stub();
        let mut pump = CommandPump::start(
            Arc::clone(&session),
            DeviceId::new("dev").unwrap(),
            &config(1, SlotPolicy::Latest),
        )
        .unwrap();

        let guard = lock_session(&session);
        pump.set_scent(Command::release_for(ch(0), 1.0), Duration::from_millis(1));
        // The worker is now waiting for the session and has not taken the slot
        thread::sleep(Duration::from_millis(20));
        assert_eq!(pump.clear_scent(), 1);
        drop(guard);

        pump.stop();
        assert!(handle.sent_text().is_empty());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (session, _handle) = open_stub();
        let mut pump = CommandPump::start(
            session,
            DeviceId::new("dev").unwrap(),
            &config(10_000, SlotPolicy::Latest),
        )
        .unwrap();

        assert!(pump.is_running());
        let started = Instant::now();
        pump.stop();
        pump.stop();

        assert!(!pump.is_running());
        // Stop wakes the worker instead of waiting out the interval
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
