//! One open device session.
//!
//! An [`ActiveSession`] owns everything tied to a device while it is
//! connected: the transport, the optional command pump, the cooldown tracker
//! and the scent-name table from the directory. Dropping it discards all of
//! that; nothing outlives the session.

use crate::availability::{AvailabilityTracker, StartDecision};
use olfactory_core::config::Actuator;
use olfactory_core::constants::SPIN_DOWN_SPEED;
use olfactory_core::{ChannelIndex, DeviceEntry, DeviceId, Error, Result};
use olfactory_protocol::Command;
use olfactory_transport::{
    AnySession, CommandPump, DeviceSession, SharedSession, TransportError, lock_session,
};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Convert a transport failure into the facade error for a device.
pub(crate) fn transmit_error(device: &DeviceId, error: TransportError) -> Error {
    match error {
        TransportError::NotConnected => Error::no_active_session(device.as_str()),
        TransportError::Unsupported { operation } => Error::unsupported(operation),
        TransportError::Protocol(inner) => inner,
        other => Error::transmit_failed(device.as_str(), other.to_string()),
    }
}

/// A connected device and its per-session state.
#[derive(Debug)]
pub struct ActiveSession {
    device: DeviceId,
    entry: DeviceEntry,
    transport: SharedSession,
    pump: Option<CommandPump>,
    tracker: AvailabilityTracker,
}

impl ActiveSession {
    /// Wrap an already opened transport.
    pub(crate) fn new(
        device: DeviceId,
        entry: DeviceEntry,
        transport: SharedSession,
        pump: Option<CommandPump>,
        cooldown: Duration,
    ) -> Self {
        Self {
            device,
            entry,
            transport,
            pump,
            tracker: AvailabilityTracker::new(cooldown),
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn entry(&self) -> &DeviceEntry {
        &self.entry
    }

    pub fn is_connected(&self) -> bool {
        lock_session(&self.transport).is_connected()
    }

    pub fn has_pump(&self) -> bool {
        self.pump.is_some()
    }

    pub fn pump(&self) -> Option<&CommandPump> {
        self.pump.as_ref()
    }

    pub fn tracker(&self) -> &AvailabilityTracker {
        &self.tracker
    }

    /// Resolve a channel given as a decimal index or a scent name.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if the text is neither a valid index
    /// nor a name in this device's scent table.
    pub fn resolve_channel(&self, channel_or_name: &str) -> Result<ChannelIndex> {
        if let Ok(channel) = channel_or_name.parse::<ChannelIndex>() {
            return Ok(channel);
        }
        self.entry.channel_for(channel_or_name).ok_or_else(|| {
            Error::invalid_argument(format!(
                "Unknown scent {channel_or_name:?} on device {}",
                self.device
            ))
        })
    }

    /// Send a command now on the caller's thread.
    ///
    /// # Errors
    ///
    /// Returns `Error::TransmitFailed` if the write fails.
    pub fn send_now(&self, command: &Command) -> Result<()> {
        send_now(&self.device, &self.transport, command)
    }

    /// Send a command through the pump if there is one, else immediately.
    ///
    /// Scent commands go to the pump's scent slot and actuator commands to
    /// its actuator slot. A queued command cannot fail here; the pump logs
    /// delivery failures.
    ///
    /// # Errors
    ///
    /// Returns `Error::TransmitFailed` if an immediate write fails.
    pub fn submit(&self, command: Command) -> Result<()> {
        submit(&self.device, &self.transport, self.pump.as_ref(), command)
    }

    /// Start an emission if the channel is idle, sending `command` only then.
    ///
    /// # Errors
    ///
    /// Returns `Error::TransmitFailed` if the command cannot be sent; the
    /// channel's timestamps are left unchanged.
    pub fn start_emission(
        &mut self,
        command: Command,
        duration: Duration,
        now: Instant,
    ) -> Result<StartDecision> {
        let Command::Release { channel, .. } = command else {
            return Err(Error::invalid_argument(format!(
                "Not a scent command: {command}"
            )));
        };

        let Self {
            device,
            transport,
            pump,
            tracker,
            ..
        } = self;
        tracker.try_start(channel, duration, now, || {
            submit(device, transport, pump.as_ref(), command)
        })
    }

    /// Stop every channel and forget their cooldowns.
    ///
    /// Stops are sent directly, after discarding any scent command still
    /// waiting in the pump. A command the pump already took is written
    /// before the pump releases the transport, so it cannot follow the
    /// stops.
    ///
    /// # Errors
    ///
    /// Returns `Error::TransmitFailed` on the first stop that cannot be
    /// sent; cooldowns are kept in that case.
    pub fn stop_all(&mut self) -> Result<()> {
        if let Some(pump) = &self.pump {
            pump.clear_scent();
        }
        for channel in ChannelIndex::all() {
            self.send_now(&Command::stop(channel))?;
        }
        self.tracker.reset();
        Ok(())
    }

    /// Send a packed 32-bit word immediately.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unsupported` if the binding has no binary writes and
    /// `Error::TransmitFailed` if the write fails.
    pub fn send_word(&self, word: u32) -> Result<()> {
        lock_session(&self.transport)
            .send_binary32(word)
            .map_err(|e| transmit_error(&self.device, e))
    }

    /// Stop the pump, spin down actuators, and close the transport.
    ///
    /// Spin-down failures are logged, not returned, so the transport is
    /// always closed.
    pub(crate) fn shutdown(mut self, actuators: &[Actuator]) {
        // Pump before spin-down so no pump delivery lands after it
        if let Some(mut pump) = self.pump.take() {
            pump.stop();
        }

        for actuator in actuators {
            let command = Command::actuator(*actuator, SPIN_DOWN_SPEED);
            if let Err(e) = self.send_now(&command) {
                warn!(device = %self.device, command = %command, error = %e, "Spin-down failed");
            }
        }

        lock_session(&self.transport).close();
    }
}

fn send_now(device: &DeviceId, transport: &SharedSession, command: &Command) -> Result<()> {
    let text = command.to_string();
    let mut transport = lock_session(transport);

    transport
        .send_text(&text)
        .map_err(|e| transmit_error(device, e))?;
    debug!(device = %device, command = %text, "Command sent");

    match transport.receive_text() {
        Ok(response) if !response.is_empty() => {
            trace!(device = %device, response = %response, "Device response");
        }
        Ok(_) => {}
        Err(e) => debug!(device = %device, error = %e, "No response"),
    }
    Ok(())
}

fn submit(
    device: &DeviceId,
    transport: &SharedSession,
    pump: Option<&CommandPump>,
    command: Command,
) -> Result<()> {
    match pump {
        Some(pump) if command.is_scent() => {
            pump.set_scent(command, pump.interval());
            Ok(())
        }
        Some(pump) => {
            pump.set_command(command, pump.interval());
            Ok(())
        }
        None => send_now(device, transport, &command),
    }
}

/// Open a transport for a device.
pub(crate) fn open_transport(
    device: &DeviceId,
    mut transport: AnySession,
    address: &str,
) -> Result<AnySession> {
    transport
        .open(address)
        .map_err(|e| Error::open_failed(device.as_str(), e.to_string()))?;
    Ok(transport)
}
