//! Device control facade.
//!
//! [`Controller`] is the single entry point host applications use. It owns
//! the session registry, the clock and the log callback slot, and exposes
//! the device operations with string identifiers so a thin C-style export
//! layer can sit directly on top of it.
//!
//! # Examples
//!
//! ```
//! use olfactory_core::{ControllerConfig, TransportKind};
//! use olfactory_device::Controller;
//!
//! let controller = Controller::new(ControllerConfig::with_transport(TransportKind::Stub));
//!
//! controller.start_session("dev1").unwrap();
//! assert!(controller.is_scent_emission_available("dev1").unwrap());
//!
//! let available = controller.start_scent_emission("dev1", "0", 1.0).unwrap();
//! assert!(!available);
//!
//! controller.stop_scent_emission("dev1").unwrap();
//! controller.end_session("dev1").unwrap();
//! ```
//!
//! # Emission Results
//!
//! `start_scent_emission` returns whether the channel is available *after*
//! the call. A started emission therefore reports `false`, and so does a
//! request rejected because the channel is still cooling down. The soft
//! rejection is not an error; the caller polls availability instead.

use crate::availability::StartDecision;
use crate::clock::{Clock, SystemClock};
use crate::logging::LogCallbackHandle;
use crate::registry::SessionRegistry;
use olfactory_core::{
    ChannelIndex, ControllerConfig, DeviceDirectory, DeviceId, LogLevel, NoDirectory, Result,
};
use olfactory_protocol::{Command, Orientation, clamp_duration};
use olfactory_transport::{SessionFactory, TransportFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Olfactory device controller.
#[derive(Debug)]
pub struct Controller {
    registry: SessionRegistry,
    clock: Arc<dyn Clock>,
    log: LogCallbackHandle,
}

impl Controller {
    /// Controller with the configured transport, no directory, and the
    /// system clock.
    pub fn new(config: ControllerConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: ControllerConfig) -> ControllerBuilder {
        ControllerBuilder::new(config)
    }

    pub fn config(&self) -> &ControllerConfig {
        self.registry.config()
    }

    /// Open a session to a device and warm up its actuators.
    ///
    /// # Errors
    ///
    /// `AlreadyActive`, `OpenFailed`, `TransmitFailed`, or `InvalidArgument`
    /// for an empty identifier.
    pub fn start_session(&self, device_id: &str) -> Result<()> {
        let device = DeviceId::new(device_id)?;
        self.registry.start(&device)
    }

    /// Spin down, stop the pump, and close a device session.
    ///
    /// # Errors
    ///
    /// `NoActiveSession` if the device has no open session.
    pub fn end_session(&self, device_id: &str) -> Result<()> {
        let device = DeviceId::new(device_id)?;
        self.registry.end(&device)
    }

    /// Point the emitter.
    ///
    /// Angles are validated before anything else, so an out-of-range yaw is
    /// rejected without touching the device.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for yaw outside `[-90, 90]`, `NoActiveSession`,
    /// `Unsupported` on bindings without binary writes, or `TransmitFailed`.
    pub fn set_orientation(&self, device_id: &str, yaw: f32, pitch: f32) -> Result<()> {
        let orientation = Orientation::new(yaw, pitch)?;
        let device = DeviceId::new(device_id)?;

        self.registry.with_session(&device, |session| {
            session.send_word(orientation.to_word())?;
            debug!(
                device = %device,
                yaw = orientation.yaw(),
                pitch = orientation.pitch(),
                "Orientation set"
            );
            Ok(())
        })
    }

    /// Start emitting a scent for `duration_secs` seconds.
    ///
    /// `channel_or_name` is a channel index (`"0"`..`"3"`) or a scent name
    /// from the device directory. The duration is clamped into `[0, 10]`; a
    /// duration that encodes to zero sends nothing.
    ///
    /// Returns whether the channel is available after the call.
    ///
    /// # Errors
    ///
    /// `NoActiveSession`, `InvalidArgument` for an unknown channel or name,
    /// or `TransmitFailed`.
    pub fn start_scent_emission(
        &self,
        device_id: &str,
        channel_or_name: &str,
        duration_secs: f32,
    ) -> Result<bool> {
        let device = DeviceId::new(device_id)?;
        let secs = clamp_duration(duration_secs);

        self.registry.with_session(&device, |session| {
            let channel = session.resolve_channel(channel_or_name)?;
            let now = self.clock.now();
            let command = Command::release_for(channel, secs);

            if matches!(command, Command::Release { amount: 0, .. }) {
                debug!(device = %device, channel = %channel, "Zero-length emission ignored");
                return Ok(session.tracker().is_available(channel, now));
            }

            let decision = session.start_emission(command, Duration::from_secs_f32(secs), now)?;
            match decision {
                StartDecision::Started { .. } => {
                    info!(device = %device, channel = %channel, duration_secs = secs, "Emission started");
                }
                StartDecision::CoolingDown { remaining } => {
                    debug!(
                        device = %device,
                        channel = %channel,
                        remaining_ms = remaining.as_millis() as u64,
                        "Channel cooling down"
                    );
                }
            }

            Ok(session.tracker().is_available(channel, now))
        })
    }

    /// Stop every channel of a device and clear their cooldowns.
    ///
    /// # Errors
    ///
    /// `NoActiveSession` or `TransmitFailed`.
    pub fn stop_scent_emission(&self, device_id: &str) -> Result<()> {
        let device = DeviceId::new(device_id)?;
        self.registry.with_session(&device, |session| {
            session.stop_all()?;
            info!(device = %device, "Emission stopped");
            Ok(())
        })
    }

    /// Whether every channel of a device can start an emission now.
    ///
    /// # Errors
    ///
    /// `NoActiveSession`.
    pub fn is_scent_emission_available(&self, device_id: &str) -> Result<bool> {
        let device = DeviceId::new(device_id)?;
        self.registry.with_session(&device, |session| {
            Ok(session.tracker().all_available(self.clock.now()))
        })
    }

    /// Whether one channel, by index or scent name, can start an emission
    /// now.
    ///
    /// # Errors
    ///
    /// `NoActiveSession` or `InvalidArgument` for an unknown channel.
    pub fn is_channel_available(&self, device_id: &str, channel_or_name: &str) -> Result<bool> {
        let device = DeviceId::new(device_id)?;
        self.registry.with_session(&device, |session| {
            let channel = session.resolve_channel(channel_or_name)?;
            Ok(session.tracker().is_available(channel, self.clock.now()))
        })
    }

    /// Channel a scent name resolves to on a device.
    ///
    /// # Errors
    ///
    /// `NoActiveSession` or `InvalidArgument` for an unknown name.
    pub fn channel_for(&self, device_id: &str, channel_or_name: &str) -> Result<ChannelIndex> {
        let device = DeviceId::new(device_id)?;
        self.registry
            .with_session(&device, |session| session.resolve_channel(channel_or_name))
    }

    /// Set a fan's speed. Goes through the pump's actuator slot when the
    /// pump is enabled.
    ///
    /// # Errors
    ///
    /// `NoActiveSession` or `TransmitFailed`.
    pub fn set_fan_speed(&self, device_id: &str, fan_id: u8, speed: u8) -> Result<()> {
        let device = DeviceId::new(device_id)?;
        self.registry.with_session(&device, |session| {
            session.submit(Command::Fan { id: fan_id, speed })
        })
    }

    /// Register the callback receiving log messages, replacing any previous
    /// one.
    pub fn register_log_callback<F>(&self, callback: F)
    where
        F: Fn(&str, LogLevel) + Send + Sync + 'static,
    {
        self.log.register(callback);
    }

    /// Lowest level forwarded to the log callback.
    pub fn set_log_threshold(&self, threshold: LogLevel) {
        self.log.set_threshold(threshold);
    }

    pub fn log_handle(&self) -> &LogCallbackHandle {
        &self.log
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn has_session(&self, device_id: &str) -> bool {
        DeviceId::new(device_id)
            .map(|device| self.registry.contains(&device))
            .unwrap_or(false)
    }

    /// End every open session. Returns how many were ended.
    pub fn shutdown(&self) -> usize {
        let ended = self.registry.end_all();
        if ended > 0 {
            info!(sessions = ended, "Controller shut down");
        }
        ended
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for [`Controller`].
///
/// ```
/// use olfactory_core::ControllerConfig;
/// use olfactory_device::Controller;
/// use olfactory_device::clock::ManualClock;
/// use olfactory_transport::StubFactory;
/// use std::sync::Arc;
///
/// let clock = ManualClock::new();
/// let controller = Controller::builder(ControllerConfig::default())
///     .factory(Arc::new(StubFactory::new()))
///     .clock(Arc::new(clock.clone()))
///     .build();
///
/// assert_eq!(controller.session_count(), 0);
/// ```
pub struct ControllerBuilder {
    config: ControllerConfig,
    factory: Option<Arc<dyn SessionFactory>>,
    directory: Arc<dyn DeviceDirectory>,
    clock: Arc<dyn Clock>,
    log: LogCallbackHandle,
}

impl ControllerBuilder {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            factory: None,
            directory: Arc::new(NoDirectory),
            clock: Arc::new(SystemClock),
            log: LogCallbackHandle::new(),
        }
    }

    /// Session factory; defaults to the configured transport.
    pub fn factory(mut self, factory: Arc<dyn SessionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn DeviceDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a callback slot, typically the one returned by
    /// [`logging::install`](crate::logging::install).
    pub fn log_handle(mut self, handle: LogCallbackHandle) -> Self {
        self.log = handle;
        self
    }

    pub fn build(self) -> Controller {
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(TransportFactory::new(self.config.clone())));

        info!(
            transport = ?self.config.transport,
            cooldown_ms = self.config.cooldown_ms,
            pump = self.config.pump.is_some(),
            "Controller created"
        );

        Controller {
            registry: SessionRegistry::new(self.config, factory, self.directory),
            clock: self.clock,
            log: self.log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olfactory_core::{Error, TransportKind};

    #[test]
    fn test_invalid_device_id() {
        let controller = Controller::new(ControllerConfig::with_transport(TransportKind::Stub));
        assert!(matches!(
            controller.start_session("   "),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(controller.session_count(), 0);
    }

    #[test]
    fn test_operations_need_session() {
        let controller = Controller::new(ControllerConfig::with_transport(TransportKind::Stub));

        assert!(matches!(
            controller.start_scent_emission("dev1", "0", 1.0),
            Err(Error::NoActiveSession { .. })
        ));
        assert!(matches!(
            controller.stop_scent_emission("dev1"),
            Err(Error::NoActiveSession { .. })
        ));
        assert!(matches!(
            controller.is_scent_emission_available("dev1"),
            Err(Error::NoActiveSession { .. })
        ));
        assert!(matches!(
            controller.set_orientation("dev1", 0.0, 0.0),
            Err(Error::NoActiveSession { .. })
        ));
        assert!(!controller.has_session("dev1"));
    }

    #[test]
    fn test_drop_ends_sessions() {
        let factory = Arc::new(olfactory_transport::StubFactory::new());
        let controller = Controller::builder(ControllerConfig::default())
            .factory(factory.clone())
            .build();
        controller.start_session("dev1").unwrap();

        drop(controller);

        let handle = factory.handle(&DeviceId::new("dev1").unwrap());
        assert!(!handle.is_connected());
        assert_eq!(handle.sent_text().last().map(String::as_str), Some("motor(0,0)"));
    }
}
