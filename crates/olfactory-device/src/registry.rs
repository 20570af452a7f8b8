//! Session registry.
//!
//! Maps device identifiers to their [`ActiveSession`]. A single mutex guards
//! the map and is held for the whole of each operation, so concurrent
//! start/end/lookup calls on the facade are serialized. Sessions for
//! different devices share nothing else.

use crate::session::{ActiveSession, open_transport};
use olfactory_core::{ControllerConfig, DeviceDirectory, DeviceEntry, DeviceId, Error, Result};
use olfactory_protocol::Command;
use olfactory_transport::{
    CommandPump, DeviceSession, SessionFactory, SharedSession, lock_session,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

pub struct SessionRegistry {
    sessions: Mutex<HashMap<DeviceId, ActiveSession>>,
    factory: Arc<dyn SessionFactory>,
    directory: Arc<dyn DeviceDirectory>,
    config: ControllerConfig,
}

impl SessionRegistry {
    pub fn new(
        config: ControllerConfig,
        factory: Arc<dyn SessionFactory>,
        directory: Arc<dyn DeviceDirectory>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            factory,
            directory,
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<DeviceId, ActiveSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a session and warm up its actuators.
    ///
    /// The entry is only inserted once the transport is open and warm-up
    /// succeeded; on any failure the registry is left as it was.
    ///
    /// # Errors
    ///
    /// - `Error::AlreadyActive` if a connected session exists for `device`
    /// - `Error::UnknownDevice` if the directory is required and has no
    ///   entry for `device`
    /// - `Error::OpenFailed` if the transport cannot be opened
    /// - `Error::TransmitFailed` if a warm-up command cannot be sent
    pub fn start(&self, device: &DeviceId) -> Result<()> {
        let mut sessions = self.sessions();

        if let Some(existing) = sessions.get(device) {
            if existing.is_connected() {
                return Err(Error::already_active(device.as_str()));
            }
            warn!(device = %device, "Replacing disconnected session");
            if let Some(stale) = sessions.remove(device) {
                stale.shutdown(&[]);
            }
        }

        let entry = match self.directory.lookup(device) {
            Some(entry) => entry,
            None if self.config.require_directory => {
                return Err(Error::unknown_device(device.as_str()));
            }
            None => DeviceEntry::direct(device),
        };

        let transport = open_transport(device, self.factory.create(device), &entry.address)?;
        let transport: SharedSession = Arc::new(Mutex::new(transport));

        let pump = match &self.config.pump {
            Some(pump_config) => {
                match CommandPump::start(Arc::clone(&transport), device.clone(), pump_config) {
                    Ok(pump) => Some(pump),
                    Err(e) => {
                        lock_session(&transport).close();
                        return Err(Error::open_failed(device.as_str(), e.to_string()));
                    }
                }
            }
            None => None,
        };

        let address = entry.address.clone();
        let session = ActiveSession::new(
            device.clone(),
            entry,
            transport,
            pump,
            self.config.cooldown(),
        );

        // Warm-up goes out directly so every actuator is reached even when
        // the pump's actuator slot would keep only the last one
        for actuator in &self.config.actuators {
            let command = Command::actuator(*actuator, self.config.warmup_speed);
            if let Err(e) = session.send_now(&command) {
                warn!(device = %device, command = %command, error = %e, "Warm-up failed");
                session.shutdown(&[]);
                return Err(e);
            }
        }

        info!(
            device = %device,
            address = %address,
            transport = ?self.config.transport,
            pump = session.has_pump(),
            "Session started"
        );
        sessions.insert(device.clone(), session);
        Ok(())
    }

    /// Spin down, stop the pump, close, and remove a session.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveSession` if there is no connected session for
    /// `device`; the registry is not modified.
    pub fn end(&self, device: &DeviceId) -> Result<()> {
        let mut sessions = self.sessions();

        match sessions.get(device) {
            Some(session) if session.is_connected() => {}
            _ => return Err(Error::no_active_session(device.as_str())),
        }

        if let Some(session) = sessions.remove(device) {
            session.shutdown(&self.config.actuators);
        }
        info!(device = %device, "Session ended");
        Ok(())
    }

    /// Run `f` on a connected session while holding the registry lock.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveSession` if there is no connected session for
    /// `device`, or whatever `f` returns.
    pub fn with_session<T, F>(&self, device: &DeviceId, f: F) -> Result<T>
    where
        F: FnOnce(&mut ActiveSession) -> Result<T>,
    {
        let mut sessions = self.sessions();
        match sessions.get_mut(device) {
            Some(session) if session.is_connected() => f(session),
            _ => Err(Error::no_active_session(device.as_str())),
        }
    }

    pub fn contains(&self, device: &DeviceId) -> bool {
        self.sessions().contains_key(device)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// End every session. Returns how many were ended.
    pub fn end_all(&self) -> usize {
        let drained: Vec<ActiveSession> = self.sessions().drain().map(|(_, s)| s).collect();
        let count = drained.len();

        for session in drained {
            let device = session.device().clone();
            session.shutdown(&self.config.actuators);
            info!(device = %device, "Session ended at shutdown");
        }
        count
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("transport", &self.config.transport)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olfactory_core::{NoDirectory, StaticDirectory, TransportKind};
    use olfactory_transport::StubFactory;

    fn registry() -> (SessionRegistry, Arc<StubFactory>) {
        let factory = Arc::new(StubFactory::new());
        let registry = SessionRegistry::new(
            ControllerConfig::with_transport(TransportKind::Stub),
            factory.clone(),
            Arc::new(NoDirectory),
        );
        (registry, factory)
    }

    fn id(name: &str) -> DeviceId {
        DeviceId::new(name).unwrap()
    }

    #[test]
    fn test_start_warms_up_actuators() {
        let (registry, factory) = registry();
        registry.start(&id("dev1")).unwrap();

        let handle = factory.handle(&id("dev1"));
        assert_eq!(handle.sent_text(), vec!["motor(0,30)"]);
        assert_eq!(handle.address().as_deref(), Some("dev1"));
        assert!(registry.contains(&id("dev1")));
    }

    #[test]
    fn test_start_twice_is_already_active() {
        let (registry, factory) = registry();
        registry.start(&id("dev1")).unwrap();

        let result = registry.start(&id("dev1"));
        assert!(matches!(result, Err(Error::AlreadyActive { .. })));
        assert!(factory.handle(&id("dev1")).is_connected());
        assert_eq!(factory.handle(&id("dev1")).open_count(), 1);
    }

    #[test]
    fn test_open_failure_rolls_back() {
        let (registry, factory) = registry();
        factory.handle(&id("dev1")).set_fail_open(true);

        let result = registry.start(&id("dev1"));
        assert!(matches!(result, Err(Error::OpenFailed { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_warmup_failure_rolls_back() {
        let (registry, factory) = registry();
        factory.handle(&id("dev1")).set_fail_writes(true);

        let result = registry.start(&id("dev1"));
        assert!(matches!(result, Err(Error::TransmitFailed { .. })));
        assert!(registry.is_empty());
        assert!(!factory.handle(&id("dev1")).is_connected());
    }

    #[test]
    fn test_end_spins_down_and_removes() {
        let (registry, factory) = registry();
        registry.start(&id("dev1")).unwrap();
        registry.end(&id("dev1")).unwrap();

        let handle = factory.handle(&id("dev1"));
        assert_eq!(handle.sent_text(), vec!["motor(0,30)", "motor(0,0)"]);
        assert!(!handle.is_connected());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_end_without_session() {
        let (registry, _factory) = registry();

        let result = registry.end(&id("ghost"));
        assert!(matches!(result, Err(Error::NoActiveSession { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_directory_address_is_used() {
        let factory = Arc::new(StubFactory::new());
        let directory = StaticDirectory::new().with_entry(
            id("left"),
            DeviceEntry {
                address: "COM7".into(),
                scents: Default::default(),
            },
        );
        let registry = SessionRegistry::new(
            ControllerConfig::with_transport(TransportKind::Stub),
            factory.clone(),
            Arc::new(directory),
        );

        registry.start(&id("left")).unwrap();
        assert_eq!(factory.handle(&id("left")).address().as_deref(), Some("COM7"));
    }

    #[test]
    fn test_required_directory_rejects_unlisted_device() {
        let factory = Arc::new(StubFactory::new());
        let mut config = ControllerConfig::with_transport(TransportKind::Stub);
        config.require_directory = true;
        let directory =
            StaticDirectory::new().with_entry(id("left"), DeviceEntry::direct(&id("left")));
        let registry = SessionRegistry::new(config, factory.clone(), Arc::new(directory));

        let result = registry.start(&id("right"));
        assert!(matches!(result, Err(Error::UnknownDevice(_))));
        assert!(registry.is_empty());
        assert_eq!(factory.handle(&id("right")).open_count(), 0);

        registry.start(&id("left")).unwrap();
        assert!(registry.contains(&id("left")));
    }

    #[test]
    fn test_end_all() {
        let (registry, factory) = registry();
        registry.start(&id("a")).unwrap();
        registry.start(&id("b")).unwrap();

        assert_eq!(registry.end_all(), 2);
        assert!(registry.is_empty());
        assert!(!factory.handle(&id("a")).is_connected());
        assert!(!factory.handle(&id("b")).is_connected());
    }
}
