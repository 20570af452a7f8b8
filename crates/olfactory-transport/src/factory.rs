//! Session construction.
//!
//! The registry asks a [`SessionFactory`] for a fresh, unopened session each
//! time a device session starts. Production code uses [`TransportFactory`];
//! tests use [`StubFactory`] to reach the stub handles of the sessions the
//! registry created.

use crate::devices::AnySession;
use crate::stub::StubHandle;
use olfactory_core::{ControllerConfig, DeviceId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Builds unopened sessions for devices.
pub trait SessionFactory: Send + Sync {
    fn create(&self, device: &DeviceId) -> AnySession;
}

/// Builds sessions of the configured transport kind.
#[derive(Debug, Clone)]
pub struct TransportFactory {
    config: ControllerConfig,
}

impl TransportFactory {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }
}

impl SessionFactory for TransportFactory {
    fn create(&self, _device: &DeviceId) -> AnySession {
        AnySession::from_config(&self.config)
    }
}

/// Builds stub sessions and keeps one handle per device.
///
/// Sessions created for the same device share a log, so writes from a
/// session that was ended and started again stay visible.
///
/// ```
/// use olfactory_core::DeviceId;
/// use olfactory_transport::factory::{SessionFactory, StubFactory};
/// use olfactory_transport::traits::DeviceSession;
///
/// let factory = StubFactory::new();
/// let device = DeviceId::new("scent-1").unwrap();
///
/// let mut session = factory.create(&device);
/// session.open("scent-1").unwrap();
/// session.send_text("motor(0,30)").unwrap();
///
/// assert_eq!(factory.handle(&device).sent_text(), vec!["motor(0,30)"]);
/// ```
#[derive(Debug, Default)]
pub struct StubFactory {
    handles: Mutex<HashMap<DeviceId, StubHandle>>,
}

impl StubFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<DeviceId, StubHandle>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Handle for a device, created on first use.
    ///
    /// Taking the handle before the session starts lets a test inject
    /// failures into the open.
    pub fn handle(&self, device: &DeviceId) -> StubHandle {
        self.handles()
            .entry(device.clone())
            .or_insert_with(|| AnySession::stub().1)
            .clone()
    }
}

impl SessionFactory for StubFactory {
    fn create(&self, device: &DeviceId) -> AnySession {
        AnySession::Stub(self.handle(device).session())
    }
}
