//! Transport layer for olfactory devices.
//!
//! Provides the [`DeviceSession`] trait, its serial, network and stub
//! bindings, enum dispatch over them, and the background command pump.
//!
//! # Modules
//!
//! - [`traits`]: the session contract
//! - [`serial`]: UART binding (`serialport`)
//! - [`network`]: OSC over UDP binding
//! - [`stub`]: recording binding for tests
//! - [`devices`]: [`AnySession`] enum dispatch
//! - [`factory`]: session construction for the registry
//! - [`pump`]: background command pump

pub mod devices;
pub mod error;
pub mod factory;
pub mod network;
pub mod pump;
pub mod serial;
pub mod stub;
pub mod traits;

pub use devices::AnySession;
pub use error::{Result, TransportError};
pub use factory::{SessionFactory, StubFactory, TransportFactory};
pub use pump::{CommandPump, PumpStats, SharedSession, lock_session};
pub use stub::{StubHandle, StubSession, WireWrite};
pub use traits::DeviceSession;
