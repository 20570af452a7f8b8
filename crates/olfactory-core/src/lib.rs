//! Shared types for the olfactory device controller.
//!
//! This crate holds what every layer agrees on: the error taxonomy reported
//! through the facade, validated identifiers, timing and wire constants,
//! controller configuration, and the device directory consulted when a
//! session starts.

pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
pub mod types;

pub use config::{ControllerConfig, TransportKind};
pub use directory::{DeviceDirectory, DeviceEntry, NoDirectory, StaticDirectory};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
