//! Olfactory device control.
//!
//! The facade host applications link against. [`Controller`] opens and
//! closes device sessions, enforces the per-channel emission cooldown,
//! points the emitter, and forwards log output to a registered callback.
//!
//! ```text
//! Controller ──► SessionRegistry ──► ActiveSession ──► AnySession (serial | network | stub)
//!                                      │    │
//!                                      │    └──► CommandPump (optional)
//!                                      └──► AvailabilityTracker
//! ```

pub mod availability;
pub mod clock;
pub mod controller;
pub mod logging;
pub mod registry;
pub mod session;

pub use availability::{AvailabilityTracker, ChannelPhase, StartDecision};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{Controller, ControllerBuilder};
pub use logging::{CallbackLayer, LogCallbackHandle};
pub use registry::SessionRegistry;
pub use session::ActiveSession;
