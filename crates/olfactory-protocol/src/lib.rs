//! Command encoder for olfactory devices.
//!
//! Turns high-level intents into what the firmware reads:
//!
//! - [`Command`]: `release`, `fan` and `motor` text commands
//! - [`encode_duration`]: seconds to the firmware's tenth-of-a-second amount
//! - [`Orientation`]: yaw/pitch packed into a 32-bit word
//! - [`osc`]: OSC bundle framing used by the network transport

pub mod command;
pub mod encoding;
pub mod osc;

pub use command::Command;
pub use encoding::{Orientation, clamp_duration, encode_duration};
pub use osc::{OscArg, OscMessage};
