//! Text commands understood by the device firmware.
//!
//! # Wire Format
//!
//! Every command is a function-call shaped ASCII line without spaces:
//!
//! ```text
//! release(<channel>,<amount>)   start (amount > 0) or stop (amount = 0) a channel
//! fan(<id>,<speed>)             set fan speed
//! motor(<id>,<speed>)           set motor speed
//! ```
//!
//! Line termination is added by the transport, not here.
//!
//! # Examples
//!
//! ```
//! use olfactory_protocol::Command;
//! use olfactory_core::ChannelIndex;
//!
//! let channel = ChannelIndex::new(0).unwrap();
//! let start = Command::release_for(channel, 1.0);
//! assert_eq!(start.to_string(), "release(0,10)");
//!
//! let parsed: Command = "release(0,10)".parse().unwrap();
//! assert_eq!(parsed, start);
//! ```

use crate::encoding::encode_duration;
use olfactory_core::config::{Actuator, ActuatorKind};
use olfactory_core::{ChannelIndex, Error, Result};
use std::fmt;

/// Tag of the release command.
pub const TAG_RELEASE: &str = "release";

/// Tag of the fan command.
pub const TAG_FAN: &str = "fan";

/// Tag of the motor command.
pub const TAG_MOTOR: &str = "motor";

/// A high-level device command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Start (`amount > 0`) or stop (`amount == 0`) emission on a channel.
    Release { channel: ChannelIndex, amount: u8 },

    /// Set a fan's speed.
    Fan { id: u8, speed: u8 },

    /// Set a motor's speed.
    Motor { id: u8, speed: u8 },
}

impl Command {
    /// Release command for a duration in seconds.
    ///
    /// The duration is clamped and scaled by [`encode_duration`].
    #[must_use]
    pub fn release_for(channel: ChannelIndex, duration_secs: f32) -> Self {
        Self::Release {
            channel,
            amount: encode_duration(duration_secs),
        }
    }

    /// Command that stops emission on a channel.
    #[must_use]
    pub fn stop(channel: ChannelIndex) -> Self {
        Self::Release { channel, amount: 0 }
    }

    /// Speed command for a configured actuator.
    #[must_use]
    pub fn actuator(actuator: Actuator, speed: u8) -> Self {
        match actuator.kind {
            ActuatorKind::Fan => Self::Fan {
                id: actuator.id,
                speed,
            },
            ActuatorKind::Motor => Self::Motor {
                id: actuator.id,
                speed,
            },
        }
    }

    /// Command tag as it appears on the wire.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Release { .. } => TAG_RELEASE,
            Self::Fan { .. } => TAG_FAN,
            Self::Motor { .. } => TAG_MOTOR,
        }
    }

    /// Whether this command targets the scent slot rather than an actuator.
    #[must_use]
    pub fn is_scent(&self) -> bool {
        matches!(self, Self::Release { .. })
    }

    /// The two integer arguments in wire order.
    #[must_use]
    pub fn args(&self) -> (u8, u8) {
        match *self {
            Self::Release { channel, amount } => (channel.as_u8(), amount),
            Self::Fan { id, speed } | Self::Motor { id, speed } => (id, speed),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (a, b) = self.args();
        write!(f, "{}({},{})", self.tag(), a, b)
    }
}

/// Split a `tag(arg,arg,...)` line into its tag and trimmed arguments.
///
/// A line without parentheses is a bare tag with no arguments.
///
/// # Errors
/// Returns `Error::MalformedMessage` for an empty tag or unbalanced
/// parentheses.
pub fn split_call(line: &str) -> Result<(&str, Vec<&str>)> {
    let line = line.trim();

    let Some(open) = line.find('(') else {
        if line.is_empty() || line.contains(')') {
            return Err(Error::malformed(format!("Invalid command: {line:?}")));
        }
        return Ok((line, Vec::new()));
    };

    let tag = line[..open].trim();
    let rest = &line[open + 1..];
    let Some(inner) = rest.strip_suffix(')') else {
        return Err(Error::malformed(format!("Unterminated command: {line:?}")));
    };

    if tag.is_empty() || inner.contains(['(', ')']) {
        return Err(Error::malformed(format!("Invalid command: {line:?}")));
    }

    let args = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(str::trim).collect()
    };

    Ok((tag, args))
}

fn parse_u8(value: &str, line: &str) -> Result<u8> {
    value
        .parse()
        .map_err(|_| Error::malformed(format!("Invalid argument {value:?} in {line:?}")))
}

impl std::str::FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (tag, args) = split_call(s)?;
        let [a, b] = args.as_slice() else {
            return Err(Error::malformed(format!(
                "Expected 2 arguments in {s:?}, got {}",
                args.len()
            )));
        };

        let first = parse_u8(a, s)?;
        let second = parse_u8(b, s)?;

        match tag {
            TAG_RELEASE => {
                let channel = ChannelIndex::new(first)
                    .map_err(|_| Error::malformed(format!("Invalid channel in {s:?}")))?;
                Ok(Self::Release {
                    channel,
                    amount: second,
                })
            }
            TAG_FAN => Ok(Self::Fan {
                id: first,
                speed: second,
            }),
            TAG_MOTOR => Ok(Self::Motor {
                id: first,
                speed: second,
            }),
            other => Err(Error::malformed(format!("Unknown command tag: {other}"))),
        }
    }
}
