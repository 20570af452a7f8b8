use crate::{
    Result,
    constants::{CHANNEL_COUNT, MAX_CHANNEL_INDEX},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque device identifier.
///
/// Depending on the transport this is a serial port name (`COM3`), an IP
/// address, or any label understood by the device directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new device ID.
    ///
    /// The identifier is trimmed before validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the identifier is empty.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::invalid_argument("Device ID must not be empty"));
        }
        Ok(DeviceId(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceId::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        DeviceId::new(&value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

/// Index of a scent channel (0-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ChannelIndex(u8);

impl ChannelIndex {
    /// Create a channel index with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the index is greater than 3.
    pub fn new(index: u8) -> Result<Self> {
        if index > MAX_CHANNEL_INDEX {
            return Err(Error::invalid_argument(format!(
                "Channel must be 0-{MAX_CHANNEL_INDEX}, got {index}"
            )));
        }
        Ok(ChannelIndex(index))
    }

    /// Iterate over every channel of a device in index order.
    pub fn all() -> impl Iterator<Item = ChannelIndex> {
        (0..CHANNEL_COUNT as u8).map(ChannelIndex)
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChannelIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ChannelIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let index: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::invalid_argument(format!("Invalid channel: {s}")))?;
        ChannelIndex::new(index)
    }
}

impl TryFrom<u8> for ChannelIndex {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        ChannelIndex::new(value)
    }
}

impl From<ChannelIndex> for u8 {
    fn from(value: ChannelIndex) -> Self {
        value.0
    }
}

/// Severity attached to messages forwarded to a registered log callback.
///
/// The numeric form (`0` = Trace .. `6` = Off) is what a C-style shim passes
/// across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
    Off,
}

impl LogLevel {
    /// Convert from the numeric form.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` for values above 6.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Trace),
            1 => Ok(Self::Debug),
            2 => Ok(Self::Info),
            3 => Ok(Self::Warn),
            4 => Ok(Self::Error),
            5 => Ok(Self::Critical),
            6 => Ok(Self::Off),
            _ => Err(Error::invalid_argument(format!(
                "Log level must be 0-6, got {value}"
            ))),
        }
    }

    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Trace => 0,
            Self::Debug => 1,
            Self::Info => 2,
            Self::Warn => 3,
            Self::Error => 4,
            Self::Critical => 5,
            Self::Off => 6,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Off => "off",
        };
        f.write_str(name)
    }
}
