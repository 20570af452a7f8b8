//! Device directory lookup.
//!
//! The directory maps a caller-facing device identifier to the transport
//! address the session opens and to the scent names loaded in each channel.
//! Devices that are not listed are opened at their identifier with no names.

use crate::{ChannelIndex, DeviceId, Result, error::Error};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Address and scent-name table of one device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Transport address (port name or IP address).
    pub address: String,

    /// Scent loaded in each channel.
    #[serde(default)]
    pub scents: BTreeMap<ChannelIndex, String>,
}

impl DeviceEntry {
    /// Entry whose address is the identifier itself.
    #[must_use]
    pub fn direct(id: &DeviceId) -> Self {
        Self {
            address: id.as_str().to_string(),
            scents: BTreeMap::new(),
        }
    }

    /// Channel holding a scent, matched case-insensitively.
    #[must_use]
    pub fn channel_for(&self, scent: &str) -> Option<ChannelIndex> {
        self.scents
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(scent.trim()))
            .map(|(channel, _)| *channel)
    }

    /// Scent loaded in a channel.
    #[must_use]
    pub fn scent_name(&self, channel: ChannelIndex) -> Option<&str> {
        self.scents.get(&channel).map(String::as_str)
    }
}

/// Source of device entries.
pub trait DeviceDirectory: Send + Sync {
    fn lookup(&self, id: &DeviceId) -> Option<DeviceEntry>;
}

/// Directory that lists nothing; every device is opened at its identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDirectory;

impl DeviceDirectory for NoDirectory {
    fn lookup(&self, _id: &DeviceId) -> Option<DeviceEntry> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    devices: Vec<DirectoryRecord>,
}

#[derive(Debug, Deserialize)]
struct DirectoryRecord {
    id: DeviceId,
    address: String,
    #[serde(default)]
    scents: BTreeMap<ChannelIndex, String>,
}

/// In-memory directory, optionally loaded from JSON.
///
/// ```
/// use olfactory_core::directory::{DeviceDirectory, StaticDirectory};
/// use olfactory_core::{ChannelIndex, DeviceId};
///
/// let json = r#"{ "devices": [
///     { "id": "left", "address": "COM3", "scents": { "0": "rose", "2": "lemon" } }
/// ] }"#;
/// let directory = StaticDirectory::from_json_str(json).unwrap();
///
/// let entry = directory.lookup(&DeviceId::new("left").unwrap()).unwrap();
/// assert_eq!(entry.address, "COM3");
/// assert_eq!(entry.channel_for("lemon"), Some(ChannelIndex::new(2).unwrap()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: HashMap<DeviceId, DeviceEntry>,
}

impl StaticDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, id: DeviceId, entry: DeviceEntry) {
        self.entries.insert(id, entry);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with_entry(mut self, id: DeviceId, entry: DeviceEntry) -> Self {
        self.insert(id, entry);
        self
    }

    /// Parse a directory from JSON.
    ///
    /// # Errors
    /// Returns `Error::Config` if the JSON is malformed, a channel key is not
    /// 0-3, or an identifier is listed twice.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: DirectoryFile =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;

        let mut directory = Self::new();
        for record in file.devices {
            if directory.entries.contains_key(&record.id) {
                return Err(Error::Config(format!(
                    "Device listed twice in directory: {}",
                    record.id
                )));
            }
            let entry = DeviceEntry {
                address: record.address,
                scents: record.scents,
            };
            directory.insert(record.id, entry);
        }
        Ok(directory)
    }

    /// Load a directory from a JSON file.
    ///
    /// # Errors
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DeviceDirectory for StaticDirectory {
    fn lookup(&self, id: &DeviceId) -> Option<DeviceEntry> {
        self.entries.get(id).cloned()
    }
}
