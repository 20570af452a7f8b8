//! Controller configuration.
//!
//! Configuration is plain serde data loaded from JSON. Every field has a
//! default, so an empty object (`{}`) is a complete configuration that talks
//! to serial devices synchronously.
//!
//! ```
//! use olfactory_core::config::{ControllerConfig, TransportKind};
//!
//! let config = ControllerConfig::from_json_str(r#"{ "transport": "stub" }"#).unwrap();
//! assert_eq!(config.transport, TransportKind::Stub);
//! assert_eq!(config.cooldown_ms, 6000);
//! assert!(config.pump.is_none());
//! ```

use crate::{Result, constants::*, error::Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which transport binding sessions are built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// UART serial port.
    #[default]
    Serial,

    /// OSC over UDP.
    Network,

    /// In-process stub without I/O.
    Stub,
}

/// Serial transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port names wired to legacy boards.
    pub legacy_ports: Vec<String>,

    /// Baud rate used for legacy ports.
    pub legacy_baud: u32,

    /// Baud rate used for every other port.
    pub default_baud: u32,

    /// Constant part of the read timeout.
    pub read_timeout_ms: u64,

    /// Per-byte part of the read timeout.
    pub read_timeout_per_byte_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            legacy_ports: DEFAULT_LEGACY_PORTS.iter().map(|p| p.to_string()).collect(),
            legacy_baud: LEGACY_BAUD_RATE,
            default_baud: DEFAULT_BAUD_RATE,
            read_timeout_ms: SERIAL_READ_TIMEOUT_MS,
            read_timeout_per_byte_ms: SERIAL_READ_TIMEOUT_PER_BYTE_MS,
        }
    }
}

impl SerialConfig {
    /// Baud rate for a port, selected by matching the port name.
    ///
    /// ```
    /// use olfactory_core::config::SerialConfig;
    ///
    /// let serial = SerialConfig::default();
    /// assert_eq!(serial.baud_rate_for("COM4"), 9600);
    /// assert_eq!(serial.baud_rate_for("com4"), 9600);
    /// assert_eq!(serial.baud_rate_for("COM3"), 115200);
    /// ```
    #[must_use]
    pub fn baud_rate_for(&self, port: &str) -> u32 {
        if self
            .legacy_ports
            .iter()
            .any(|legacy| legacy.eq_ignore_ascii_case(port))
        {
            self.legacy_baud
        } else {
            self.default_baud
        }
    }

    /// Read timeout for a read of `len` bytes.
    #[must_use]
    pub fn read_timeout(&self, len: usize) -> Duration {
        let per_byte = self
            .read_timeout_per_byte_ms
            .saturating_mul(u64::try_from(len).unwrap_or(u64::MAX));
        Duration::from_millis(self.read_timeout_ms.saturating_add(per_byte))
    }
}

/// Network (OSC/UDP) transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Destination UDP port on the device.
    pub port: u16,

    /// Local bind address of the transmit socket.
    pub bind_addr: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_OSC_PORT,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

/// How the pump's scent slot treats a command set before the previous one
/// was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// Single slot; a new command replaces the pending one.
    #[default]
    Latest,

    /// Bounded queue; commands are sent in order.
    Fifo,
}

/// Background command pump settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Sleep between pump iterations.
    pub interval_ms: u64,

    /// Scent slot policy.
    pub scent_slot: SlotPolicy,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_PUMP_INTERVAL_MS,
            scent_slot: SlotPolicy::Latest,
        }
    }
}

impl PumpConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Auxiliary actuator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    Fan,
    Motor,
}

/// An actuator spun up at session start and down at session end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actuator {
    pub kind: ActuatorKind,
    pub id: u8,
}

impl Actuator {
    #[must_use]
    pub fn motor(id: u8) -> Self {
        Self {
            kind: ActuatorKind::Motor,
            id,
        }
    }

    #[must_use]
    pub fn fan(id: u8) -> Self {
        Self {
            kind: ActuatorKind::Fan,
            id,
        }
    }
}

/// Top-level controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub transport: TransportKind,

    /// Cooldown after each emission ends.
    pub cooldown_ms: u64,

    pub serial: SerialConfig,

    pub network: NetworkConfig,

    /// Background pump; `None` sends commands on the caller's thread.
    pub pump: Option<PumpConfig>,

    pub actuators: Vec<Actuator>,

    pub warmup_speed: u8,

    /// Whether the network binding accepts orientation commands.
    pub orientation_over_network: bool,

    /// Refuse to start sessions for devices missing from the directory.
    pub require_directory: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Serial,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            serial: SerialConfig::default(),
            network: NetworkConfig::default(),
            pump: None,
            actuators: vec![Actuator::motor(0)],
            warmup_speed: DEFAULT_WARMUP_SPEED,
            orientation_over_network: false,
            require_directory: false,
        }
    }
}

impl ControllerConfig {
    /// Default configuration with a given transport.
    #[must_use]
    pub fn with_transport(transport: TransportKind) -> Self {
        Self {
            transport,
            ..Self::default()
        }
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    /// Returns `Error::Config` if the JSON is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a JSON file.
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
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.transport, TransportKind::Serial);
        assert_eq!(config.cooldown(), Duration::from_secs(6));
        assert_eq!(config.network.port, 7000);
        assert_eq!(config.actuators, vec![Actuator::motor(0)]);
        assert_eq!(config.warmup_speed, 30);
        assert!(!config.orientation_over_network);
    }

    #[test]
    fn test_empty_object_is_default() {
        let config = ControllerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_full_config() {
        let json = r#"{
            "transport": "network",
            "cooldown_ms": 2500,
            "network": { "port": 9000 },
            "pump": { "interval_ms": 5, "scent_slot": "fifo" },
            "actuators": [ { "kind": "fan", "id": 1 }, { "kind": "motor", "id": 2 } ],
            "warmup_speed": 50
        }"#;

        let config = ControllerConfig::from_json_str(json).unwrap();
        assert_eq!(config.transport, TransportKind::Network);
        assert_eq!(config.cooldown_ms, 2500);
        assert_eq!(config.network.port, 9000);
        assert_eq!(config.network.bind_addr, DEFAULT_BIND_ADDR);

        let pump = config.pump.unwrap();
        assert_eq!(pump.interval(), Duration::from_millis(5));
        assert_eq!(pump.scent_slot, SlotPolicy::Fifo);

        assert_eq!(config.actuators, vec![Actuator::fan(1), Actuator::motor(2)]);
        assert_eq!(config.warmup_speed, 50);
    }

    #[test]
    fn test_malformed_config() {
        let result = ControllerConfig::from_json_str(r#"{ "transport": "carrier-pigeon" }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "transport": "stub", "cooldown_ms": 100 }}"#).unwrap();

        let config = ControllerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.transport, TransportKind::Stub);
        assert_eq!(config.cooldown(), Duration::from_millis(100));
    }

    #[test]
    fn test_config_missing_file() {
        let result = ControllerConfig::from_json_file("/nonexistent/olfactory.json");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_serial_timeouts() {
        let serial = SerialConfig::default();
        assert_eq!(serial.read_timeout(0), Duration::from_millis(10));
        assert_eq!(serial.read_timeout(20), Duration::from_millis(30));
    }

    #[test]
    fn test_serial_timeout_saturates() {
        let serial = SerialConfig {
            read_timeout_ms: u64::MAX - 1,
            read_timeout_per_byte_ms: u64::MAX / 2,
            ..SerialConfig::default()
        };
        assert_eq!(serial.read_timeout(64), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_require_directory_flag() {
        assert!(!ControllerConfig::default().require_directory);

        let config = ControllerConfig::from_json_str(r#"{ "require_directory": true }"#).unwrap();
        assert!(config.require_directory);
    }
}
