//! Core constants for the olfactory device controller.
//!
//! This module centralizes the numeric limits and timing constants shared by
//! the command encoder, the transports, and the availability tracker. Values
//! here reflect the reference firmware; the configuration layer can override
//! the timing and transport values, but not the channel count or the wire
//! scaling.
//!
//! # Usage
//!
//! ```
//! use olfactory_core::constants::*;
//! use std::time::Duration;
//!
//! let cooldown = Duration::from_millis(DEFAULT_COOLDOWN_MS);
//! assert_eq!(cooldown.as_secs(), 6);
//! assert_eq!(CHANNEL_COUNT, 4);
//! ```

// ============================================================================
// Scent Channels
// ============================================================================

/// Number of independently addressable scent channels per device.
pub const CHANNEL_COUNT: usize = 4;

/// Highest valid channel index.
pub const MAX_CHANNEL_INDEX: u8 = (CHANNEL_COUNT - 1) as u8;

// ============================================================================
// Emission Timing
// ============================================================================

/// Cooldown applied after every emission ends, in milliseconds.
///
/// A channel may emit again once `emission_end + cooldown` has passed.
pub const DEFAULT_COOLDOWN_MS: u64 = 6_000;

/// Minimum emission duration accepted by the encoder, in seconds.
pub const MIN_DURATION_SECS: f32 = 0.0;

/// Maximum emission duration accepted by the encoder, in seconds.
///
/// Longer requests are clamped to this value.
pub const MAX_DURATION_SECS: f32 = 10.0;

/// Multiplier converting seconds to the firmware's wire amount.
///
/// The firmware counts tenths of a second, so `1.0` seconds is sent as `10`.
pub const DURATION_WIRE_SCALE: f32 = 10.0;

// ============================================================================
// Orientation
// ============================================================================

/// Minimum accepted yaw in degrees.
pub const MIN_YAW_DEGREES: f32 = -90.0;

/// Maximum accepted yaw in degrees.
pub const MAX_YAW_DEGREES: f32 = 90.0;

/// Pitch is wrapped modulo this value before encoding.
pub const PITCH_WRAP_DEGREES: f32 = 360.0;

// ============================================================================
// Actuators
// ============================================================================

/// Motor/fan speed issued when a session opens.
pub const DEFAULT_WARMUP_SPEED: u8 = 30;

/// Motor/fan speed issued when a session closes.
pub const SPIN_DOWN_SPEED: u8 = 0;

// ============================================================================
// Serial Transport
// ============================================================================

/// Baud rate of legacy boards.
pub const LEGACY_BAUD_RATE: u32 = 9_600;

/// Baud rate of current boards.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Port names that are wired to legacy boards unless configured otherwise.
pub const DEFAULT_LEGACY_PORTS: &[&str] = &["COM4"];

/// Constant part of the serial read timeout, in milliseconds.
pub const SERIAL_READ_TIMEOUT_MS: u64 = 10;

/// Per-byte part of the serial read timeout, in milliseconds.
pub const SERIAL_READ_TIMEOUT_PER_BYTE_MS: u64 = 1;

/// Size of the buffer used for a single serial read.
pub const SERIAL_READ_BUFFER_SIZE: usize = 64;

/// Line terminator appended to text commands on the serial wire.
pub const SERIAL_LINE_TERMINATOR: &str = "\n";

// ============================================================================
// Network Transport
// ============================================================================

/// UDP port the device firmware listens on for OSC packets.
pub const DEFAULT_OSC_PORT: u16 = 7000;

/// Local address the transmit socket binds to.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:0";

// ============================================================================
// Background Pump
// ============================================================================

/// Interval between pump iterations, in milliseconds.
pub const DEFAULT_PUMP_INTERVAL_MS: u64 = 100;

/// Maximum number of queued scent commands in FIFO mode.
///
/// When full, the oldest pending command is dropped.
pub const MAX_FIFO_DEPTH: usize = 32;
