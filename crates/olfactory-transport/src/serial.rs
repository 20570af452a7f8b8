//! UART serial binding.
//!
//! Ports are opened 8N1. The baud rate depends on the board behind the port:
//! legacy boards run at 9600, current ones at 115200, and the port name
//! decides which (see [`SerialConfig::baud_rate_for`]).
//!
//! Text commands are written with a trailing newline. Binary words are
//! written one byte per write call, most significant byte first, which is
//! how the firmware's byte-wise receiver expects them.

use crate::error::{Result, TransportError};
use crate::traits::DeviceSession;
use olfactory_core::TransportKind;
use olfactory_core::config::SerialConfig;
use olfactory_core::constants::{SERIAL_LINE_TERMINATOR, SERIAL_READ_BUFFER_SIZE};
use serialport::{DataBits, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use tracing::{debug, info, trace, warn};

/// Session over a serial port.
pub struct SerialSession {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
    port_name: String,
}

impl SerialSession {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: None,
            port_name: String::new(),
        }
    }

    /// Name of the open port, empty when closed.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::NotConnected)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        let written = port
            .write(bytes)
            .map_err(|e| TransportError::write_failed(e.to_string()))?;
        if written != bytes.len() {
            return Err(TransportError::write_failed(format!(
                "Partial write: {written} of {} bytes",
                bytes.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for SerialSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialSession")
            .field("port_name", &self.port_name)
            .field("connected", &self.port.is_some())
            .finish()
    }
}

impl DeviceSession for SerialSession {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn open(&mut self, address: &str) -> Result<()> {
        if self.port.is_some() {
            warn!(port = %self.port_name, "Serial port already open");
            return Ok(());
        }

        let baud_rate = self.config.baud_rate_for(address);
        let port = serialport::new(address, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(self.config.read_timeout(SERIAL_READ_BUFFER_SIZE))
            .open()
            .map_err(|e| TransportError::open_failed(address, e.to_string()))?;

        info!(port = %address, baud_rate, "Serial port opened");
        self.port = Some(port);
        self.port_name = address.to_string();
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!(port = %self.port_name, "Serial port closed");
            self.port_name.clear();
        }
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        let line = format!("{text}{SERIAL_LINE_TERMINATOR}");
        self.write_bytes(line.as_bytes())?;
        self.port_mut()?
            .flush()
            .map_err(|e| TransportError::write_failed(e.to_string()))?;

        debug!(port = %self.port_name, command = text, "Sent");
        Ok(())
    }

    fn send_binary32(&mut self, word: u32) -> Result<()> {
        for byte in word.to_be_bytes() {
            self.write_bytes(&[byte])?;
        }

        debug!(port = %self.port_name, word = format_args!("{word:#010x}"), "Sent word");
        Ok(())
    }

    fn receive_text(&mut self) -> Result<String> {
        let mut buffer = [0u8; SERIAL_READ_BUFFER_SIZE];
        let port = self.port_mut()?;

        let read = match port.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::TimedOut => 0,
            Err(e) => return Err(TransportError::read_failed(e.to_string())),
        };

        let response = String::from_utf8_lossy(&buffer[..read]).trim().to_string();
        trace!(port = %self.port_name, response = %response, "Received");
        Ok(response)
    }
}
