//! OSC over UDP binding.
//!
//! Each text command is parsed into a tag and arguments, framed as an OSC
//! bundle, and sent fire-and-forget to the device's OSC port. No
//! acknowledgement is awaited.
//!
//! The device address may be a full socket address (`10.0.0.7:9000`), a bare
//! IP, or a host name; the last two use the configured port.

use crate::error::{Result, TransportError};
use crate::traits::DeviceSession;
use olfactory_core::TransportKind;
use olfactory_core::config::NetworkConfig;
use olfactory_protocol::osc::{OscArg, OscMessage};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::{debug, info, warn};

/// OSC address used for packed orientation words.
pub const ORIENTATION_ADDRESS: &str = "/orientation";

#[derive(Debug)]
struct Link {
    socket: UdpSocket,
    target: SocketAddr,
}

/// Session that sends OSC bundles over UDP.
#[derive(Debug)]
pub struct NetworkSession {
    config: NetworkConfig,
    allow_binary: bool,
    link: Option<Link>,
}

impl NetworkSession {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            allow_binary: false,
            link: None,
        }
    }

    /// Accept `send_binary32`, forwarding the word as an `/orientation`
    /// message. Without this the binding reports it as unsupported.
    #[must_use]
    pub fn with_binary(mut self, allow: bool) -> Self {
        self.allow_binary = allow;
        self
    }

    /// Resolved target, if open.
    pub fn target(&self) -> Option<SocketAddr> {
        self.link.as_ref().map(|link| link.target)
    }

    fn resolve(&self, address: &str) -> Result<SocketAddr> {
        let address = address.trim();
        if let Ok(addr) = address.parse::<SocketAddr>() {
            return Ok(addr);
        }
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.config.port));
        }

        (address, self.config.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::open_failed(address, e.to_string()))?
            .next()
            .ok_or_else(|| TransportError::open_failed(address, "No address resolved"))
    }

    fn send_message(&mut self, message: &OscMessage) -> Result<()> {
        let link = self.link.as_ref().ok_or(TransportError::NotConnected)?;
        let packet = message.to_bundle();

        let sent = link
            .socket
            .send_to(&packet, link.target)
            .map_err(|e| TransportError::write_failed(e.to_string()))?;
        if sent != packet.len() {
            return Err(TransportError::write_failed(format!(
                "Partial datagram: {sent} of {} bytes",
                packet.len()
            )));
        }

        debug!(target_addr = %link.target, address = %message.address, "OSC sent");
        Ok(())
    }
}

impl DeviceSession for NetworkSession {
    fn kind(&self) -> TransportKind {
        TransportKind::Network
    }

    fn open(&mut self, address: &str) -> Result<()> {
        if let Some(link) = &self.link {
            warn!(target_addr = %link.target, "Network session already open");
            return Ok(());
        }

        let target = self.resolve(address)?;
        // One socket for the whole session rather than one per datagram
        let socket = UdpSocket::bind(self.config.bind_addr.as_str())
            .map_err(|e| TransportError::open_failed(address, e.to_string()))?;

        info!(target_addr = %target, "Network session opened");
        self.link = Some(Link { socket, target });
        Ok(())
    }

    fn close(&mut self) {
        if let Some(link) = self.link.take() {
            info!(target_addr = %link.target, "Network session closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        if self.link.is_none() {
            return Err(TransportError::NotConnected);
        }
        let message = OscMessage::from_command_text(text)?;
        self.send_message(&message)
    }

    fn send_binary32(&mut self, word: u32) -> Result<()> {
        if !self.allow_binary {
            return Err(TransportError::unsupported("send_binary32 over network"));
        }
        let message = OscMessage::new(ORIENTATION_ADDRESS, vec![OscArg::Int(word as i32)]);
        self.send_message(&message)
    }

    fn receive_text(&mut self) -> Result<String> {
        if self.link.is_none() {
            return Err(TransportError::NotConnected);
        }
        Ok(String::new())
    }
}
