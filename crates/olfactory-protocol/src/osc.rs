//! OSC 1.0 framing for the network transport.
//!
//! The network firmware does not read text lines; it expects each command as
//! an OSC message wrapped in a bundle:
//!
//! ```text
//! "#bundle\0" | timetag (u64, 1 = immediately) | size (i32) | message
//! message = address ("/release\0...") | type tags (",ii\0") | arguments
//! ```
//!
//! Strings are NUL-terminated and padded to a multiple of four bytes;
//! integers are big-endian `i32`.
//!
//! # Examples
//!
//! ```
//! use olfactory_protocol::osc::{OscArg, OscMessage, decode_packet};
//!
//! let message = OscMessage::from_command_text("release(0,10)").unwrap();
//! assert_eq!(message.address, "/release");
//! assert_eq!(message.args, vec![OscArg::Int(0), OscArg::Int(10)]);
//!
//! let packet = message.to_bundle();
//! let decoded = decode_packet(&packet).unwrap();
//! assert_eq!(decoded, vec![message]);
//! ```

use crate::command::split_call;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use olfactory_core::{Error, Result};

/// Bundle marker.
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Time tag meaning "process immediately".
pub const TIMETAG_IMMEDIATE: u64 = 1;

/// Maximum arguments carried by one command message.
pub const MAX_COMMAND_ARGS: usize = 2;

/// An OSC argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OscArg {
    Int(i32),
    Str(String),
}

impl OscArg {
    fn type_tag(&self) -> char {
        match self {
            Self::Int(_) => 'i',
            Self::Str(_) => 's',
        }
    }

    /// Integer if the text parses as one, string otherwise.
    fn from_text(text: &str) -> Self {
        text.parse()
            .map(Self::Int)
            .unwrap_or_else(|_| Self::Str(text.to_string()))
    }
}

/// An OSC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Build a message from a text command such as `release(0,10)`.
    ///
    /// The tag becomes the address (`/release`); each argument is sent as an
    /// integer when it parses as one and as a string otherwise.
    ///
    /// # Errors
    /// Returns `Error::MalformedMessage` if the text is not a call or carries
    /// more than two arguments.
    pub fn from_command_text(text: &str) -> Result<Self> {
        let (tag, args) = split_call(text)?;
        if args.len() > MAX_COMMAND_ARGS {
            return Err(Error::malformed(format!(
                "At most {MAX_COMMAND_ARGS} arguments per command, got {}",
                args.len()
            )));
        }

        Ok(Self {
            address: format!("/{tag}"),
            args: args.into_iter().map(OscArg::from_text).collect(),
        })
    }

    /// Encode as a bare OSC message.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.freeze()
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        put_padded_str(buf, &self.address);

        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        tags.extend(self.args.iter().map(OscArg::type_tag));
        put_padded_str(buf, &tags);

        for arg in &self.args {
            match arg {
                OscArg::Int(value) => buf.put_i32(*value),
                OscArg::Str(value) => put_padded_str(buf, value),
            }
        }
    }

    /// Encode wrapped in a bundle with an immediate time tag.
    #[must_use]
    pub fn to_bundle(&self) -> Bytes {
        let message = self.encode();

        let mut buf = BytesMut::with_capacity(BUNDLE_TAG.len() + 12 + message.len());
        buf.put_slice(BUNDLE_TAG);
        buf.put_u64(TIMETAG_IMMEDIATE);
        buf.put_i32(message.len() as i32);
        buf.put_slice(&message);
        buf.freeze()
    }
}

fn put_padded_str(buf: &mut BytesMut, value: &str) {
    buf.put_slice(value.as_bytes());
    let padding = 4 - (value.len() % 4);
    buf.put_bytes(0, padding);
}

fn get_padded_str(buf: &mut &[u8]) -> Result<String> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::malformed("Unterminated OSC string"))?;

    let value = std::str::from_utf8(&buf[..end])
        .map_err(|_| Error::malformed("OSC string is not UTF-8"))?
        .to_string();

    let padded = (end / 4 + 1) * 4;
    if buf.len() < padded {
        return Err(Error::malformed("Truncated OSC string padding"));
    }
    buf.advance(padded);
    Ok(value)
}

fn get_i32(buf: &mut &[u8]) -> Result<i32> {
    if buf.remaining() < 4 {
        return Err(Error::malformed("Truncated OSC integer"));
    }
    Ok(buf.get_i32())
}

fn decode_message(mut buf: &[u8]) -> Result<OscMessage> {
    let address = get_padded_str(&mut buf)?;
    if !address.starts_with('/') {
        return Err(Error::malformed(format!("Invalid OSC address: {address:?}")));
    }

    let tags = get_padded_str(&mut buf)?;
    let Some(tags) = tags.strip_prefix(',') else {
        return Err(Error::malformed("Missing OSC type tag string"));
    };

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        let arg = match tag {
            'i' => OscArg::Int(get_i32(&mut buf)?),
            's' => OscArg::Str(get_padded_str(&mut buf)?),
            other => {
                return Err(Error::malformed(format!("Unsupported OSC type tag: {other}")));
            }
        };
        args.push(arg);
    }

    Ok(OscMessage { address, args })
}

fn decode_into(buf: &[u8], out: &mut Vec<OscMessage>) -> Result<()> {
    let Some(mut rest) = buf.strip_prefix(BUNDLE_TAG.as_slice()) else {
        out.push(decode_message(buf)?);
        return Ok(());
    };

    if rest.remaining() < 8 {
        return Err(Error::malformed("Truncated OSC time tag"));
    }
    rest.advance(8);

    while rest.has_remaining() {
        let size = get_i32(&mut rest)?;
        let size = usize::try_from(size)
            .map_err(|_| Error::malformed(format!("Negative OSC element size: {size}")))?;
        if rest.remaining() < size {
            return Err(Error::malformed("Truncated OSC bundle element"));
        }
        decode_into(&rest[..size], out)?;
        rest.advance(size);
    }
    Ok(())
}

/// Decode a packet into its messages, flattening nested bundles.
///
/// # Errors
/// Returns `Error::MalformedMessage` if the packet is not valid OSC.
pub fn decode_packet(buf: &[u8]) -> Result<Vec<OscMessage>> {
    let mut messages = Vec::new();
    decode_into(buf, &mut messages)?;
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_message_wire_layout() {
        let message = OscMessage::new("/fan", vec![OscArg::Int(1), OscArg::Int(50)]);
        let bytes = message.encode();

        let expected: &[u8] = &[
            b'/', b'f', b'a', b'n', 0, 0, 0, 0, // address, padded to 8
            b',', b'i', b'i', 0, // type tags
            0, 0, 0, 1, // 1
            0, 0, 0, 50, // 50
        ];
        assert_eq!(bytes.as_ref(), expected);
    }

    #[test]
    fn test_bundle_wire_layout() {
        let message = OscMessage::new("/fan", vec![OscArg::Int(1), OscArg::Int(50)]);
        let bundle = message.to_bundle();

        assert_eq!(&bundle[..8], BUNDLE_TAG);
        assert_eq!(&bundle[8..16], &1u64.to_be_bytes());
        assert_eq!(&bundle[16..20], &20i32.to_be_bytes());
        assert_eq!(&bundle[20..], message.encode().as_ref());
    }

    #[rstest]
    #[case("release(0,10)", "/release", vec![OscArg::Int(0), OscArg::Int(10)])]
    #[case("motor(1, 30)", "/motor", vec![OscArg::Int(1), OscArg::Int(30)])]
    #[case("scent(rose,5)", "/scent", vec![OscArg::Str("rose".into()), OscArg::Int(5)])]
    #[case("ping", "/ping", vec![])]
    fn test_from_command_text(
        #[case] text: &str,
        #[case] address: &str,
        #[case] args: Vec<OscArg>,
    ) {
        let message = OscMessage::from_command_text(text).unwrap();
        assert_eq!(message.address, address);
        assert_eq!(message.args, args);
    }

    #[test]
    fn test_from_command_text_too_many_args() {
        assert!(OscMessage::from_command_text("release(0,10,3)").is_err());
    }

    #[test]
    fn test_string_argument_decodes() {
        let message = OscMessage::new("/scent", vec![OscArg::Str("lemon".into())]);
        let decoded = decode_packet(&message.encode()).unwrap();
        assert_eq!(decoded, vec![message]);
    }

    #[test]
    fn test_nested_bundle_flattens() {
        let inner = OscMessage::new("/release", vec![OscArg::Int(2), OscArg::Int(0)]);
        let inner_bundle = inner.to_bundle();

        let mut outer = BytesMut::new();
        outer.put_slice(BUNDLE_TAG);
        outer.put_u64(TIMETAG_IMMEDIATE);
        outer.put_i32(inner_bundle.len() as i32);
        outer.put_slice(&inner_bundle);

        assert_eq!(decode_packet(&outer).unwrap(), vec![inner]);
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"fan\0".as_slice())]
    #[case(b"/fan\0\0\0\0,i\0\0\0\0".as_slice())]
    #[case(b"/fan\0\0\0\0,f\0\0\0\0\0\0".as_slice())]
    #[case(b"#bundle\0\0\0".as_slice())]
    fn test_decode_malformed(#[case] packet: &[u8]) {
        assert!(matches!(
            decode_packet(packet),
            Err(Error::MalformedMessage(_))
        ));
    }
}
