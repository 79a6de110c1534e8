/// IPv4 address codec: dotted-quad text <-> unsigned 32-bit integer.
///
/// Packing is big-endian: the first octet lands in the most significant byte,
/// so `1.2.3.4` is `0x01020304`.
use std::net::Ipv4Addr;
use thiserror::Error;

/// Input that is not a well-formed dotted-quad IPv4 address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid IPv4 address: {input:?}")]
pub struct InvalidAddress {
    input: String,
}

impl InvalidAddress {
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Parse `a.b.c.d` into its integer form.
///
/// Rejects a wrong octet count, octets above 255, signs, whitespace and
/// any other non-numeric token.
pub fn parse_dotted_quad(s: &str) -> Result<u32, InvalidAddress> {
    s.parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| InvalidAddress { input: s.to_string() })
}

/// Render an integer address as canonical dotted-quad text.
pub fn to_dotted_quad(n: u32) -> String {
    Ipv4Addr::from(n).to_string()
}
