use std::fmt;
use std::str::FromStr;

use rand::RngCore;

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// A 128-bit connection identifier, rendered as 32 lowercase hex characters
/// in request paths (`/<id>`). Minted once per accepted local TCP
/// connection; opaque to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId([u8; 16]);

impl ConnectionId {
    /// Generates a new identifier from the thread-local RNG. Collisions are
    /// treated as session failure by the caller, not by this type.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parses an identifier out of a request path's segment (the part after
    /// the leading `/`). Returns `None` if the segment isn't exactly 32
    /// lowercase hex characters.
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        segment.parse().ok()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for ConnectionId {
    type Err = ParseConnectionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(ParseConnectionIdError);
        }

        let mut bytes = [0u8; 16];
        let s = s.as_bytes();
        for i in 0..16 {
            let hi = hex_value(s[i * 2]).ok_or(ParseConnectionIdError)?;
            let lo = hex_value(s[i * 2 + 1]).ok_or(ParseConnectionIdError)?;
            bytes[i] = (hi << 4) | lo;
        }

        Ok(Self(bytes))
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        // Only lowercase is accepted: `Display` never emits uppercase, and
        // the server should reject anything it wouldn't itself have sent.
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConnectionIdError;

impl fmt::Display for ParseConnectionIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a 32-character lowercase hex connection id")
    }
}

impl std::error::Error for ParseConnectionIdError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        for _ in 0..100 {
            let id = ConnectionId::generate();
            let rendered = id.to_string();
            assert_eq!(rendered.len(), 32);
            assert!(rendered.bytes().all(|b| HEX_CHARS.contains(&b)));

            let parsed: ConnectionId = rendered.parse().unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!("abcd".parse::<ConnectionId>(), Err(ParseConnectionIdError));
        assert_eq!(
            "0".repeat(33).parse::<ConnectionId>(),
            Err(ParseConnectionIdError)
        );
    }

    #[test]
    fn rejects_uppercase_and_non_hex() {
        assert!("G".repeat(32).parse::<ConnectionId>().is_err());
        assert!("A".repeat(32).parse::<ConnectionId>().is_err());
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
    }
}
