//! Node identifiers, aliases and event identifiers.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Persistent 6-byte identifier naming a device on the bus.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; 6]);

impl NodeId {
    /// Length of a node id in bytes.
    pub const LEN: usize = 6;

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Build a node id from exactly six bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; 6] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Build a node id from the low 48 bits of `value`.
    pub fn from_u64(value: u64) -> Self {
        let be = value.to_be_bytes();
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&be[2..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn to_u64(self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_dotted(f, &self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

impl FromStr for NodeId {
    type Err = FrameError;

    /// Accepts `01.02.03.04.05.06`, `01:02:03:04:05:06` or `010203040506`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = parse_hex_id::<6>(s).ok_or_else(|| {
            FrameError::InvalidId(format!("node id must be 6 hex bytes, got '{s}'"))
        })?;
        Ok(Self(bytes))
    }
}

/// 12-bit transient bus address standing in for a node id.
///
/// The reserved values 0x000 and 0xFFF are not representable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Alias(u16);

impl Alias {
    pub const MIN: Alias = Alias(0x001);
    pub const MAX: Alias = Alias(0xFFE);

    /// Returns `None` for 0x000, 0xFFF and anything wider than 12 bits.
    pub const fn new(value: u16) -> Option<Self> {
        if value >= Self::MIN.0 && value <= Self::MAX.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// Next alias in `[MIN, MAX]`, wrapping from `MAX` back to `MIN`.
    pub fn next_wrapping(self) -> Self {
        if self.0 >= Self::MAX.0 {
            Self::MIN
        } else {
            Self(self.0 + 1)
        }
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X}", self.0)
    }
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alias({self})")
    }
}

impl FromStr for Alias {
    type Err = FrameError;

    /// Accepts hex with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u16::from_str_radix(digits, 16)
            .ok()
            .and_then(Alias::new)
            .ok_or_else(|| FrameError::InvalidId(format!("alias must be hex 001..FFE, got '{s}'")))
    }
}

/// 8-byte producer/consumer event identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId([u8; 8]);

impl EventId {
    pub const LEN: usize = 8;

    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; 8] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_dotted(f, &self.0)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({self})")
    }
}

impl FromStr for EventId {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = parse_hex_id::<8>(s).ok_or_else(|| {
            FrameError::InvalidId(format!("event id must be 8 hex bytes, got '{s}'"))
        })?;
        Ok(Self(bytes))
    }
}

fn write_dotted(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for (idx, byte) in bytes.iter().enumerate() {
        if idx > 0 {
            f.write_str(".")?;
        }
        write!(f, "{byte:02X}")?;
    }
    Ok(())
}

fn parse_hex_id<const N: usize>(s: &str) -> Option<[u8; N]> {
    let s = s.trim();
    let parts: Vec<&str> = if s.contains(['.', ':']) {
        s.split(['.', ':']).collect()
    } else {
        if s.len() != N * 2 || !s.is_ascii() {
            return None;
        }
        (0..N).map(|idx| &s[idx * 2..idx * 2 + 2]).collect()
    };

    if parts.len() != N {
        return None;
    }

    let mut out = [0u8; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        if part.is_empty() || part.len() > 2 {
            return None;
        }
        *slot = u8::from_str_radix(part, 16).ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display_and_parse() {
        let id = NodeId::new([0x01, 0x02, 0x03, 0x04, 0x05, 0xAB]);
        assert_eq!(id.to_string(), "01.02.03.04.05.AB");
        assert_eq!("01.02.03.04.05.ab".parse::<NodeId>().unwrap(), id);
        assert_eq!("0102030405AB".parse::<NodeId>().unwrap(), id);
        assert_eq!("1:2:3:4:5:AB".parse::<NodeId>().unwrap(), id);
    }

    #[test]
    fn node_id_rejects_bad_input() {
        assert!("01.02.03.04.05".parse::<NodeId>().is_err());
        assert!("0102030405".parse::<NodeId>().is_err());
        assert!("01.02.03.04.05.GG".parse::<NodeId>().is_err());
        assert!("01.02.03.04.05.100".parse::<NodeId>().is_err());
    }

    #[test]
    fn node_id_u64_conversion() {
        let id = NodeId::from_u64(0x0102_0304_0506);
        assert_eq!(id.as_bytes(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(id.to_u64(), 0x0102_0304_0506);
    }

    #[test]
    fn alias_range_is_enforced() {
        assert!(Alias::new(0x000).is_none());
        assert!(Alias::new(0xFFF).is_none());
        assert!(Alias::new(0x1000).is_none());
        assert_eq!(Alias::new(0x001), Some(Alias::MIN));
        assert_eq!(Alias::new(0xFFE), Some(Alias::MAX));
    }

    #[test]
    fn alias_wraps_within_valid_range() {
        assert_eq!(Alias::MAX.next_wrapping(), Alias::MIN);
        assert_eq!(Alias::MIN.next_wrapping().get(), 0x002);
    }

    #[test]
    fn alias_parse_and_display() {
        let alias: Alias = "0x5a3".parse().unwrap();
        assert_eq!(alias.get(), 0x5A3);
        assert_eq!(alias.to_string(), "0x5A3");
        assert_eq!("5A3".parse::<Alias>().unwrap(), alias);
        assert!("FFF".parse::<Alias>().is_err());
    }

    #[test]
    fn event_id_display() {
        let event: EventId = "05.01.01.01.22.00.00.01".parse().unwrap();
        assert_eq!(event.as_bytes()[0], 0x05);
        assert_eq!(event.to_string(), "05.01.01.01.22.00.00.01");
    }
}
