use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::kind::{classify, FrameKind};

/// Maximum data bytes carried by one CAN frame.
pub const MAX_DATA_LEN: usize = 8;

/// Largest valid 29-bit extended CAN identifier.
pub const MAX_HEADER: u32 = 0x1FFF_FFFF;

/// Longest GridConnect frame: `:X` + 8 header digits + `N` + 16 data digits + `;`.
pub const MAX_FRAME_LEN: usize = 2 + 8 + 1 + MAX_DATA_LEN * 2 + 1;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// One extended-id CAN frame.
#[derive(Clone, PartialEq, Eq)]
pub struct CanFrame {
    header: u32,
    data: Bytes,
}

impl CanFrame {
    /// Create a frame, validating the header range and data length.
    pub fn new(header: u32, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if header > MAX_HEADER {
            return Err(FrameError::malformed(format!(
                "header 0x{header:08X} exceeds 29 bits"
            )));
        }
        if data.len() > MAX_DATA_LEN {
            return Err(FrameError::DataTooLong {
                size: data.len(),
                max: MAX_DATA_LEN,
            });
        }
        Ok(Self { header, data })
    }

    /// Build a frame whose header and length are known valid by construction.
    pub(crate) fn from_trusted(header: u32, data: &[u8]) -> Self {
        debug_assert!(header <= MAX_HEADER && data.len() <= MAX_DATA_LEN);
        Self {
            header,
            data: Bytes::copy_from_slice(data),
        }
    }

    pub fn header(&self) -> u32 {
        self.header
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The low 12 header bits: the source alias for every OpenLCB frame.
    pub fn alias_field(&self) -> u16 {
        (self.header & 0xFFF) as u16
    }

    /// Classify the header.
    pub fn kind(&self) -> FrameKind {
        classify(self.header)
    }

    /// The GridConnect text of this frame.
    pub fn to_gridconnect(&self) -> String {
        let mut buf = BytesMut::with_capacity(MAX_FRAME_LEN);
        encode_frame(self, &mut buf);
        // Encoded output is pure ASCII.
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_gridconnect())
    }
}

impl fmt::Debug for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanFrame({self})")
    }
}

/// Encode a frame into GridConnect text.
///
/// Wire format:
/// ```text
/// ┌────┬───────────────────┬───┬───────────────────────┬───┐
/// │ :X │ header (8 hex)    │ N │ data (0-16 hex)       │ ; │
/// └────┴───────────────────┴───┴───────────────────────┴───┘
/// ```
pub fn encode_frame(frame: &CanFrame, dst: &mut BytesMut) {
    dst.reserve(MAX_FRAME_LEN);
    dst.put_slice(b":X");
    for shift in (0..8).rev() {
        dst.put_u8(HEX_DIGITS[((frame.header >> (shift * 4)) & 0xF) as usize]);
    }
    dst.put_u8(b'N');
    for byte in frame.data.iter() {
        dst.put_u8(HEX_DIGITS[usize::from(byte >> 4)]);
        dst.put_u8(HEX_DIGITS[usize::from(byte & 0xF)]);
    }
    dst.put_u8(b';');
}

/// Decode one complete GridConnect frame (`:` through `;`).
pub fn decode_frame(src: &[u8]) -> Result<CanFrame> {
    let body = src
        .strip_prefix(b":X")
        .ok_or_else(|| FrameError::malformed("missing ':X' prefix"))?;
    let body = body
        .strip_suffix(b";")
        .ok_or_else(|| FrameError::malformed("missing ';' terminator"))?;
    let split = body
        .iter()
        .position(|b| *b == b'N')
        .ok_or_else(|| FrameError::malformed("missing 'N' separator"))?;
    let (header_digits, data_digits) = (&body[..split], &body[split + 1..]);

    if header_digits.len() != 8 {
        return Err(FrameError::malformed(format!(
            "header must be 8 hex digits, got {}",
            header_digits.len()
        )));
    }
    let header = header_digits.iter().try_fold(0u32, |acc, digit| {
        hex_value(*digit).map(|nibble| (acc << 4) | u32::from(nibble))
    });
    let header = header.ok_or_else(|| FrameError::malformed("invalid hex in header"))?;

    if data_digits.len() % 2 != 0 {
        return Err(FrameError::malformed("odd number of data digits"));
    }
    if data_digits.len() > MAX_DATA_LEN * 2 {
        return Err(FrameError::DataTooLong {
            size: data_digits.len() / 2,
            max: MAX_DATA_LEN,
        });
    }
    let mut data = BytesMut::with_capacity(data_digits.len() / 2);
    for pair in data_digits.chunks_exact(2) {
        let (hi, lo) = match (hex_value(pair[0]), hex_value(pair[1])) {
            (Some(hi), Some(lo)) => (hi, lo),
            _ => return Err(FrameError::malformed("invalid hex in data")),
        };
        data.put_u8((hi << 4) | lo);
    }

    CanFrame::new(header, data.freeze())
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_frame() {
        let frame = CanFrame::new(0x195B_4123, vec![0x05, 0x01, 0x01, 0x01, 0x22, 0x00, 0x00, 0x01])
            .unwrap();
        assert_eq!(frame.to_gridconnect(), ":X195B4123N0501010122000001;");
    }

    #[test]
    fn test_encode_empty_data() {
        let frame = CanFrame::new(0x1070_0ABC, Bytes::new()).unwrap();
        assert_eq!(frame.to_string(), ":X10700ABCN;");
    }

    #[test]
    fn test_decode_roundtrip() {
        let frame = CanFrame::new(0x1917_0123, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf);

        let decoded = decode_frame(&buf).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.alias_field(), 0x123);
    }

    #[test]
    fn test_decode_accepts_lowercase_hex() {
        let frame = decode_frame(b":X19170abcN0a0b;").unwrap();
        assert_eq!(frame.header(), 0x1917_0ABC);
        assert_eq!(frame.data(), &[0x0A, 0x0B]);
    }

    #[test]
    fn test_decode_missing_prefix() {
        let err = decode_frame(b"X19170123N;").unwrap_err();
        assert!(matches!(err, FrameError::MalformedFrame(_)));
        let err = decode_frame(b":S19170123N;").unwrap_err();
        assert!(matches!(err, FrameError::MalformedFrame(_)));
    }

    #[test]
    fn test_decode_missing_separator() {
        let err = decode_frame(b":X19170123;").unwrap_err();
        assert!(matches!(err, FrameError::MalformedFrame(_)));
    }

    #[test]
    fn test_decode_missing_terminator() {
        let err = decode_frame(b":X19170123N01").unwrap_err();
        assert!(matches!(err, FrameError::MalformedFrame(_)));
    }

    #[test]
    fn test_decode_invalid_hex() {
        assert!(matches!(
            decode_frame(b":X1917012GN;"),
            Err(FrameError::MalformedFrame(_))
        ));
        assert!(matches!(
            decode_frame(b":X19170123N0Z;"),
            Err(FrameError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_short_header_and_odd_data() {
        assert!(matches!(
            decode_frame(b":X1917012N;"),
            Err(FrameError::MalformedFrame(_))
        ));
        assert!(matches!(
            decode_frame(b":X19170123N010;"),
            Err(FrameError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_too_much_data() {
        let err = decode_frame(b":X19170123N010203040506070809;").unwrap_err();
        assert!(matches!(err, FrameError::DataTooLong { size: 9, max: 8 }));
    }

    #[test]
    fn test_decode_header_beyond_29_bits() {
        let err = decode_frame(b":X20000000N;").unwrap_err();
        assert!(matches!(err, FrameError::MalformedFrame(_)));
    }

    #[test]
    fn test_new_rejects_long_data() {
        let err = CanFrame::new(0x1917_0123, vec![0u8; 9]).unwrap_err();
        assert!(matches!(err, FrameError::DataTooLong { .. }));
    }

    #[test]
    fn test_max_frame_len() {
        let frame = CanFrame::new(MAX_HEADER, vec![0xFF; MAX_DATA_LEN]).unwrap();
        assert_eq!(frame.to_gridconnect().len(), MAX_FRAME_LEN);
    }
}
