use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::codec::{decode_frame, CanFrame, MAX_FRAME_LEN};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Extract the next `:`…`;` frame from `src`.
///
/// Returns `None` when `src` holds no complete frame yet. On return, the
/// consumed bytes (the frame and any garbage before it) are gone from `src`.
/// A frame start followed by another `:` before its terminator is dropped
/// silently; a candidate that grows past [`MAX_FRAME_LEN`] without a
/// terminator is dropped and reported as malformed.
pub fn scan_frame(src: &mut BytesMut) -> Option<Result<CanFrame>> {
    loop {
        let start = match src.iter().position(|b| *b == b':') {
            Some(start) => start,
            None => {
                src.clear();
                return None;
            }
        };
        src.advance(start);

        match src[1..].iter().position(|b| *b == b':' || *b == b';') {
            Some(offset) if src[offset + 1] == b';' => {
                let frame = src.split_to(offset + 2);
                return Some(decode_frame(&frame));
            }
            Some(offset) => {
                trace!(dropped = offset + 1, "restarting on new frame start");
                src.advance(offset + 1);
            }
            None if src.len() > MAX_FRAME_LEN => {
                src.advance(1);
                return Some(Err(FrameError::malformed(format!(
                    "frame exceeds {MAX_FRAME_LEN} bytes without terminator"
                ))));
            }
            None => return None,
        }
    }
}

/// Reassembles GridConnect frames from arbitrarily chunked link reads.
pub struct FrameScanner {
    buf: BytesMut,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append bytes received from the link.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete frame, if any. See [`scan_frame`].
    pub fn next_frame(&mut self) -> Option<Result<CanFrame>> {
        scan_frame(&mut self.buf)
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for FrameScanner {
    type Item = Result<CanFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_single_frame() {
        let mut scanner = FrameScanner::new();
        scanner.push(b":X10700001N;");

        let frame = scanner.next_frame().unwrap().unwrap();
        assert_eq!(frame.header(), 0x1070_0001);
        assert!(scanner.next_frame().is_none());
        assert_eq!(scanner.pending(), 0);
    }

    #[test]
    fn scans_multiple_frames_with_separators() {
        let mut scanner = FrameScanner::new();
        scanner.push(b":X10700001N;\r\n:X10701001N010203040506;\n");

        let frames: Vec<CanFrame> = scanner.by_ref().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].data(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn handles_byte_by_byte_delivery() {
        let mut scanner = FrameScanner::new();
        let wire = b":X19490123N;";
        for (idx, byte) in wire.iter().enumerate() {
            scanner.push(&[*byte]);
            let result = scanner.next_frame();
            if idx + 1 < wire.len() {
                assert!(result.is_none());
            } else {
                assert_eq!(result.unwrap().unwrap().header(), 0x1949_0123);
            }
        }
    }

    #[test]
    fn discards_leading_garbage() {
        let mut scanner = FrameScanner::new();
        scanner.push(b"noise;;:X10700001N;");
        assert_eq!(scanner.next_frame().unwrap().unwrap().header(), 0x1070_0001);
    }

    #[test]
    fn restarts_on_new_frame_start() {
        let mut scanner = FrameScanner::new();
        scanner.push(b":X1070:X10700002N;");
        assert_eq!(scanner.next_frame().unwrap().unwrap().header(), 0x1070_0002);
    }

    #[test]
    fn malformed_frame_is_reported_and_scanning_continues() {
        let mut scanner = FrameScanner::new();
        scanner.push(b":Q123;:X10700003N;");

        assert!(matches!(
            scanner.next_frame(),
            Some(Err(FrameError::MalformedFrame(_)))
        ));
        assert_eq!(scanner.next_frame().unwrap().unwrap().header(), 0x1070_0003);
    }

    #[test]
    fn overlong_candidate_is_dropped() {
        let mut scanner = FrameScanner::new();
        scanner.push(b":X");
        scanner.push(&[b'0'; 40]);

        assert!(matches!(
            scanner.next_frame(),
            Some(Err(FrameError::MalformedFrame(_)))
        ));
        assert!(scanner.next_frame().is_none());
        assert_eq!(scanner.pending(), 0);
    }
}
