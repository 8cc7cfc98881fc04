//! CAN header classification.
//!
//! OpenLCB splits the 29-bit header into a priority bit (28), a frame-class
//! bit (27), a 3-bit type/sequence field (26..24), a 12-bit variable field
//! (23..12) and the 12-bit source alias (11..0).

/// Collision-detection probe, sequence 7 (node id bits 47..36).
pub const CID7: u32 = 0x1700_0000;
/// Collision-detection probe, sequence 6 (node id bits 35..24).
pub const CID6: u32 = 0x1600_0000;
/// Collision-detection probe, sequence 5 (node id bits 23..12).
pub const CID5: u32 = 0x1500_0000;
/// Collision-detection probe, sequence 4 (node id bits 11..0).
pub const CID4: u32 = 0x1400_0000;
/// Reserve ID.
pub const RID: u32 = 0x1070_0000;
/// Alias Map Definition.
pub const AMD: u32 = 0x1070_1000;
/// Alias Map Enquiry.
pub const AME: u32 = 0x1070_2000;
/// Alias Map Reset.
pub const AMR: u32 = 0x1070_3000;
/// Base of a standard (global or addressed) MTI frame.
pub const STANDARD_FRAME: u32 = 0x1900_0000;

/// Frame types outside the supported sub-protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedKind {
    /// Datagram frames (types 2..=5).
    Datagram,
    /// Stream data frames (type 7).
    Stream,
    /// Reserved OpenLCB frame types (0 and 6).
    Reserved,
}

/// What a CAN header announces.
///
/// Alias fields are raw 12-bit wire values; they may hold the reserved
/// values a well-behaved node never sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Collision-detection probe for `alias`, carrying a 12-bit node id slice.
    CheckId { sequence: u8, slice: u16, alias: u16 },
    /// Alias reserved.
    ReserveId { alias: u16 },
    /// Alias bound to the node id in the payload.
    AliasMapDefinition { alias: u16 },
    /// Request for alias mappings, optionally filtered by node id.
    AliasMapEnquiry { alias: u16 },
    /// Alias released by the node id in the payload.
    AliasMapReset { alias: u16 },
    /// Global or addressed message carrying an MTI.
    Standard { mti: u16, source: u16 },
    /// Recognised but unsupported frame type.
    Unsupported { kind: UnsupportedKind, source: u16 },
    /// Any other CAN control frame.
    Unknown,
}

impl FrameKind {
    /// Alias-management frames are consumed by the node engine.
    pub fn is_alias_management(&self) -> bool {
        matches!(
            self,
            FrameKind::CheckId { .. }
                | FrameKind::ReserveId { .. }
                | FrameKind::AliasMapDefinition { .. }
                | FrameKind::AliasMapEnquiry { .. }
                | FrameKind::AliasMapReset { .. }
        )
    }

    /// Short human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            FrameKind::CheckId { .. } => "CID",
            FrameKind::ReserveId { .. } => "RID",
            FrameKind::AliasMapDefinition { .. } => "AMD",
            FrameKind::AliasMapEnquiry { .. } => "AME",
            FrameKind::AliasMapReset { .. } => "AMR",
            FrameKind::Standard { .. } => "MTI",
            FrameKind::Unsupported {
                kind: UnsupportedKind::Datagram,
                ..
            } => "DATAGRAM",
            FrameKind::Unsupported {
                kind: UnsupportedKind::Stream,
                ..
            } => "STREAM",
            FrameKind::Unsupported {
                kind: UnsupportedKind::Reserved,
                ..
            } => "RESERVED",
            FrameKind::Unknown => "UNKNOWN",
        }
    }
}

/// Classify a 29-bit header.
pub fn classify(header: u32) -> FrameKind {
    let alias = (header & 0xFFF) as u16;
    let variable = ((header >> 12) & 0xFFF) as u16;
    let nibble = (header >> 24) & 0xF;

    if nibble & 0x8 != 0 {
        return match nibble & 0x7 {
            1 => FrameKind::Standard {
                mti: variable,
                source: alias,
            },
            2..=5 => FrameKind::Unsupported {
                kind: UnsupportedKind::Datagram,
                source: alias,
            },
            7 => FrameKind::Unsupported {
                kind: UnsupportedKind::Stream,
                source: alias,
            },
            _ => FrameKind::Unsupported {
                kind: UnsupportedKind::Reserved,
                source: alias,
            },
        };
    }

    match nibble {
        4..=7 => FrameKind::CheckId {
            sequence: nibble as u8,
            slice: variable,
            alias,
        },
        0 => match variable {
            0x700 => FrameKind::ReserveId { alias },
            0x701 => FrameKind::AliasMapDefinition { alias },
            0x702 => FrameKind::AliasMapEnquiry { alias },
            0x703 => FrameKind::AliasMapReset { alias },
            _ => FrameKind::Unknown,
        },
        _ => FrameKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_check_id_frames() {
        assert_eq!(
            classify(0x1701_0123),
            FrameKind::CheckId {
                sequence: 7,
                slice: 0x010,
                alias: 0x123
            }
        );
        for (base, seq) in [(CID6, 6), (CID5, 5), (CID4, 4)] {
            match classify(base + 0x005) {
                FrameKind::CheckId {
                    sequence, alias, ..
                } => {
                    assert_eq!(sequence, seq);
                    assert_eq!(alias, 0x005);
                }
                other => panic!("expected CID, got {other:?}"),
            }
        }
    }

    #[test]
    fn classifies_alias_management_frames() {
        assert_eq!(classify(RID + 0x0AB), FrameKind::ReserveId { alias: 0x0AB });
        assert_eq!(
            classify(AMD + 0x0AB),
            FrameKind::AliasMapDefinition { alias: 0x0AB }
        );
        assert_eq!(
            classify(AME + 0x0AB),
            FrameKind::AliasMapEnquiry { alias: 0x0AB }
        );
        assert_eq!(
            classify(AMR + 0x0AB),
            FrameKind::AliasMapReset { alias: 0x0AB }
        );
        assert!(classify(AMR + 1).is_alias_management());
    }

    #[test]
    fn classifies_standard_frames() {
        assert_eq!(
            classify(0x1917_0456),
            FrameKind::Standard {
                mti: 0x170,
                source: 0x456
            }
        );
        assert!(!classify(0x1917_0456).is_alias_management());
    }

    #[test]
    fn classifies_datagram_and_stream_as_unsupported() {
        for header in [0x1A12_3456u32, 0x1B12_3456, 0x1C12_3456, 0x1D12_3456] {
            assert!(matches!(
                classify(header),
                FrameKind::Unsupported {
                    kind: UnsupportedKind::Datagram,
                    source: 0x456
                }
            ));
        }
        assert!(matches!(
            classify(0x1F12_3456),
            FrameKind::Unsupported {
                kind: UnsupportedKind::Stream,
                ..
            }
        ));
        assert!(matches!(
            classify(0x1E12_3456),
            FrameKind::Unsupported {
                kind: UnsupportedKind::Reserved,
                ..
            }
        ));
    }

    #[test]
    fn unknown_control_frames() {
        assert_eq!(classify(0x1071_0123), FrameKind::Unknown);
        assert_eq!(classify(0x1212_3456), FrameKind::Unknown);
    }

    #[test]
    fn names() {
        assert_eq!(classify(CID7 + 1).name(), "CID");
        assert_eq!(classify(0x1A00_0001).name(), "DATAGRAM");
        assert_eq!(classify(0x1949_0001).name(), "MTI");
    }
}
