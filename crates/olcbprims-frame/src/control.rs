//! Alias-management frame builders.

use crate::codec::CanFrame;
use crate::ids::{Alias, NodeId};
use crate::kind::{AME, AMD, AMR, CID4, CID5, CID6, CID7, RID};

/// The four collision-detection probes for `alias`, in transmission order.
///
/// Each probe carries one 12-bit slice of the node id: CID7 the top twelve
/// bits through CID4 the bottom twelve.
pub fn check_id_frames(node_id: &NodeId, alias: Alias) -> [CanFrame; 4] {
    let id = node_id.to_u64();
    let slice = |shift: u32| (((id >> shift) & 0xFFF) as u32) << 12;
    let alias = u32::from(alias.get());
    [
        CanFrame::from_trusted(CID7 | slice(36) | alias, &[]),
        CanFrame::from_trusted(CID6 | slice(24) | alias, &[]),
        CanFrame::from_trusted(CID5 | slice(12) | alias, &[]),
        CanFrame::from_trusted(CID4 | slice(0) | alias, &[]),
    ]
}

/// Reserve ID for `alias`.
pub fn reserve_id(alias: Alias) -> CanFrame {
    CanFrame::from_trusted(RID | u32::from(alias.get()), &[])
}

/// Alias Map Definition: `alias` now stands for `node_id`.
pub fn alias_map_definition(alias: Alias, node_id: &NodeId) -> CanFrame {
    CanFrame::from_trusted(AMD | u32::from(alias.get()), node_id.as_bytes())
}

/// Alias Map Enquiry from `alias`; `None` asks every node to answer.
pub fn alias_map_enquiry(alias: Alias, filter: Option<&NodeId>) -> CanFrame {
    let data: &[u8] = match filter {
        Some(node_id) => node_id.as_bytes(),
        None => &[],
    };
    CanFrame::from_trusted(AME | u32::from(alias.get()), data)
}

/// Alias Map Reset: `node_id` releases `alias`.
pub fn alias_map_reset(alias: Alias, node_id: &NodeId) -> CanFrame {
    CanFrame::from_trusted(AMR | u32::from(alias.get()), node_id.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::FrameKind;

    const NODE: NodeId = NodeId::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

    fn alias(value: u16) -> Alias {
        Alias::new(value).unwrap()
    }

    #[test]
    fn check_id_frames_slice_node_id() {
        let frames = check_id_frames(&NODE, alias(0x123));
        let text: Vec<String> = frames.iter().map(|f| f.to_gridconnect()).collect();
        assert_eq!(
            text,
            vec![
                ":X17010123N;",
                ":X16203123N;",
                ":X15040123N;",
                ":X14506123N;",
            ]
        );
        for frame in &frames {
            assert!(matches!(frame.kind(), FrameKind::CheckId { alias: 0x123, .. }));
        }
    }

    #[test]
    fn reserve_and_definition_frames() {
        assert_eq!(reserve_id(alias(0x0AB)).to_gridconnect(), ":X107000ABN;");
        assert_eq!(
            alias_map_definition(alias(0x0AB), &NODE).to_gridconnect(),
            ":X107010ABN010203040506;"
        );
    }

    #[test]
    fn enquiry_with_and_without_filter() {
        assert_eq!(
            alias_map_enquiry(alias(0x001), None).to_gridconnect(),
            ":X10702001N;"
        );
        assert_eq!(
            alias_map_enquiry(alias(0x001), Some(&NODE)).to_gridconnect(),
            ":X10702001N010203040506;"
        );
    }

    #[test]
    fn reset_frame() {
        let frame = alias_map_reset(alias(0x005), &NODE);
        assert_eq!(frame.header(), 0x1070_3005);
        assert_eq!(frame.data(), NODE.as_bytes());
    }
}
