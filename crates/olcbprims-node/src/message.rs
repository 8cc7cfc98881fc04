//! OpenLCB messages over standard CAN frames.
//!
//! Global messages fit one frame. Addressed messages spend the first two data
//! bytes on a segment flag and the destination alias, leaving six payload bytes
//! per frame:
//!
//! ```text
//! byte 0: ffff aaaa   (flag, top 4 bits of destination alias)
//! byte 1: aaaa aaaa   (low 8 bits of destination alias)
//! byte 2..8: payload segment
//! ```

use std::fmt;

use bytes::{Bytes, BytesMut};
use olcbprims_frame::{mti, Alias, CanFrame, EventId, FrameError, FrameKind, NodeId, MAX_DATA_LEN};

use crate::error::{NodeError, Result};

/// Largest payload of a global message.
pub const MAX_GLOBAL_PAYLOAD: usize = MAX_DATA_LEN;

/// Largest payload of an addressed message.
pub const MAX_ADDRESSED_PAYLOAD: usize = 72;

/// Payload bytes carried by one addressed frame.
pub const SEGMENT_LEN: usize = MAX_DATA_LEN - 2;

/// Position of a frame within a multi-frame addressed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Only,
    First,
    Middle,
    Last,
}

impl Segment {
    /// Wire flag. Middle and last share a value.
    pub fn flag(self) -> u8 {
        match self {
            Segment::Only => 0,
            Segment::First => 1,
            Segment::Middle | Segment::Last => 2,
        }
    }

    /// Flag 3 is the middle flag of senders that keep middle and last
    /// apart. Flag 2 decodes as [`Segment::Last`] even from senders that
    /// also use it for middle frames; receive-side reassembly sorts that out.
    pub fn from_flag(flag: u8) -> Self {
        match flag & 0x3 {
            0 => Segment::Only,
            1 => Segment::First,
            2 => Segment::Last,
            _ => Segment::Middle,
        }
    }

    fn continues(self) -> bool {
        matches!(self, Segment::Middle | Segment::Last)
    }
}

/// One standard frame, split into its message fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFrame {
    pub mti: u16,
    pub source: Alias,
    pub dest: Option<Alias>,
    pub segment: Segment,
    pub data: Bytes,
}

/// Decode a standard frame's MTI, aliases and payload segment.
///
/// Alias-management frames and the datagram/stream types are rejected with
/// [`NodeError::UnsupportedFrameType`].
pub fn parse_frame(frame: &CanFrame) -> Result<MessageFrame> {
    let (mti, source) = match frame.kind() {
        FrameKind::Standard { mti, source } => (mti, source),
        other => return Err(NodeError::UnsupportedFrameType(other.name())),
    };
    let source = Alias::new(source)
        .ok_or_else(|| FrameError::MalformedFrame(format!("reserved source alias 0x{source:03X}")))?;

    if !mti::is_addressed(mti) {
        return Ok(MessageFrame {
            mti,
            source,
            dest: None,
            segment: Segment::Only,
            data: Bytes::copy_from_slice(frame.data()),
        });
    }

    let data = frame.data();
    if data.len() < 2 {
        return Err(FrameError::MalformedFrame(format!(
            "addressed mti 0x{mti:03X} without destination bytes"
        ))
        .into());
    }
    let raw = u16::from(data[0] & 0x0F) << 8 | u16::from(data[1]);
    let dest = Alias::new(raw)
        .ok_or_else(|| FrameError::MalformedFrame(format!("reserved destination alias 0x{raw:03X}")))?;

    Ok(MessageFrame {
        mti,
        source,
        dest: Some(dest),
        segment: Segment::from_flag(data[0] >> 4),
        data: Bytes::copy_from_slice(&data[2..]),
    })
}

/// Split an addressed payload into segments of at most [`SEGMENT_LEN`] bytes.
pub fn segment_payload(payload: &[u8]) -> Vec<(Segment, &[u8])> {
    if payload.len() <= SEGMENT_LEN {
        return vec![(Segment::Only, payload)];
    }
    let count = payload.len().div_ceil(SEGMENT_LEN);
    payload
        .chunks(SEGMENT_LEN)
        .enumerate()
        .map(|(idx, chunk)| {
            let segment = match idx {
                0 => Segment::First,
                i if i + 1 == count => Segment::Last,
                _ => Segment::Middle,
            };
            (segment, chunk)
        })
        .collect()
}

/// Encode one message as the frames that carry it.
///
/// `dest` selects addressed framing and must agree with the MTI's address bit.
pub fn encode_message(
    mti: u16,
    source: Alias,
    dest: Option<Alias>,
    payload: &[u8],
) -> Result<Vec<CanFrame>> {
    if mti > mti::MAX_CAN_MTI {
        return Err(NodeError::InvalidMti(mti));
    }
    if mti::is_addressed(mti) != dest.is_some() {
        return Err(NodeError::AddressMismatch {
            mti,
            addressed: mti::is_addressed(mti),
        });
    }
    let header = olcbprims_frame::STANDARD_FRAME | u32::from(mti) << 12 | u32::from(source.get());

    let Some(dest) = dest else {
        if payload.len() > MAX_GLOBAL_PAYLOAD {
            return Err(NodeError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_GLOBAL_PAYLOAD,
            });
        }
        return Ok(vec![CanFrame::new(header, Bytes::copy_from_slice(payload))?]);
    };

    if payload.len() > MAX_ADDRESSED_PAYLOAD {
        return Err(NodeError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_ADDRESSED_PAYLOAD,
        });
    }
    let dest = dest.get();
    segment_payload(payload)
        .into_iter()
        .map(|(segment, chunk)| {
            let mut data = BytesMut::with_capacity(2 + chunk.len());
            data.extend_from_slice(&[segment.flag() << 4 | (dest >> 8) as u8, dest as u8]);
            data.extend_from_slice(chunk);
            Ok(CanFrame::new(header, data.freeze())?)
        })
        .collect()
}

/// A message rebuilt from its complete frame sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub mti: u16,
    pub source: Alias,
    pub dest: Option<Alias>,
    pub payload: Bytes,
}

/// Rebuild one message from every frame that carried it, in order.
pub fn reassemble(frames: &[CanFrame]) -> Result<Reassembled> {
    let parsed = frames
        .iter()
        .map(parse_frame)
        .collect::<Result<Vec<MessageFrame>>>()?;
    let Some((head, rest)) = parsed.split_first() else {
        return Err(NodeError::Reassembly("no frames".to_string()));
    };

    if rest.is_empty() && head.segment != Segment::Only {
        return Err(NodeError::Reassembly(format!(
            "single frame flagged {:?}",
            head.segment
        )));
    }
    if !rest.is_empty() {
        if head.dest.is_none() {
            return Err(NodeError::Reassembly(
                "global messages occupy one frame".to_string(),
            ));
        }
        if head.segment != Segment::First {
            return Err(NodeError::Reassembly(format!(
                "sequence starts with {:?} segment",
                head.segment
            )));
        }
    }

    let mut payload = BytesMut::from(&head.data[..]);
    for frame in rest {
        if frame.mti != head.mti || frame.source != head.source || frame.dest != head.dest {
            return Err(NodeError::Reassembly(
                "frames belong to different messages".to_string(),
            ));
        }
        if !frame.segment.continues() {
            return Err(NodeError::Reassembly(format!(
                "unexpected {:?} segment mid-message",
                frame.segment
            )));
        }
        payload.extend_from_slice(&frame.data);
    }
    if payload.len() > MAX_ADDRESSED_PAYLOAD {
        return Err(NodeError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_ADDRESSED_PAYLOAD,
        });
    }

    Ok(Reassembled {
        mti: head.mti,
        source: head.source,
        dest: head.dest,
        payload: payload.freeze(),
    })
}

/// A message as delivered to and accepted from applications.
///
/// Received messages carry the aliases they travelled under. Their node ids
/// come from the alias registry and are `None` while a sender's alias is
/// still unmapped; the engine asks the bus in the background, so later
/// messages from the same sender resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub mti: u16,
    pub source: Option<NodeId>,
    pub source_alias: Option<Alias>,
    pub dest: Option<NodeId>,
    pub dest_alias: Option<Alias>,
    pub event_id: Option<EventId>,
    pub payload: Option<Bytes>,
}

impl Message {
    pub fn global(mti: u16, source: NodeId, payload: impl Into<Bytes>) -> Self {
        Self::outgoing(mti, source, None, None, Some(payload.into()))
    }

    pub fn addressed(mti: u16, source: NodeId, dest: NodeId, payload: impl Into<Bytes>) -> Self {
        Self::outgoing(mti, source, Some(dest), None, Some(payload.into()))
    }

    pub fn event(mti: u16, source: NodeId, event_id: EventId) -> Self {
        Self::outgoing(mti, source, None, Some(event_id), None)
    }

    fn outgoing(
        mti: u16,
        source: NodeId,
        dest: Option<NodeId>,
        event_id: Option<EventId>,
        payload: Option<Bytes>,
    ) -> Self {
        Self {
            mti,
            source: Some(source),
            source_alias: None,
            dest,
            dest_alias: None,
            event_id,
            payload,
        }
    }

    /// Addressed to one node, whether or not its node id is known.
    pub fn is_addressed(&self) -> bool {
        self.dest.is_some() || self.dest_alias.is_some()
    }

    /// Bytes this message puts on the wire after any destination header.
    pub fn body(&self) -> Bytes {
        match (&self.event_id, &self.payload) {
            (Some(event_id), _) => Bytes::copy_from_slice(event_id.as_bytes()),
            (None, Some(payload)) => payload.clone(),
            (None, None) => Bytes::new(),
        }
    }

    pub(crate) fn received(
        message: Reassembled,
        source: Option<NodeId>,
        dest: Option<NodeId>,
    ) -> Self {
        let event_id = if mti::has_event(message.mti) {
            EventId::from_slice(&message.payload)
        } else {
            None
        };
        Self {
            mti: message.mti,
            source,
            source_alias: Some(message.source),
            dest,
            dest_alias: message.dest,
            payload: if event_id.is_some() { None } else { Some(message.payload) },
            event_id,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:03X}) from ", mti::mti_name(self.mti), self.mti)?;
        match (&self.source, &self.source_alias) {
            (Some(node_id), _) => write!(f, "{node_id}")?,
            (None, Some(alias)) => write!(f, "alias {alias}")?,
            (None, None) => write!(f, "?")?,
        }
        match (&self.dest, &self.dest_alias) {
            (Some(node_id), _) => write!(f, " to {node_id}")?,
            (None, Some(alias)) => write!(f, " to alias {alias}")?,
            (None, None) => {}
        }
        if let Some(event_id) = &self.event_id {
            write!(f, " event {event_id}")?;
        }
        if let Some(payload) = self.payload.as_ref().filter(|p| !p.is_empty()) {
            write!(f, " [")?;
            for (idx, byte) in payload.iter().enumerate() {
                if idx > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{byte:02X}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
