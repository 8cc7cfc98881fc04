use olcbprims_frame::{Alias, NodeId, UnsupportedKind};
use tracing::{debug, info, warn};

/// Notable things the engine observed or did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// Probes for `alias` went out.
    AliasProbing { alias: Alias },
    /// Another node was seen using the candidate.
    AliasInUse { alias: Alias },
    /// This node now owns `alias`.
    AliasClaimed { alias: Alias, node_id: NodeId },
    /// Another node challenged our alias; it was released with a reset.
    AliasConflict { alias: Alias },
    /// A remote mapping was learned from the bus.
    MappingLearned { alias: Alias, node_id: NodeId },
    /// A remote mapping was released.
    MappingReleased { alias: Alias },
    /// A frame could not be decoded and was skipped.
    MalformedFrame { reason: String },
    /// A datagram, stream or reserved frame was skipped.
    UnsupportedFrame { kind: UnsupportedKind, source: u16 },
    /// The inbound buffer was full; the oldest frame was dropped.
    InboundOverflow,
    /// The link failed; the engine stops processing traffic.
    LinkFailed { reason: String },
}

/// Receives [`NodeEvent`]s from the engine threads.
///
/// Called inline on the receive or send loop, so implementations must not
/// block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &NodeEvent);
}

impl<F> EventSink for F
where
    F: Fn(&NodeEvent) + Send + Sync,
{
    fn emit(&self, event: &NodeEvent) {
        self(event)
    }
}

/// Default sink: forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn emit(&self, event: &NodeEvent) {
        match event {
            NodeEvent::AliasProbing { alias } => debug!(%alias, "probing alias"),
            NodeEvent::AliasInUse { alias } => debug!(%alias, "candidate alias in use"),
            NodeEvent::AliasClaimed { alias, node_id } => {
                info!(%alias, %node_id, "alias claimed")
            }
            NodeEvent::AliasConflict { alias } => {
                warn!(%alias, "alias challenged, sent reset")
            }
            NodeEvent::MappingLearned { alias, node_id } => {
                debug!(%alias, %node_id, "alias mapping learned")
            }
            NodeEvent::MappingReleased { alias } => debug!(%alias, "alias mapping released"),
            NodeEvent::MalformedFrame { reason } => warn!(%reason, "skipping malformed frame"),
            NodeEvent::UnsupportedFrame { kind, source } => {
                debug!(?kind, source = format_args!("0x{source:03X}"), "skipping unsupported frame")
            }
            NodeEvent::InboundOverflow => warn!("inbound buffer full, dropped oldest frame"),
            NodeEvent::LinkFailed { reason } => warn!(%reason, "link failed"),
        }
    }
}
