//! OpenLCB/LCC node engine over GridConnect links.
//!
//! The engine claims a 12-bit source alias for this node's 48-bit id, keeps a
//! cache of remote aliases, defends its own alias against collisions, and
//! moves OpenLCB messages in and out of standard CAN frames. Everything runs
//! on two threads per link: one drains outbound frames in order, the other
//! decodes and dispatches inbound traffic.

pub mod allocator;
pub mod config;
pub mod connector;
pub mod engine;
pub mod error;
pub mod events;
mod inbound;
pub mod message;
mod outbound;
mod reassembly;
pub mod registry;
pub mod resolver;

pub use allocator::{AliasAllocator, SourceState};
pub use config::{
    AliasRange, AliasSeed, NodeConfig, ResolverConfig, COLLISION_WINDOW, DEFAULT_NODE_ID,
    DEFAULT_READ_TIMEOUT, DEFAULT_REASSEMBLY_TIMEOUT,
};
pub use connector::{connect, connect_with_config};
pub use engine::MessageEngine;
pub use error::{NodeError, Result};
pub use events::{EventSink, NodeEvent, TracingEvents};
pub use message::{
    encode_message, parse_frame, reassemble, segment_payload, Message, MessageFrame, Reassembled,
    Segment, MAX_ADDRESSED_PAYLOAD, MAX_GLOBAL_PAYLOAD, SEGMENT_LEN,
};
pub use outbound::FrameSink;
pub use registry::{AliasBinding, AliasRegistry, REGISTRY_CAPACITY};
pub use resolver::NodeResolver;
