//! OpenLCB/LCC over GridConnect links.
//!
//! olcbprims claims and defends a node's 12-bit CAN alias, caches remote
//! alias mappings, and carries OpenLCB messages in GridConnect-framed CAN
//! traffic over TCP hubs.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte links (TCP hub client, in-memory hub)
//! - [`frame`]: GridConnect codec, header classification, alias-management frames
//! - [`node`]: alias lifecycle engine and message segmentation (behind `node` feature)

/// Re-export transport types.
pub mod transport {
    pub use olcbprims_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use olcbprims_frame::*;
}

/// Re-export node engine types (requires `node` feature).
#[cfg(feature = "node")]
pub mod node {
    pub use olcbprims_node::*;
}
