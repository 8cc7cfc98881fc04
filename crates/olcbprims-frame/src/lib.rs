//! GridConnect framing for OpenLCB/LCC CAN traffic.
//!
//! Every CAN frame travels as ASCII text:
//! - `:X` and eight hex digits of 29-bit extended header
//! - `N` and up to sixteen hex digits of data
//! - a closing `;`
//!
//! The header is classified into the alias-management frames (CID, RID,
//! AMD, AME, AMR), standard MTI frames, and the datagram/stream frame types
//! that this stack recognises but does not decode.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod control;
pub mod error;
pub mod ids;
pub mod kind;
pub mod mti;
pub mod scanner;

#[cfg(feature = "async")]
pub use async_codec::GridConnectCodec;
pub use codec::{decode_frame, encode_frame, CanFrame, MAX_DATA_LEN, MAX_FRAME_LEN, MAX_HEADER};
pub use control::{
    alias_map_definition, alias_map_enquiry, alias_map_reset, check_id_frames, reserve_id,
};
pub use error::{FrameError, Result};
pub use ids::{Alias, EventId, NodeId};
pub use kind::{classify, FrameKind, UnsupportedKind, STANDARD_FRAME};
pub use scanner::{scan_frame, FrameScanner};
