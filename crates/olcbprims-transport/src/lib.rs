//! Byte-stream link abstraction for GridConnect transports.
//!
//! Provides a unified interface over the duplex links an OpenLCB node talks
//! through:
//! - TCP connections to GridConnect hubs and adapters
//! - In-memory link pairs for tests and simulations
//!
//! This is the lowest layer of olcbprims. Everything else builds on top of
//! the [`Transport`] trait provided here.

pub mod error;
pub mod memory;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryLink;
pub use tcp::{TcpConfig, TcpLink, DEFAULT_PORT};
pub use traits::Transport;
