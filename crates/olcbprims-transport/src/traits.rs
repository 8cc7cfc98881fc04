use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// A connected duplex byte link.
///
/// Implementations must allow `send` and `recv` to be called concurrently
/// from different threads: the node engine runs a dedicated send loop and a
/// dedicated receive loop over one shared link.
pub trait Transport: Send + Sync {
    /// Write all of `bytes` to the link.
    fn send(&self, bytes: &[u8]) -> Result<()>;

    /// Read up to `max_bytes`, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived within the timeout. Any `Err`
    /// is fatal for the link.
    fn recv(&self, max_bytes: usize, timeout: Duration) -> Result<Option<Bytes>>;

    /// Close the link. Pending and later `recv` calls fail with
    /// [`TransportError::Shutdown`](crate::TransportError::Shutdown).
    fn close(&self) -> Result<()>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn recv(&self, max_bytes: usize, timeout: Duration) -> Result<Option<Bytes>> {
        (**self).recv(max_bytes, timeout)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}
