use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

#[derive(Default)]
struct PipeState {
    bytes: VecDeque<u8>,
    closed: bool,
}

/// One direction of traffic into a single endpoint.
#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
}

impl Pipe {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, bytes: &[u8]) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.bytes.extend(bytes.iter().copied());
        drop(state);
        self.readable.notify_all();
    }

    fn close(&self) {
        self.lock().closed = true;
        self.readable.notify_all();
    }
}

/// In-memory link endpoint.
///
/// Endpoints created together by [`MemoryLink::hub`] behave like clients of
/// one GridConnect hub: bytes sent by one endpoint are delivered to every
/// other endpoint, never echoed back to the sender. Closing any endpoint
/// tears the medium down: the others drain what is queued, then see
/// [`TransportError::Closed`].
pub struct MemoryLink {
    inbox: Arc<Pipe>,
    peers: Vec<Arc<Pipe>>,
    closed: AtomicBool,
}

impl MemoryLink {
    /// Two endpoints wired to each other.
    pub fn pair() -> (Self, Self) {
        let left = Arc::new(Pipe::default());
        let right = Arc::new(Pipe::default());
        (
            Self::endpoint(Arc::clone(&left), vec![Arc::clone(&right)]),
            Self::endpoint(right, vec![left]),
        )
    }

    /// `count` endpoints sharing one broadcast medium.
    pub fn hub(count: usize) -> Vec<Self> {
        let inboxes: Vec<Arc<Pipe>> = (0..count).map(|_| Arc::new(Pipe::default())).collect();
        (0..count)
            .map(|me| {
                let peers = inboxes
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| *idx != me)
                    .map(|(_, pipe)| Arc::clone(pipe))
                    .collect();
                Self::endpoint(Arc::clone(&inboxes[me]), peers)
            })
            .collect()
    }

    fn endpoint(inbox: Arc<Pipe>, peers: Vec<Arc<Pipe>>) -> Self {
        Self {
            inbox,
            peers,
            closed: AtomicBool::new(false),
        }
    }
}

impl Transport for MemoryLink {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        for peer in &self.peers {
            peer.push(bytes);
        }
        Ok(())
    }

    fn recv(&self, max_bytes: usize, timeout: Duration) -> Result<Option<Bytes>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inbox.lock();
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(TransportError::Shutdown);
            }
            if !state.bytes.is_empty() {
                let take = state.bytes.len().min(max_bytes.max(1));
                let chunk: Vec<u8> = state.bytes.drain(..take).collect();
                return Ok(Some(Bytes::from(chunk)));
            }
            if state.closed {
                return Err(TransportError::Closed);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            state = self
                .inbox
                .readable
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
        }
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("closing memory link");
        self.inbox.readable.notify_all();
        for peer in &self.peers {
            peer.close();
        }
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLink")
            .field("peers", &self.peers.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_roundtrip() {
        let (left, right) = MemoryLink::pair();
        left.send(b":X10700001N;").unwrap();

        let got = right.recv(1024, Duration::from_millis(100)).unwrap().unwrap();
        assert_eq!(got.as_ref(), b":X10700001N;");
        assert!(left.recv(1024, Duration::from_millis(5)).unwrap().is_none());
    }

    #[test]
    fn test_recv_respects_max_bytes() {
        let (left, right) = MemoryLink::pair();
        left.send(b"abcdef").unwrap();

        let first = right.recv(4, Duration::from_millis(50)).unwrap().unwrap();
        let second = right.recv(4, Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(first.as_ref(), b"abcd");
        assert_eq!(second.as_ref(), b"ef");
    }

    #[test]
    fn test_hub_broadcasts_to_all_but_sender() {
        let links = MemoryLink::hub(3);
        links[0].send(b"x").unwrap();

        assert!(links[0].recv(8, Duration::from_millis(5)).unwrap().is_none());
        assert_eq!(
            links[1].recv(8, Duration::from_millis(50)).unwrap().unwrap().as_ref(),
            b"x"
        );
        assert_eq!(
            links[2].recv(8, Duration::from_millis(50)).unwrap().unwrap().as_ref(),
            b"x"
        );
    }

    #[test]
    fn test_recv_wakes_on_send_from_other_thread() {
        let (left, right) = MemoryLink::pair();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            left.send(b";").unwrap();
            left
        });

        let got = right.recv(8, Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(got.as_ref(), b";");
        let _left = writer.join().unwrap();
    }

    #[test]
    fn test_close_propagates() {
        let (left, right) = MemoryLink::pair();
        left.send(b"tail").unwrap();
        left.close().unwrap();

        assert!(matches!(left.send(b"x"), Err(TransportError::Shutdown)));
        assert_eq!(
            right.recv(8, Duration::from_millis(10)).unwrap().unwrap().as_ref(),
            b"tail"
        );
        assert!(matches!(
            right.recv(8, Duration::from_millis(10)),
            Err(TransportError::Closed)
        ));
    }
}
