use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use olcbprims_frame::CanFrame;
use olcbprims_transport::TransportError;

use crate::error::{NodeError, Result};

/// Why the inbound side stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Closed {
    Shutdown,
    LinkDown,
}

struct Buffer {
    frames: VecDeque<CanFrame>,
    closed: Option<Closed>,
}

/// Message frames handed from the receive loop to `receive` callers.
pub(crate) struct Inbound {
    buffer: Mutex<Buffer>,
    arrived: Condvar,
    capacity: usize,
}

impl Inbound {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(Buffer {
                frames: VecDeque::new(),
                closed: None,
            }),
            arrived: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a frame. Returns `true` if the oldest frame was dropped to
    /// make room.
    pub(crate) fn push(&self, frame: CanFrame) -> bool {
        let mut buffer = self.lock();
        let overflow = buffer.frames.len() >= self.capacity;
        if overflow {
            buffer.frames.pop_front();
        }
        buffer.frames.push_back(frame);
        drop(buffer);
        self.arrived.notify_one();
        overflow
    }

    /// Oldest frame, waiting until `deadline`. Buffered frames are still
    /// delivered after the link goes down.
    pub(crate) fn pop(&self, deadline: Instant) -> Result<Option<CanFrame>> {
        let mut buffer = self.lock();
        loop {
            if buffer.closed == Some(Closed::Shutdown) {
                return Err(NodeError::Shutdown);
            }
            if let Some(frame) = buffer.frames.pop_front() {
                return Ok(Some(frame));
            }
            if buffer.closed == Some(Closed::LinkDown) {
                return Err(TransportError::Closed.into());
            }
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => remaining,
                _ => return Ok(None),
            };
            buffer = self
                .arrived
                .wait_timeout(buffer, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub(crate) fn close(&self, reason: Closed) {
        let mut buffer = self.lock();
        if buffer.closed != Some(Closed::Shutdown) {
            buffer.closed = Some(reason);
        }
        drop(buffer);
        self.arrived.notify_all();
    }
}
