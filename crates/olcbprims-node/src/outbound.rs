use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use olcbprims_frame::CanFrame;

use crate::error::{NodeError, Result};

/// Somewhere to queue frames for transmission.
///
/// Frames of one call go out contiguously and in order. Calls return once
/// the frames are queued, not once they are on the wire.
pub trait FrameSink: Send + Sync {
    fn submit(&self, frames: &[CanFrame]) -> Result<()>;
}

/// Frames queued by one caller, plus where to report the outcome.
pub(crate) struct Batch {
    pub(crate) frames: Vec<CanFrame>,
    done: Option<mpsc::Sender<Result<()>>>,
}

impl Batch {
    pub(crate) fn complete(self, result: Result<()>) {
        if let Some(done) = self.done {
            let _ = done.send(result);
        }
    }
}

struct Queue {
    batches: VecDeque<Batch>,
    closed: bool,
}

/// FIFO of outbound batches drained by the send loop.
pub(crate) struct Outbound {
    queue: Mutex<Queue>,
    ready: Condvar,
}

impl Outbound {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(Queue {
                batches: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, batch: Batch) -> Result<()> {
        let mut queue = self.lock();
        if queue.closed {
            return Err(NodeError::Shutdown);
        }
        queue.batches.push_back(batch);
        drop(queue);
        self.ready.notify_one();
        Ok(())
    }

    /// Queue `frames` and block until the send loop has written them all.
    pub(crate) fn submit_and_wait(&self, frames: Vec<CanFrame>) -> Result<()> {
        let (done, outcome) = mpsc::channel();
        self.enqueue(Batch {
            frames,
            done: Some(done),
        })?;
        // The sender is dropped unsent when the loop exits with the batch queued.
        outcome.recv().unwrap_or(Err(NodeError::Shutdown))
    }

    /// Next batch in FIFO order; `None` once closed.
    pub(crate) fn next_batch(&self) -> Option<Batch> {
        let mut queue = self.lock();
        loop {
            if queue.closed {
                return None;
            }
            if let Some(batch) = queue.batches.pop_front() {
                return Some(batch);
            }
            queue = self
                .ready
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Refuse new batches and release the send loop. Queued batches are
    /// dropped, which fails their waiters with [`NodeError::Shutdown`].
    pub(crate) fn close(&self) {
        let mut queue = self.lock();
        queue.closed = true;
        let abandoned: Vec<Batch> = queue.batches.drain(..).collect();
        drop(queue);
        self.ready.notify_all();
        drop(abandoned);
    }
}

impl FrameSink for Outbound {
    fn submit(&self, frames: &[CanFrame]) -> Result<()> {
        self.enqueue(Batch {
            frames: frames.to_vec(),
            done: None,
        })
    }
}
