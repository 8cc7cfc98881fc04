//! Alias reservation and self-defense for this node's source alias.
//!
//! ```text
//! Unbound ──allocate──▶ Reserving ──window clear──▶ Claimed ──first send──▶ Active
//!    ▲                      │ in use: next candidate        │                 │
//!    └──────────────────────┴───────── conflict (AMR) ──────┴─────────────────┘
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use olcbprims_frame::{
    alias_map_definition, alias_map_reset, check_id_frames, reserve_id, Alias, CanFrame,
    FrameKind, NodeId,
};
use tracing::debug;

use crate::config::{AliasRange, AliasSeed, COLLISION_WINDOW};
use crate::error::{NodeError, Result};
use crate::events::{EventSink, NodeEvent};
use crate::outbound::FrameSink;

/// Lifecycle of this node's source alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Unbound,
    /// Probes are out for `candidate`; `in_use` is set when any frame from
    /// that alias is seen during the window.
    Reserving { candidate: Alias, in_use: bool },
    Claimed(Alias),
    /// Claimed and already used to send application traffic.
    Active(Alias),
}

impl SourceState {
    /// The owned alias, if any.
    pub fn alias(&self) -> Option<Alias> {
        match self {
            SourceState::Claimed(alias) | SourceState::Active(alias) => Some(*alias),
            _ => None,
        }
    }
}

struct State {
    source: SourceState,
    cursor: Alias,
}

/// Claims and defends one node's source alias.
pub struct AliasAllocator {
    node_id: NodeId,
    range: AliasRange,
    window: Duration,
    state: Mutex<State>,
    changed: Condvar,
    sink: Arc<dyn FrameSink>,
    events: Arc<dyn EventSink>,
}

impl AliasAllocator {
    pub fn new(
        node_id: NodeId,
        seed: AliasSeed,
        range: AliasRange,
        sink: Arc<dyn FrameSink>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            node_id,
            range,
            window: COLLISION_WINDOW,
            state: Mutex::new(State {
                source: SourceState::Unbound,
                cursor: range.start(seed, &node_id),
            }),
            changed: Condvar::new(),
            sink,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn state(&self) -> SourceState {
        self.lock().source
    }

    /// The owned alias without triggering allocation.
    pub fn current(&self) -> Option<Alias> {
        self.lock().source.alias()
    }

    /// The owned alias, reserving one first when unbound.
    ///
    /// Probes candidates in order from the seed, wrapping within the range.
    /// A candidate is claimed once it goes a full collision window without
    /// any frame carrying it as source. Callers arriving during a reservation
    /// wait for its outcome instead of starting their own.
    pub fn allocate(&self) -> Result<Alias> {
        let mut candidate = {
            let mut state = self.lock();
            loop {
                match state.source {
                    SourceState::Claimed(alias) | SourceState::Active(alias) => return Ok(alias),
                    SourceState::Reserving { .. } => {
                        state = self
                            .changed
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    SourceState::Unbound => break,
                }
            }
            let candidate = state.cursor;
            state.source = SourceState::Reserving {
                candidate,
                in_use: false,
            };
            candidate
        };

        for _ in 0..self.range.len() {
            self.events.emit(&NodeEvent::AliasProbing { alias: candidate });
            if let Err(err) = self.sink.submit(&check_id_frames(&self.node_id, candidate)) {
                self.abandon();
                return Err(err);
            }

            let mut state = self
                .changed
                .wait_timeout_while(self.lock(), self.window, |state| {
                    !matches!(state.source, SourceState::Reserving { in_use: true, .. })
                })
                .unwrap_or_else(PoisonError::into_inner)
                .0;

            match state.source {
                SourceState::Reserving { in_use: false, .. } => {
                    state.source = SourceState::Claimed(candidate);
                    state.cursor = self.range.next(candidate);
                    drop(state);
                    self.changed.notify_all();

                    let announce = [
                        reserve_id(candidate),
                        alias_map_definition(candidate, &self.node_id),
                    ];
                    if let Err(err) = self.sink.submit(&announce) {
                        let mut state = self.lock();
                        if state.source == SourceState::Claimed(candidate) {
                            state.source = SourceState::Unbound;
                        }
                        return Err(err);
                    }
                    self.events.emit(&NodeEvent::AliasClaimed {
                        alias: candidate,
                        node_id: self.node_id,
                    });
                    return Ok(candidate);
                }
                SourceState::Reserving { in_use: true, .. } => {
                    let busy = candidate;
                    candidate = self.range.next(candidate);
                    state.cursor = candidate;
                    state.source = SourceState::Reserving {
                        candidate,
                        in_use: false,
                    };
                    drop(state);
                    self.events.emit(&NodeEvent::AliasInUse { alias: busy });
                }
                _ => return Err(NodeError::Shutdown),
            }
        }

        self.abandon();
        Err(NodeError::AllocationExhausted {
            first: self.range.first(),
            last: self.range.last(),
        })
    }

    /// Record that application traffic went out under `alias`.
    pub fn mark_active(&self, alias: Alias) {
        let mut state = self.lock();
        if state.source == SourceState::Claimed(alias) {
            state.source = SourceState::Active(alias);
        }
    }

    /// Inspect a frame seen on the bus.
    ///
    /// During a reservation any frame sourced from the candidate marks it in
    /// use. Once claimed, a probe, reservation, or definition of our alias
    /// from another node makes us release it with one reset and go back to
    /// unbound.
    pub fn observe(&self, frame: &CanFrame) {
        let alias_field = frame.alias_field();
        let mut state = self.lock();
        match state.source {
            SourceState::Reserving {
                candidate,
                in_use: false,
            } if candidate.get() == alias_field => {
                state.source = SourceState::Reserving {
                    candidate,
                    in_use: true,
                };
                drop(state);
                self.changed.notify_all();
            }
            SourceState::Claimed(alias) | SourceState::Active(alias)
                if alias.get() == alias_field && self.challenges(frame) =>
            {
                state.source = SourceState::Unbound;
                drop(state);
                self.changed.notify_all();

                debug!(%alias, header = format_args!("{:08X}", frame.header()), "alias challenged");
                self.events.emit(&NodeEvent::AliasConflict { alias });
                // A failed submit means the link is down; there is nothing left to defend.
                let _ = self.sink.submit(&[alias_map_reset(alias, &self.node_id)]);
            }
            _ => {}
        }
    }

    fn challenges(&self, frame: &CanFrame) -> bool {
        match frame.kind() {
            FrameKind::CheckId { .. } | FrameKind::ReserveId { .. } => true,
            FrameKind::AliasMapDefinition { .. } => {
                NodeId::from_slice(frame.data()) != Some(self.node_id)
            }
            _ => false,
        }
    }

    fn abandon(&self) {
        let mut state = self.lock();
        if matches!(state.source, SourceState::Reserving { .. }) {
            state.source = SourceState::Unbound;
        }
        drop(state);
        self.changed.notify_all();
    }

    #[cfg(test)]
    fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}
