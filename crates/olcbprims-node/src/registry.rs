//! Bounded alias ↔ node id cache with least-recently-used eviction.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use olcbprims_frame::{Alias, NodeId};

/// Number of remote mappings the registry holds.
pub const REGISTRY_CAPACITY: usize = 16;

/// One registry slot.
///
/// A slot is either empty or holds both an alias and a node id; the pair is
/// stored together so a half-filled slot cannot exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AliasBinding {
    entry: Option<(Alias, NodeId)>,
    last_touched: u64,
}

impl AliasBinding {
    pub fn alias(&self) -> Option<Alias> {
        self.entry.map(|(alias, _)| alias)
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.entry.map(|(_, node_id)| node_id)
    }

    /// Logical time of the last record or lookup. Zero for empty slots.
    pub fn last_touched(&self) -> u64 {
        self.last_touched
    }

    pub fn is_active(&self) -> bool {
        self.entry.is_some()
    }
}

struct Table {
    slots: [AliasBinding; REGISTRY_CAPACITY],
    clock: u64,
}

impl Table {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn find_node(&self, node_id: &NodeId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot.entry, Some((_, id)) if id == *node_id))
    }

    fn find_alias(&self, alias: Alias) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot.entry, Some((a, _)) if a == alias))
    }

    fn touch(&mut self, idx: usize) {
        self.slots[idx].last_touched = self.tick();
    }

    fn clear(&mut self, idx: usize) -> Option<(Alias, NodeId)> {
        std::mem::take(&mut self.slots[idx]).entry
    }

    /// Empty slots report zero, so they are always chosen first.
    fn least_recent(&self) -> usize {
        let mut oldest = 0;
        for (idx, slot) in self.slots.iter().enumerate().skip(1) {
            if slot.last_touched < self.slots[oldest].last_touched {
                oldest = idx;
            }
        }
        oldest
    }
}

/// Maps remote aliases to node ids and back.
///
/// All operations are linearizable. Waiters parked in
/// [`wait_for_alias`](Self::wait_for_alias) or
/// [`wait_for_node`](Self::wait_for_node) wake on every change.
pub struct AliasRegistry {
    table: Mutex<Table>,
    changed: Condvar,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                slots: [AliasBinding::default(); REGISTRY_CAPACITY],
                clock: 0,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Alias currently bound to `node_id`.
    pub fn lookup_alias_for(&self, node_id: &NodeId) -> Option<Alias> {
        let mut table = self.lock();
        let idx = table.find_node(node_id)?;
        table.touch(idx);
        table.slots[idx].alias()
    }

    /// Node id currently bound to `alias`.
    pub fn lookup_node_for(&self, alias: Alias) -> Option<NodeId> {
        let mut table = self.lock();
        let idx = table.find_alias(alias)?;
        table.touch(idx);
        table.slots[idx].node_id()
    }

    /// Bind `alias` to `node_id`.
    ///
    /// Any other binding of either value is dropped first. When the table is
    /// full the least recently touched binding is evicted. Returns `false`
    /// if the binding already existed.
    pub fn record(&self, alias: Alias, node_id: NodeId) -> bool {
        let mut table = self.lock();
        if let Some(idx) = table.find_node(&node_id) {
            if table.slots[idx].alias() == Some(alias) {
                table.touch(idx);
                return false;
            }
            table.clear(idx);
        }
        if let Some(idx) = table.find_alias(alias) {
            table.clear(idx);
        }

        let idx = table.least_recent();
        let last_touched = table.tick();
        table.slots[idx] = AliasBinding {
            entry: Some((alias, node_id)),
            last_touched,
        };
        drop(table);
        self.changed.notify_all();
        true
    }

    /// Drop the binding for `alias`, returning the node id it held.
    pub fn purge_by_alias(&self, alias: Alias) -> Option<NodeId> {
        let mut table = self.lock();
        let idx = table.find_alias(alias)?;
        let (_, node_id) = table.clear(idx)?;
        drop(table);
        self.changed.notify_all();
        Some(node_id)
    }

    /// Drop the binding for `node_id`, returning the alias it held.
    pub fn purge_by_node_id(&self, node_id: &NodeId) -> Option<Alias> {
        let mut table = self.lock();
        let idx = table.find_node(node_id)?;
        let (alias, _) = table.clear(idx)?;
        drop(table);
        self.changed.notify_all();
        Some(alias)
    }

    /// Block until `node_id` has a binding or `timeout` elapses.
    pub fn wait_for_alias(&self, node_id: &NodeId, timeout: Duration) -> Option<Alias> {
        let deadline = Instant::now() + timeout;
        let mut table = self.lock();
        loop {
            if let Some(idx) = table.find_node(node_id) {
                table.touch(idx);
                return table.slots[idx].alias();
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if remaining.is_zero() {
                return None;
            }
            table = self
                .changed
                .wait_timeout(table, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Block until `alias` has a binding or `timeout` elapses.
    pub fn wait_for_node(&self, alias: Alias, timeout: Duration) -> Option<NodeId> {
        let deadline = Instant::now() + timeout;
        let mut table = self.lock();
        loop {
            if let Some(idx) = table.find_alias(alias) {
                table.touch(idx);
                return table.slots[idx].node_id();
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if remaining.is_zero() {
                return None;
            }
            table = self
                .changed
                .wait_timeout(table, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Active bindings, most recently touched first.
    pub fn snapshot(&self) -> Vec<AliasBinding> {
        let table = self.lock();
        let mut bindings: Vec<AliasBinding> = table
            .slots
            .iter()
            .filter(|slot| slot.is_active())
            .copied()
            .collect();
        bindings.sort_by(|a, b| b.last_touched.cmp(&a.last_touched));
        bindings
    }

    /// Number of active bindings.
    pub fn len(&self) -> usize {
        self.lock().slots.iter().filter(|slot| slot.is_active()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AliasRegistry {
    fn default() -> Self {
        Self::new()
    }
}
