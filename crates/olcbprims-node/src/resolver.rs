use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use olcbprims_frame::{alias_map_enquiry, mti, Alias, NodeId};
use tracing::debug;

use crate::allocator::AliasAllocator;
use crate::config::ResolverConfig;
use crate::error::{NodeError, Result};
use crate::message::encode_message;
use crate::outbound::FrameSink;
use crate::registry::AliasRegistry;

/// Turns node ids into aliases and back, querying the bus on a cache miss.
///
/// Queries go out under this node's own alias, so a miss may first trigger
/// alias allocation.
pub struct NodeResolver {
    registry: Arc<AliasRegistry>,
    allocator: Arc<AliasAllocator>,
    sink: Arc<dyn FrameSink>,
    config: ResolverConfig,
    /// Aliases queried by [`NodeResolver::request_node_id`], and when.
    requested: Mutex<HashMap<Alias, Instant>>,
}

impl NodeResolver {
    pub fn new(
        registry: Arc<AliasRegistry>,
        allocator: Arc<AliasAllocator>,
        sink: Arc<dyn FrameSink>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            registry,
            allocator,
            sink,
            config,
            requested: Mutex::new(HashMap::new()),
        }
    }

    /// Alias for `node_id`.
    ///
    /// Sends an Alias Map Enquiry per attempt and waits for the registry to
    /// learn the mapping from the resulting definition.
    pub fn resolve_alias(&self, node_id: &NodeId) -> Result<Alias> {
        if *node_id == self.allocator.node_id() {
            return self.allocator.allocate();
        }
        if let Some(alias) = self.registry.lookup_alias_for(node_id) {
            return Ok(alias);
        }

        let own = self.allocator.allocate()?;
        for attempt in 1..=self.config.attempts {
            debug!(%node_id, attempt, "alias map enquiry");
            self.sink.submit(&[alias_map_enquiry(own, None)])?;
            if let Some(alias) = self.registry.wait_for_alias(node_id, self.config.wait) {
                return Ok(alias);
            }
        }
        Err(NodeError::ResolutionTimeout {
            target: format!("node {node_id}"),
            attempts: self.config.attempts,
        })
    }

    /// Node id behind `alias`.
    ///
    /// Sends an addressed Verify Node ID per attempt; the Verified Node ID
    /// reply carries the answer.
    pub fn resolve_node_id(&self, alias: Alias) -> Result<NodeId> {
        if self.allocator.current() == Some(alias) {
            return Ok(self.allocator.node_id());
        }
        if let Some(node_id) = self.registry.lookup_node_for(alias) {
            return Ok(node_id);
        }

        let own = self.allocator.allocate()?;
        let query = encode_message(mti::VERIFY_NODE_ID_ADDRESSED, own, Some(alias), &[])?;
        for attempt in 1..=self.config.attempts {
            debug!(%alias, attempt, "verify node id");
            self.sink.submit(&query)?;
            if let Some(node_id) = self.registry.wait_for_node(alias, self.config.wait) {
                return Ok(node_id);
            }
        }
        Err(NodeError::ResolutionTimeout {
            target: format!("alias {alias}"),
            attempts: self.config.attempts,
        })
    }

    /// Node id behind `alias` if it is this node's or already cached.
    pub fn known_node_id(&self, alias: Alias) -> Option<NodeId> {
        if self.allocator.current() == Some(alias) {
            return Some(self.allocator.node_id());
        }
        self.registry.lookup_node_for(alias)
    }

    /// Ask the bus who owns `alias` without waiting for the answer.
    ///
    /// The Verified Node ID reply lands in the registry. Nothing is sent
    /// before this node holds an alias, and each alias is asked at most once
    /// per resolver wait period.
    pub fn request_node_id(&self, alias: Alias) {
        let Some(own) = self.allocator.current() else {
            return;
        };
        let now = Instant::now();
        {
            let mut requested = self
                .requested
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(at) = requested.get(&alias) {
                if now.saturating_duration_since(*at) < self.config.wait {
                    return;
                }
            }
            requested.retain(|_, at| now.saturating_duration_since(*at) < self.config.wait);
            requested.insert(alias, now);
        }

        debug!(%alias, "verify node id, not waiting");
        let sent = encode_message(mti::VERIFY_NODE_ID_ADDRESSED, own, Some(alias), &[])
            .and_then(|query| self.sink.submit(&query));
        if let Err(err) = sent {
            debug!(%alias, error = %err, "verify node id query not sent");
        }
    }
}
