use std::time::Duration;

use olcbprims_frame::{Alias, NodeId};

use crate::error::{NodeError, Result};

/// How long a candidate alias must go unchallenged before it is claimed.
pub const COLLISION_WINDOW: Duration = Duration::from_millis(200);

/// Default read timeout for the receive loop. Bounds shutdown latency.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of bytes requested per link read.
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Default number of inbound message frames held for `receive`.
pub const DEFAULT_INBOUND_CAPACITY: usize = 1024;

/// Default time an open multi-frame message waits for its next frame.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_millis(200);

/// Where alias allocation starts probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasSeed {
    /// Start at a fixed alias.
    Fixed(Alias),
    /// Fold the 48-bit node id into 12 bits, so distinct nodes tend to
    /// start on distinct candidates.
    #[default]
    FromNodeId,
}

/// Inclusive range of aliases the allocator may claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasRange {
    first: Alias,
    last: Alias,
}

impl AliasRange {
    /// Every assignable alias, 0x001 through 0xFFE.
    pub const FULL: AliasRange = AliasRange {
        first: Alias::MIN,
        last: Alias::MAX,
    };

    pub fn new(first: Alias, last: Alias) -> Result<Self> {
        if first > last {
            return Err(NodeError::InvalidConfig(format!(
                "alias range {first}..={last} is empty"
            )));
        }
        Ok(Self { first, last })
    }

    pub fn first(&self) -> Alias {
        self.first
    }

    pub fn last(&self) -> Alias {
        self.last
    }

    /// Number of aliases in the range.
    pub fn len(&self) -> usize {
        usize::from(self.last.get() - self.first.get()) + 1
    }

    pub fn contains(&self, alias: Alias) -> bool {
        alias >= self.first && alias <= self.last
    }

    /// The alias after `alias`, wrapping from `last` back to `first`.
    pub fn next(&self, alias: Alias) -> Alias {
        if alias >= self.last || alias < self.first {
            self.first
        } else {
            alias.next_wrapping()
        }
    }

    /// First candidate for `node_id` under `seed`.
    pub fn start(&self, seed: AliasSeed, node_id: &NodeId) -> Alias {
        match seed {
            AliasSeed::Fixed(alias) if self.contains(alias) => alias,
            AliasSeed::Fixed(_) => self.first,
            AliasSeed::FromNodeId => {
                let id = node_id.to_u64();
                let folded = (id ^ (id >> 12) ^ (id >> 24) ^ (id >> 36)) & 0xFFF;
                let offset = (folded as usize % self.len()) as u16;
                Alias::new(self.first.get() + offset).unwrap_or(self.first)
            }
        }
    }
}

impl Default for AliasRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// Retry budget for alias and node id resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Queries sent before giving up.
    pub attempts: usize,
    /// How long each query waits for an answer.
    pub wait: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            wait: Duration::from_millis(200),
        }
    }
}

/// Node id used when none is configured.
pub const DEFAULT_NODE_ID: NodeId = NodeId::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

/// Node engine configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This node's 48-bit identifier.
    pub node_id: NodeId,
    pub alias_seed: AliasSeed,
    pub alias_range: AliasRange,
    pub resolver: ResolverConfig,
    /// Link read timeout used by the receive loop.
    pub read_timeout: Duration,
    /// Bytes requested per link read.
    pub read_chunk: usize,
    /// Message frames buffered for `receive` before the oldest are dropped.
    pub inbound_capacity: usize,
    /// Answer Verify Node ID requests aimed at this node.
    pub answer_verify_node: bool,
    /// Idle time after which a partly received addressed message is closed.
    pub reassembly_timeout: Duration,
}

impl NodeConfig {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            alias_seed: AliasSeed::default(),
            alias_range: AliasRange::default(),
            resolver: ResolverConfig::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            read_chunk: DEFAULT_READ_CHUNK,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            answer_verify_node: true,
            reassembly_timeout: DEFAULT_REASSEMBLY_TIMEOUT,
        }
    }

    pub fn with_alias_seed(mut self, seed: AliasSeed) -> Self {
        self.alias_seed = seed;
        self
    }

    pub fn with_alias_range(mut self, range: AliasRange) -> Self {
        self.alias_range = range;
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_reassembly_timeout(mut self, timeout: Duration) -> Self {
        self.reassembly_timeout = timeout;
        self
    }
}

impl Default for NodeConfig {
    /// Configuration for the conventional test node 01.02.03.04.05.06.
    fn default() -> Self {
        Self::new(DEFAULT_NODE_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(value: u16) -> Alias {
        Alias::new(value).unwrap()
    }

    #[test]
    fn range_wraps_within_bounds() {
        let range = AliasRange::new(alias(0x010), alias(0x012)).unwrap();
        assert_eq!(range.len(), 3);
        assert_eq!(range.next(alias(0x010)), alias(0x011));
        assert_eq!(range.next(alias(0x012)), alias(0x010));
        assert_eq!(AliasRange::FULL.next(Alias::MAX), Alias::MIN);
    }

    #[test]
    fn empty_range_is_rejected() {
        assert!(AliasRange::new(alias(0x020), alias(0x010)).is_err());
    }

    #[test]
    fn fixed_seed_outside_range_starts_at_first() {
        let range = AliasRange::new(alias(0x100), alias(0x1FF)).unwrap();
        let node = NodeId::from_u64(0x0501_0101_0000);
        assert_eq!(range.start(AliasSeed::Fixed(alias(0x001)), &node), alias(0x100));
        assert_eq!(range.start(AliasSeed::Fixed(alias(0x150)), &node), alias(0x150));
    }

    #[test]
    fn node_id_seed_is_stable_and_in_range() {
        let range = AliasRange::new(alias(0x100), alias(0x10F)).unwrap();
        for raw in [0u64, 1, 0x0501_0101_0001, 0xFFFF_FFFF_FFFF] {
            let node = NodeId::from_u64(raw);
            let start = range.start(AliasSeed::FromNodeId, &node);
            assert!(range.contains(start));
            assert_eq!(start, range.start(AliasSeed::FromNodeId, &node));
        }
    }

    #[test]
    fn node_id_seed_never_yields_reserved_alias() {
        let node = NodeId::from_u64(0);
        assert_eq!(AliasRange::FULL.start(AliasSeed::FromNodeId, &node), Alias::MIN);
    }

    #[test]
    fn default_config_uses_conventional_node() {
        let config = NodeConfig::default();
        assert_eq!(config.node_id.to_string(), "01.02.03.04.05.06");
        assert_eq!(config.resolver.attempts, 3);
        assert_eq!(config.alias_seed, AliasSeed::FromNodeId);
    }
}
