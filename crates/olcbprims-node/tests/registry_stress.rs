use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use olcbprims_frame::{Alias, NodeId};
use olcbprims_node::{AliasBinding, AliasRegistry, REGISTRY_CAPACITY};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn assert_unique(bindings: &[AliasBinding]) {
    assert!(bindings.len() <= REGISTRY_CAPACITY);
    let aliases: HashSet<Alias> = bindings.iter().filter_map(AliasBinding::alias).collect();
    let nodes: HashSet<NodeId> = bindings.iter().filter_map(AliasBinding::node_id).collect();
    assert_eq!(aliases.len(), bindings.len(), "duplicate alias in {bindings:?}");
    assert_eq!(nodes.len(), bindings.len(), "duplicate node id in {bindings:?}");
}

#[test]
fn random_operations_keep_bindings_unique() {
    let registry = AliasRegistry::new();
    let mut rng = StdRng::seed_from_u64(12021);

    for _ in 0..20_000 {
        // Small key spaces force frequent reassignment and eviction.
        let alias = Alias::new(rng.gen_range(1..=40)).unwrap();
        let node = NodeId::from_u64(0x0501_0101_0000 + rng.gen_range(0..40));
        match rng.gen_range(0..10) {
            0..=5 => {
                registry.record(alias, node);
                assert_eq!(registry.lookup_node_for(alias), Some(node));
                assert_eq!(registry.lookup_alias_for(&node), Some(alias));
            }
            6 => {
                registry.purge_by_alias(alias);
                assert_eq!(registry.lookup_node_for(alias), None);
            }
            7 => {
                registry.purge_by_node_id(&node);
                assert_eq!(registry.lookup_alias_for(&node), None);
            }
            _ => {
                if let Some(found) = registry.lookup_node_for(alias) {
                    assert_eq!(registry.lookup_alias_for(&found), Some(alias));
                }
            }
        }
        assert_unique(&registry.snapshot());
    }
}

#[test]
fn concurrent_writers_keep_bindings_unique() {
    let registry = Arc::new(AliasRegistry::new());
    let workers: Vec<_> = (0..8u64)
        .map(|seed| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..5_000 {
                    let alias = Alias::new(rng.gen_range(1..=24)).unwrap();
                    let node = NodeId::from_u64(rng.gen_range(1..=24));
                    match rng.gen_range(0..4) {
                        0 | 1 => {
                            registry.record(alias, node);
                        }
                        2 => {
                            registry.purge_by_alias(alias);
                        }
                        _ => {
                            registry.lookup_alias_for(&node);
                        }
                    }
                }
            })
        })
        .collect();

    for _ in 0..200 {
        assert_unique(&registry.snapshot());
        thread::yield_now();
    }
    for worker in workers {
        worker.join().expect("worker should finish");
    }
    assert_unique(&registry.snapshot());
}
