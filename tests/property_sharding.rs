use std::sync::Arc;

use fleetcache::adapters::StaticFleet;
use fleetcache::services::sharding::jump::jump_consistent_hash;
use fleetcache::services::sharding::modulo::modulo_bucket;
use fleetcache::services::{KeyExtractorKind, ShardingFilter, ShardingStrategyKind};
use proptest::prelude::*;

fn strategy_kind() -> impl Strategy<Value = ShardingStrategyKind> {
    prop::sample::select(ShardingStrategyKind::ALL.to_vec())
}

fn extractor_kind() -> impl Strategy<Value = KeyExtractorKind> {
    prop::sample::select(vec![
        KeyExtractorKind::Account,
        KeyExtractorKind::Region,
        KeyExtractorKind::AgentType,
    ])
}

proptest! {
    /// Property: every strategy returns a pod inside the fleet
    #[test]
    fn prop_owner_in_range(
        kind in strategy_kind(),
        key in ".{0,64}",
        pods in 1usize..512,
    ) {
        let owner = kind.build().compute_owner(&key, pods);
        prop_assert!(owner < pods);
    }

    /// Property: a single pod, or no pods at all, owns everything at index 0
    #[test]
    fn prop_single_pod_owns_everything(kind in strategy_kind(), key in ".{0,64}") {
        let strategy = kind.build();
        prop_assert_eq!(strategy.compute_owner(&key, 1), 0);
        prop_assert_eq!(strategy.compute_owner(&key, 0), 0);
    }

    /// Property: ownership is a pure function of key and fleet size
    #[test]
    fn prop_owner_is_deterministic(
        kind in strategy_kind(),
        key in "[a-z0-9-]{1,20}(/[a-z0-9-]{1,12}){0,2}",
        pods in 1usize..64,
    ) {
        let first = kind.build().compute_owner(&key, pods);
        let second = kind.build().compute_owner(&key, pods);
        prop_assert_eq!(first, second);
    }

    /// Property: modulo bucketing never leaves the range, even for i32::MIN
    #[test]
    fn prop_modulo_bucket_in_range(hash in any::<i32>(), pods in 1usize..10_000) {
        prop_assert!(modulo_bucket(hash, pods) < pods);
    }

    /// Property: growing the fleet by one only moves keys onto the new pod
    #[test]
    fn prop_jump_moves_only_to_new_bucket(key in any::<u64>(), pods in 1usize..256) {
        let before = jump_consistent_hash(key, pods);
        let after = jump_consistent_hash(key, pods + 1);
        prop_assert!(after == before || after == pods);
    }

    /// Property: agents sharing a shard key always share an owner
    #[test]
    fn prop_same_key_same_owner(
        kind in strategy_kind(),
        extractor in extractor_kind(),
        account in "[a-z]{1,10}",
        region in "[a-z]{2}-[a-z]{4}-[1-3]",
        pods in 1usize..32,
    ) {
        let filter = ShardingFilter::new(
            kind.build(),
            extractor.build(),
            Arc::new(StaticFleet::new(0, pods)),
        );
        let a = format!("{account}/{region}/ServerGroupCachingAgent");
        let b = format!("{account}/{region}/LoadBalancerCachingAgent");
        if extractor != KeyExtractorKind::AgentType {
            prop_assert_eq!(filter.owner(&a), filter.owner(&b));
        }
        prop_assert!(filter.owner(&a) < pods);
    }
}
