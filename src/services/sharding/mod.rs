//! Deterministic agent-to-pod ownership.
//!
//! Every pod evaluates the same strategy over the same key extractor with no
//! coordination, so configuration must be identical fleet-wide. Names are
//! parsed once at startup and unknown names fail fast.

pub mod jump;
pub mod key_extractor;
pub mod modulo;

use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::errors::DomainError;
use crate::domain::ports::FleetMembership;

pub use jump::JumpConsistentHashStrategy;
pub use key_extractor::{
    AccountKeyExtractor, AgentTypeKeyExtractor, KeyExtractorKind, RegionKeyExtractor,
    ShardingKeyExtractor,
};
pub use modulo::ModuloStrategy;

/// Pure mapping from a key and a fleet size to the owning pod index.
///
/// Total and deterministic: the result is always in `0..total_pods`, and
/// `0` when `total_pods <= 1`.
pub trait ShardingStrategy: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn compute_owner(&self, key: &str, total_pods: usize) -> usize;
}

/// Configured name of a sharding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardingStrategyKind {
    Modulo,
    LegacyModulo,
    CanonicalModulo,
    Jump,
}

impl ShardingStrategyKind {
    pub const ALL: [Self; 4] = [
        Self::Modulo,
        Self::LegacyModulo,
        Self::CanonicalModulo,
        Self::Jump,
    ];

    pub fn build(self) -> Arc<dyn ShardingStrategy> {
        match self {
            Self::Modulo => Arc::new(ModuloStrategy::new()),
            Self::LegacyModulo => Arc::new(ModuloStrategy::legacy()),
            Self::CanonicalModulo => Arc::new(ModuloStrategy::canonical()),
            Self::Jump => Arc::new(JumpConsistentHashStrategy),
        }
    }
}

impl FromStr for ShardingStrategyKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modulo" => Ok(Self::Modulo),
            "legacy-modulo" | "legacy" => Ok(Self::LegacyModulo),
            "canonical-modulo" => Ok(Self::CanonicalModulo),
            "jump" | "jump-consistent-hash" => Ok(Self::Jump),
            _ => Err(DomainError::UnknownShardingStrategy(s.to_string())),
        }
    }
}

/// Decides which agents the local pod runs.
#[derive(Clone)]
pub struct ShardingFilter {
    strategy: Arc<dyn ShardingStrategy>,
    extractor: Arc<dyn ShardingKeyExtractor>,
    fleet: Arc<dyn FleetMembership>,
}

impl ShardingFilter {
    pub fn new(
        strategy: Arc<dyn ShardingStrategy>,
        extractor: Arc<dyn ShardingKeyExtractor>,
        fleet: Arc<dyn FleetMembership>,
    ) -> Self {
        Self {
            strategy,
            extractor,
            fleet,
        }
    }

    /// Build from configured names, failing on unknown ones.
    pub fn from_names(
        strategy: &str,
        extractor: &str,
        fleet: Arc<dyn FleetMembership>,
    ) -> Result<Self, DomainError> {
        let strategy = strategy.parse::<ShardingStrategyKind>()?.build();
        let extractor = extractor.parse::<KeyExtractorKind>()?.build();
        Ok(Self::new(strategy, extractor, fleet))
    }

    /// Owning pod of an agent for a given fleet size.
    pub fn owner_for(&self, agent_type: &str, total_pods: usize) -> usize {
        let key = self.extractor.extract_key(Some(agent_type));
        self.strategy.compute_owner(key, total_pods)
    }

    /// Owning pod of an agent under the currently observed fleet size.
    pub fn owner(&self, agent_type: &str) -> usize {
        self.owner_for(agent_type, self.fleet.pod_count())
    }

    /// Whether the local pod owns the agent right now.
    pub fn owns(&self, agent_type: &str) -> bool {
        self.owner(agent_type) == self.fleet.pod_index()
    }

    pub fn pod_index(&self) -> usize {
        self.fleet.pod_index()
    }

    pub fn pod_count(&self) -> usize {
        self.fleet.pod_count()
    }

    pub fn strategy(&self) -> &dyn ShardingStrategy {
        self.strategy.as_ref()
    }

    pub fn extractor(&self) -> &dyn ShardingKeyExtractor {
        self.extractor.as_ref()
    }
}

impl Debug for ShardingFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardingFilter")
            .field("strategy", &self.strategy.name())
            .field("extractor", &self.extractor.name())
            .field("pod_index", &self.fleet.pod_index())
            .field("pod_count", &self.fleet.pod_count())
            .finish()
    }
}

/// Fraction of agents whose owner changes when the fleet goes from `from` to
/// `to` pods.
pub fn relocation_ratio<'a, I>(filter: &ShardingFilter, agents: I, from: usize, to: usize) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total = 0usize;
    let mut moved = 0usize;
    for agent in agents {
        total += 1;
        if filter.owner_for(agent, from) != filter.owner_for(agent, to) {
            moved += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = moved as f64 / total as f64;
    ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fleet::StaticFleet;

    #[test]
    fn test_strategy_names_parse() {
        assert_eq!("jump".parse::<ShardingStrategyKind>().unwrap(), ShardingStrategyKind::Jump);
        assert_eq!(
            "Legacy-Modulo".parse::<ShardingStrategyKind>().unwrap(),
            ShardingStrategyKind::LegacyModulo
        );
        assert!(matches!(
            "ring".parse::<ShardingStrategyKind>(),
            Err(DomainError::UnknownShardingStrategy(name)) if name == "ring"
        ));
    }

    #[test]
    fn test_filter_owns_exactly_one_pod() {
        let agents = ["prod/us-east-1/A", "prod/us-west-2/B", "test/C", "Global"];
        for agent in agents {
            let owners: Vec<usize> = (0..5)
                .filter(|index| {
                    let fleet = Arc::new(StaticFleet::new(*index, 5));
                    ShardingFilter::from_names("jump", "agent-type", fleet)
                        .unwrap()
                        .owns(agent)
                })
                .collect();
            assert_eq!(owners.len(), 1, "{agent} must have exactly one owner");
        }
    }

    #[test]
    fn test_account_key_colocates_account_agents() {
        let fleet = Arc::new(StaticFleet::new(0, 8));
        let filter = ShardingFilter::from_names("modulo", "account", fleet).unwrap();
        let a = filter.owner("prod/us-east-1/ServerGroupCachingAgent");
        let b = filter.owner("prod/eu-west-1/LoadBalancerCachingAgent");
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_extractor_fails_fast() {
        let fleet = Arc::new(StaticFleet::new(0, 1));
        assert!(matches!(
            ShardingFilter::from_names("modulo", "zone", fleet),
            Err(DomainError::UnknownKeyExtractor(_))
        ));
    }

    #[test]
    fn test_relocation_ratio_empty_sample() {
        let fleet = Arc::new(StaticFleet::new(0, 1));
        let filter = ShardingFilter::from_names("jump", "agent-type", fleet).unwrap();
        assert!(relocation_ratio(&filter, std::iter::empty(), 3, 4).abs() < f64::EPSILON);
    }
}
