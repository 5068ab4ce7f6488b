//! Services: sharding, scheduling, cache writes, on-demand refresh and reads.

pub mod agent_scheduler;
pub mod cache_applier;
pub mod cache_result_builder;
pub mod hydrator;
pub mod on_demand_refresh;
pub mod sharding;

pub use agent_scheduler::{
    execute_cycle, AgentRunState, AgentScheduler, SchedulerHandle, SchedulerStatus, TickReport,
};
pub use cache_applier::{ApplyReport, CacheApplier};
pub use cache_result_builder::{CacheDataBuilder, CacheResultBuilder, NamespaceBuilder};
pub use hydrator::ResourceHydrator;
pub use on_demand_refresh::{OnDemandOutcome, OnDemandRefresher};
pub use sharding::{
    relocation_ratio, KeyExtractorKind, ShardingFilter, ShardingKeyExtractor, ShardingStrategy,
    ShardingStrategyKind,
};
