//! Fleetcache - sharded caching-agent fleet
//!
//! A horizontally scaled fleet of identical pods polls cloud-provider
//! accounts and regions and materializes the answers into a shared,
//! relationship-aware cache. Agents are partitioned across pods by a
//! deterministic sharding strategy, so no coordination is needed.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): cache data model, entity keys, agent identities and port traits
//! - **Service Layer** (`services`): sharding, scheduling, cache application, on-demand refresh, hydration
//! - **Adapters** (`adapters`): in-memory and moka-backed caches, static fleet membership, metrics
//! - **Infrastructure Layer** (`infrastructure`): configuration loading and logging
//! - **CLI Layer** (`cli`): shard planning and configuration inspection
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fleetcache::adapters::{InMemoryProviderCache, StaticFleet};
//! use fleetcache::domain::models::SchedulerConfig;
//! use fleetcache::services::{AgentScheduler, ShardingFilter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fleet = Arc::new(StaticFleet::new(0, 3));
//!     let filter = ShardingFilter::from_names("jump", "account", fleet)?;
//!     let cache = Arc::new(InMemoryProviderCache::new());
//!     let scheduler = AgentScheduler::new(cache, filter, SchedulerConfig::default());
//!     scheduler.run().await;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::{CachedProviderCache, InMemoryProviderCache, MetricsRecorder, StaticFleet};
pub use domain::models::{
    AgentDataType, AgentIdentity, Authority, CacheData, CacheResult, Config, Detail, Keys,
    Namespace, RelationshipFilter,
};
pub use domain::ports::{CachingAgent, FleetMembership, OnDemandAgent, ProviderCache};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AgentScheduler, CacheResultBuilder, OnDemandRefresher, ResourceHydrator, ShardingFilter,
};
