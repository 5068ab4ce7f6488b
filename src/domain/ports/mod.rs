//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces that the scheduler, refresher and
//! hydrator depend on:
//! - ProviderCache: shared cache store reads and writes
//! - CachingAgent: scheduled poll -> transform units
//! - OnDemandAgent: single-resource refresh units
//! - FleetMembership: pod index and fleet size
//! - CacheMetrics: cycle and refresh outcome reporting

pub mod caching_agent;
pub mod fleet;
pub mod metrics;
pub mod on_demand_agent;
pub mod provider_cache;

pub use caching_agent::{CachingAgent, PollContext};
pub use fleet::FleetMembership;
pub use metrics::{CacheMetrics, NoopMetrics, Outcome};
pub use on_demand_agent::{OnDemandAgent, OnDemandRequest, OnDemandType};
pub use provider_cache::ProviderCache;
