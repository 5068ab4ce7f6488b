pub mod agent;
pub mod cache;
pub mod config;
pub mod keys;
pub mod on_demand;
pub mod resources;

pub use agent::AgentIdentity;
pub use cache::{
    AgentDataType, Attributes, Authority, CacheData, CacheResult, Detail, RelationshipFilter,
    Relationships,
};
pub use config::{
    AccountConfig, Config, LoggingConfig, OnDemandConfig, PodConfig, ProviderConfig,
    SchedulerConfig, ShardingConfig,
};
pub use keys::{escape_glob, Keys, Namespace, ServerGroupName, ABSENT_NUMBER};
pub use on_demand::OnDemandRecord;
pub use resources::{Cluster, Instance, LoadBalancer, ServerGroup};
