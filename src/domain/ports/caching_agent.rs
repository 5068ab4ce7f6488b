//! Scheduled caching agent port.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentDataType, AgentIdentity, CacheResult};

/// Per-cycle context passed explicitly down the poll call chain.
#[derive(Debug, Clone)]
pub struct PollContext {
    pub cycle_id: Uuid,
    pub agent_type: String,
    pub started_at: DateTime<Utc>,
    pub pod_index: usize,
    pub pod_count: usize,
}

impl PollContext {
    pub fn new(agent_type: impl Into<String>, pod_index: usize, pod_count: usize) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            agent_type: agent_type.into(),
            started_at: Utc::now(),
            pod_index,
            pod_count,
        }
    }
}

/// A unit that polls one resource kind for one account/region scope and
/// turns the provider's answer into a [`CacheResult`].
#[async_trait]
pub trait CachingAgent: Send + Sync {
    /// Identity string, `{account}[/{region}]/{ResourceKind}`.
    fn agent_type(&self) -> &str;

    /// Provider this agent polls (used for key prefixes and metric tags).
    fn provider_name(&self) -> &str;

    /// Namespaces this agent writes and its authority over each.
    fn provided_data_types(&self) -> &[AgentDataType];

    /// Glob over the ids this agent is authoritative for in `namespace`.
    ///
    /// Authoritative cleanup evicts ids matching this pattern that a cycle
    /// did not produce, so it must not reach into other agents' key ranges.
    fn key_pattern(&self, namespace: &str) -> Option<String>;

    /// Time between successful cycles; `None` uses the scheduler default.
    fn interval(&self) -> Option<Duration> {
        None
    }

    /// Time before a failed cycle is retried; `None` reuses the interval.
    fn error_interval(&self) -> Option<Duration> {
        None
    }

    /// Bound on the provider call; `None` uses the scheduler default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Poll the provider and build this cycle's result.
    async fn load_data(&self, ctx: &PollContext) -> DomainResult<CacheResult>;

    /// Parsed identity.
    fn identity(&self) -> AgentIdentity {
        AgentIdentity::parse(self.agent_type())
    }
}
