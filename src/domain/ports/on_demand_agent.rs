//! On-demand caching agent port.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CacheResult, Namespace};

/// Kind of resource an on-demand refresh targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnDemandType {
    ServerGroup,
    LoadBalancer,
    SecurityGroup,
    Cluster,
    Image,
}

impl OnDemandType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerGroup => "serverGroup",
            Self::LoadBalancer => "loadBalancer",
            Self::SecurityGroup => "securityGroup",
            Self::Cluster => "cluster",
            Self::Image => "image",
        }
    }

    /// Namespace holding the refreshed entity.
    pub const fn namespace(self) -> Namespace {
        match self {
            Self::ServerGroup => Namespace::ServerGroups,
            Self::LoadBalancer => Namespace::LoadBalancers,
            Self::SecurityGroup => Namespace::SecurityGroups,
            Self::Cluster => Namespace::Clusters,
            Self::Image => Namespace::Images,
        }
    }
}

impl fmt::Display for OnDemandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnDemandType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serverGroup" | "server-group" => Ok(Self::ServerGroup),
            "loadBalancer" | "load-balancer" => Ok(Self::LoadBalancer),
            "securityGroup" | "security-group" => Ok(Self::SecurityGroup),
            "cluster" => Ok(Self::Cluster),
            "image" => Ok(Self::Image),
            other => Err(DomainError::UnknownOnDemandType(other.to_string())),
        }
    }
}

/// Request to refresh one named resource outside the poll schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnDemandRequest {
    pub kind: OnDemandType,
    pub provider: String,
    pub account: String,
    pub region: Option<String>,
    pub name: String,
}

/// An agent able to refresh single resources on request.
///
/// Implementations must build each match's [`CacheResult`] with the same
/// code path their scheduled counterpart uses, so the refreshed entry carries
/// the full relationship set including sibling cross-references.
#[async_trait]
pub trait OnDemandAgent: Send + Sync {
    /// Identity used in logs and metric tags.
    fn on_demand_agent_type(&self) -> &str;

    /// Provider this agent serves.
    fn provider_name(&self) -> &str;

    /// Whether this agent can refresh `kind` resources of `provider`.
    fn handles(&self, kind: OnDemandType, provider: &str) -> bool;

    /// Resolve the named resource; one complete result per provider match.
    async fn resolve(&self, request: &OnDemandRequest) -> DomainResult<Vec<CacheResult>>;

    /// `(namespace, glob)` pairs addressing every cached id that could belong
    /// to the requested name; ids matching these and absent from the fresh
    /// result are evicted.
    fn stale_patterns(&self, request: &OnDemandRequest) -> Vec<(String, String)>;
}
