//! Rich domain objects served by the hydrator.
//!
//! Relationship collections are `Vec`s that stay empty unless the read asked
//! for that direction to be expanded.

use serde::{Deserialize, Serialize};

use super::cache::Attributes;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: String,
    pub application: String,
    pub account: String,
    pub name: String,
    pub server_groups: Vec<ServerGroup>,
    pub load_balancers: Vec<LoadBalancer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerGroup {
    pub id: String,
    pub account: String,
    pub region: String,
    pub cluster: String,
    pub name: String,
    pub attributes: Attributes,
    pub load_balancers: Vec<LoadBalancer>,
    pub instances: Vec<Instance>,
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer {
    pub id: String,
    pub account: String,
    pub region: String,
    pub vpc_id: Option<String>,
    pub name: String,
    pub attributes: Attributes,
    pub server_groups: Vec<ServerGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub account: String,
    pub region: String,
    pub instance_id: String,
    pub attributes: Attributes,
    /// Name of the owning server group, when recorded.
    pub server_group: Option<String>,
}
