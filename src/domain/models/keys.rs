//! Entity identifiers: `{providerId}:{namespace}:{field1}:{field2}:...`.
//!
//! Absent optional string fields serialize as empty segments and absent
//! numeric fields as [`ABSENT_NUMBER`], so every id of a namespace has the same
//! number of segments and glob patterns can address any field positionally.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Sentinel written for an absent numeric key field.
pub const ABSENT_NUMBER: i64 = -1;

const SEPARATOR: char = ':';

/// Known entity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Namespace {
    Applications,
    Clusters,
    ServerGroups,
    LoadBalancers,
    TargetGroups,
    Instances,
    SecurityGroups,
    Images,
    Networks,
    OnDemand,
}

impl Namespace {
    pub const ALL: [Self; 10] = [
        Self::Applications,
        Self::Clusters,
        Self::ServerGroups,
        Self::LoadBalancers,
        Self::TargetGroups,
        Self::Instances,
        Self::SecurityGroups,
        Self::Images,
        Self::Networks,
        Self::OnDemand,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applications => "applications",
            Self::Clusters => "clusters",
            Self::ServerGroups => "serverGroups",
            Self::LoadBalancers => "loadBalancers",
            Self::TargetGroups => "targetGroups",
            Self::Instances => "instances",
            Self::SecurityGroups => "securityGroups",
            Self::Images => "images",
            Self::Networks => "networks",
            Self::OnDemand => "onDemand",
        }
    }

    /// Field names following `{provider}:{namespace}` for this namespace.
    const fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Applications => &["application"],
            Self::Clusters => &["application", "account", "cluster"],
            Self::ServerGroups => &["cluster", "account", "region", "serverGroup"],
            Self::LoadBalancers => &["account", "region", "vpcId", "loadBalancer"],
            Self::TargetGroups => &["account", "region", "targetGroup", "protocol", "port"],
            Self::Instances => &["account", "region", "instanceId"],
            Self::SecurityGroups => &["securityGroup", "id", "region", "account", "vpcId"],
            Self::Images => &["account", "region", "imageId"],
            Self::Networks => &["id", "account", "region"],
            // onDemand ids wrap the id of the refreshed entity
            Self::OnDemand => &[],
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| DomainError::ValidationFailed(format!("Unknown namespace: {s}")))
    }
}

/// Builds and parses entity ids.
pub struct Keys;

impl Keys {
    fn join(provider: &str, namespace: Namespace, fields: &[&str]) -> String {
        let mut key = String::with_capacity(64);
        key.push_str(provider);
        key.push(SEPARATOR);
        key.push_str(namespace.as_str());
        for field in fields {
            key.push(SEPARATOR);
            key.push_str(field);
        }
        key
    }

    fn opt(field: Option<&str>) -> &str {
        field.unwrap_or_default()
    }

    fn num(field: Option<i64>) -> String {
        field.unwrap_or(ABSENT_NUMBER).to_string()
    }

    pub fn application(provider: &str, application: &str) -> String {
        Self::join(provider, Namespace::Applications, &[&application.to_lowercase()])
    }

    pub fn cluster(provider: &str, application: &str, account: &str, cluster: &str) -> String {
        Self::join(
            provider,
            Namespace::Clusters,
            &[&application.to_lowercase(), account, cluster],
        )
    }

    pub fn server_group(provider: &str, account: &str, region: &str, server_group: &str) -> String {
        let names = ServerGroupName::parse(server_group);
        Self::join(
            provider,
            Namespace::ServerGroups,
            &[&names.cluster, account, region, server_group],
        )
    }

    pub fn load_balancer(
        provider: &str,
        account: &str,
        region: &str,
        vpc_id: Option<&str>,
        load_balancer: &str,
    ) -> String {
        Self::join(
            provider,
            Namespace::LoadBalancers,
            &[account, region, Self::opt(vpc_id), load_balancer],
        )
    }

    pub fn target_group(
        provider: &str,
        account: &str,
        region: &str,
        target_group: &str,
        protocol: Option<&str>,
        port: Option<i64>,
    ) -> String {
        Self::join(
            provider,
            Namespace::TargetGroups,
            &[account, region, target_group, Self::opt(protocol), &Self::num(port)],
        )
    }

    pub fn instance(provider: &str, account: &str, region: &str, instance_id: &str) -> String {
        Self::join(provider, Namespace::Instances, &[account, region, instance_id])
    }

    pub fn security_group(
        provider: &str,
        name: &str,
        group_id: &str,
        region: &str,
        account: &str,
        vpc_id: Option<&str>,
    ) -> String {
        Self::join(
            provider,
            Namespace::SecurityGroups,
            &[name, group_id, region, account, Self::opt(vpc_id)],
        )
    }

    pub fn image(provider: &str, account: &str, region: &str, image_id: &str) -> String {
        Self::join(provider, Namespace::Images, &[account, region, image_id])
    }

    pub fn network(provider: &str, network_id: &str, account: &str, region: &str) -> String {
        Self::join(provider, Namespace::Networks, &[network_id, account, region])
    }

    /// Id of the on-demand bookkeeping record for a refreshed entity.
    pub fn on_demand(provider: &str, entity_id: &str) -> String {
        Self::join(provider, Namespace::OnDemand, &[entity_id])
    }

    /// Parse an id into its named fields.
    ///
    /// Always includes `provider` and `type`; returns `None` for ids of
    /// unknown namespaces or with the wrong number of segments. Empty segments
    /// are kept as empty strings.
    pub fn parse(id: &str) -> Option<BTreeMap<&'static str, String>> {
        let mut parts = id.splitn(3, SEPARATOR);
        let provider = parts.next()?;
        let namespace: Namespace = parts.next()?.parse().ok()?;
        let rest = parts.next().unwrap_or_default();

        let mut fields = BTreeMap::new();
        fields.insert("provider", provider.to_string());
        fields.insert("type", namespace.as_str().to_string());

        if namespace == Namespace::OnDemand {
            fields.insert("id", rest.to_string());
            return Some(fields);
        }

        let names = namespace.fields();
        let values: Vec<&str> = rest.split(SEPARATOR).collect();
        if values.len() != names.len() {
            return None;
        }
        for (name, value) in names.iter().zip(values) {
            fields.insert(*name, value.to_string());
        }
        if namespace == Namespace::ServerGroups {
            let sg = ServerGroupName::parse(&fields["serverGroup"]);
            fields.insert("application", sg.application);
            fields.insert("sequence", sg.sequence.unwrap_or(ABSENT_NUMBER).to_string());
        }
        Some(fields)
    }

    /// Glob addressing every server group of one account/region.
    pub fn server_group_pattern(provider: &str, account: &str, region: &str) -> String {
        Self::join(
            provider,
            Namespace::ServerGroups,
            &["*", &escape_glob(account), &escape_glob(region), "*"],
        )
    }

    /// Glob addressing every cluster of one account.
    pub fn cluster_pattern(provider: &str, account: &str) -> String {
        Self::join(provider, Namespace::Clusters, &["*", &escape_glob(account), "*"])
    }

    /// Glob addressing every load balancer of one account/region.
    pub fn load_balancer_pattern(provider: &str, account: &str, region: &str) -> String {
        Self::join(
            provider,
            Namespace::LoadBalancers,
            &[&escape_glob(account), &escape_glob(region), "*", "*"],
        )
    }

    /// Glob addressing every instance of one account/region.
    pub fn instance_pattern(provider: &str, account: &str, region: &str) -> String {
        Self::join(
            provider,
            Namespace::Instances,
            &[&escape_glob(account), &escape_glob(region), "*"],
        )
    }

    /// Glob addressing every security group of one account/region.
    pub fn security_group_pattern(provider: &str, account: &str, region: &str) -> String {
        Self::join(
            provider,
            Namespace::SecurityGroups,
            &["*", "*", &escape_glob(region), &escape_glob(account), "*"],
        )
    }

    /// Glob addressing every image of one account/region.
    pub fn image_pattern(provider: &str, account: &str, region: &str) -> String {
        Self::join(
            provider,
            Namespace::Images,
            &[&escape_glob(account), &escape_glob(region), "*"],
        )
    }
}

/// Escape glob metacharacters so a literal field value matches only itself.
pub fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Components of a `{app}-{stack}-{detail}-v{NNN}` server group name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerGroupName {
    pub application: String,
    pub cluster: String,
    pub sequence: Option<i64>,
}

impl ServerGroupName {
    /// Split a server group name into application, cluster and sequence.
    ///
    /// The sequence is the trailing `-vNNN` suffix; a name without one is its
    /// own cluster.
    pub fn parse(name: &str) -> Self {
        let (cluster, sequence) = match name.rsplit_once("-v") {
            Some((cluster, digits))
                if !cluster.is_empty()
                    && !digits.is_empty()
                    && digits.chars().all(|c| c.is_ascii_digit()) =>
            {
                (cluster, digits.parse().ok())
            }
            _ => (name, None),
        };
        let application = cluster.split('-').next().unwrap_or(cluster);
        Self {
            application: application.to_string(),
            cluster: cluster.to_string(),
            sequence,
        }
    }
}
