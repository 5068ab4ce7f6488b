//! Agent identity: `{account}[/{region}]/{ResourceKind}`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Parsed form of an agent-type identity string.
///
/// The same string is used as the scheduling identity and as the source of the
/// sharding key, so parsing never fails: a string without `/` is an unscoped
/// global agent whose kind is the whole string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub account: Option<String>,
    pub region: Option<String>,
    pub kind: String,
}

impl AgentIdentity {
    /// Parse an agent-type string.
    ///
    /// `prod/us-east-1/ServerGroupCachingAgent` yields account `prod`, region
    /// `us-east-1` and kind `ServerGroupCachingAgent`. Anything past the second
    /// separator stays part of the kind.
    pub fn parse(agent_type: &str) -> Self {
        let mut parts = agent_type.splitn(3, '/');
        let first = parts.next().unwrap_or_default();
        match (parts.next(), parts.next()) {
            (None, _) => Self {
                account: None,
                region: None,
                kind: first.to_string(),
            },
            (Some(kind), None) => Self {
                account: Some(first.to_string()),
                region: None,
                kind: kind.to_string(),
            },
            (Some(region), Some(kind)) => Self {
                account: Some(first.to_string()),
                region: Some(region.to_string()),
                kind: kind.to_string(),
            },
        }
    }

    /// Identity of an account-wide agent.
    pub fn global(account: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: None,
            kind: kind.into(),
        }
    }

    /// Identity of an agent scoped to one account and region.
    pub fn regional(
        account: impl Into<String>,
        region: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            account: Some(account.into()),
            region: Some(region.into()),
            kind: kind.into(),
        }
    }

    /// Whether this agent has no account scope at all.
    pub fn is_unscoped(&self) -> bool {
        self.account.is_none()
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(account) = &self.account {
            write!(f, "{account}/")?;
        }
        if let Some(region) = &self.region {
            write!(f, "{region}/")?;
        }
        write!(f, "{}", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_regional() {
        let id = AgentIdentity::parse("prod/us-east-1/ClusterCachingAgent");
        assert_eq!(id.account.as_deref(), Some("prod"));
        assert_eq!(id.region.as_deref(), Some("us-east-1"));
        assert_eq!(id.kind, "ClusterCachingAgent");
        assert_eq!(id.to_string(), "prod/us-east-1/ClusterCachingAgent");
    }

    #[test]
    fn test_parse_account_only() {
        let id = AgentIdentity::parse("prod/ImageCachingAgent");
        assert_eq!(id, AgentIdentity::global("prod", "ImageCachingAgent"));
    }

    #[test]
    fn test_parse_unscoped() {
        let id = AgentIdentity::parse("SimpleAgent");
        assert!(id.is_unscoped());
        assert_eq!(id.kind, "SimpleAgent");
        assert_eq!(id.to_string(), "SimpleAgent");
    }

    #[test]
    fn test_extra_separators_stay_in_kind() {
        let id = AgentIdentity::parse("prod/eu-west-1/Kind/extra");
        assert_eq!(id.kind, "Kind/extra");
    }
}
