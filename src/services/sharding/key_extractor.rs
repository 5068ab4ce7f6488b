//! Sharding key extraction from agent-type strings.

use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::errors::DomainError;

/// Derives the partition key from an agent's identity string.
///
/// Missing or empty input yields `""`, which routes every such agent to the
/// same owner. Extraction never fails.
pub trait ShardingKeyExtractor: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn extract_key<'a>(&self, agent_type: Option<&'a str>) -> &'a str;
}

/// Substring before the first `/`: all agents of one account land together.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountKeyExtractor;

impl ShardingKeyExtractor for AccountKeyExtractor {
    fn name(&self) -> &'static str {
        "account"
    }

    fn extract_key<'a>(&self, agent_type: Option<&'a str>) -> &'a str {
        let agent_type = agent_type.unwrap_or_default();
        agent_type
            .split_once('/')
            .map_or(agent_type, |(account, _)| account)
    }
}

/// Substring before the second `/`: groups by account and region.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionKeyExtractor;

impl ShardingKeyExtractor for RegionKeyExtractor {
    fn name(&self) -> &'static str {
        "region"
    }

    fn extract_key<'a>(&self, agent_type: Option<&'a str>) -> &'a str {
        let agent_type = agent_type.unwrap_or_default();
        match agent_type.match_indices('/').nth(1) {
            Some((second, _)) => &agent_type[..second],
            None => AccountKeyExtractor.extract_key(Some(agent_type)),
        }
    }
}

/// The full agent-type string: best balance, no locality.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentTypeKeyExtractor;

impl ShardingKeyExtractor for AgentTypeKeyExtractor {
    fn name(&self) -> &'static str {
        "agent-type"
    }

    fn extract_key<'a>(&self, agent_type: Option<&'a str>) -> &'a str {
        agent_type.unwrap_or_default()
    }
}

/// Configured name of a key extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExtractorKind {
    Account,
    Region,
    AgentType,
}

impl KeyExtractorKind {
    pub fn build(self) -> Arc<dyn ShardingKeyExtractor> {
        match self {
            Self::Account => Arc::new(AccountKeyExtractor),
            Self::Region => Arc::new(RegionKeyExtractor),
            Self::AgentType => Arc::new(AgentTypeKeyExtractor),
        }
    }
}

impl FromStr for KeyExtractorKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "account" => Ok(Self::Account),
            "region" => Ok(Self::Region),
            "agent-type" | "agent_type" | "agenttype" => Ok(Self::AgentType),
            _ => Err(DomainError::UnknownKeyExtractor(s.to_string())),
        }
    }
}
