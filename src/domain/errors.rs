//! Domain errors for the fleetcache caching-agent layer.

use std::time::Duration;

use thiserror::Error;

/// Domain-level errors that can occur while scheduling, polling or reading the cache.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Provider call failed for {agent}: {message}")]
    Provider { agent: String, message: String },

    #[error("Malformed provider payload for {agent}: {reason}")]
    MalformedPayload { agent: String, reason: String },

    #[error("Caching cycle for {agent} exceeded its timeout of {}ms", .timeout.as_millis())]
    CycleTimeout { agent: String, timeout: Duration },

    #[error("Cache store error: {0}")]
    Cache(String),

    #[error("Unknown sharding strategy: {0}. Must be one of: modulo, legacy-modulo, canonical-modulo, jump")]
    UnknownShardingStrategy(String),

    #[error("Unknown sharding key extractor: {0}. Must be one of: account, region, agent-type")]
    UnknownKeyExtractor(String),

    #[error("Unknown on-demand type: {0}")]
    UnknownOnDemandType(String),

    #[error("Agent registered more than once: {0}")]
    DuplicateAgent(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    /// Build a transient provider failure for an agent.
    pub fn provider(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Build a malformed-payload failure for an agent.
    pub fn malformed(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            agent: agent.into(),
            reason: reason.into(),
        }
    }

    /// Whether the next scheduled tick may succeed without operator action.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::CycleTimeout { .. })
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DomainError::provider("prod/ServerGroups", "503").is_transient());
        assert!(DomainError::CycleTimeout {
            agent: "prod/ServerGroups".to_string(),
            timeout: Duration::from_secs(1),
        }
        .is_transient());
        assert!(!DomainError::malformed("prod/ServerGroups", "missing name").is_transient());
        assert!(!DomainError::Cache("down".to_string()).is_transient());
    }

    #[test]
    fn test_timeout_message_in_millis() {
        let err = DomainError::CycleTimeout {
            agent: "a".to_string(),
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Caching cycle for a exceeded its timeout of 1500ms");
    }
}
