use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::services::sharding::{KeyExtractorKind, ShardingStrategyKind};

/// Project config file, relative to the working directory.
pub const CONFIG_FILE: &str = "fleetcache.yaml";

/// Local overrides, merged over [`CONFIG_FILE`].
pub const LOCAL_CONFIG_FILE: &str = "fleetcache.local.yaml";

/// Environment prefix; nested keys are split on `__`.
pub const ENV_PREFIX: &str = "FLEETCACHE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid pod count: {0}. Must be at least 1")]
    InvalidPodCount(usize),

    #[error("Invalid pod index: {index}. Must be less than pod count {count}")]
    InvalidPodIndex { index: usize, count: usize },

    #[error("Unknown sharding strategy: {0}. Must be one of: modulo, legacy-modulo, canonical-modulo, jump")]
    UnknownShardingStrategy(String),

    #[error("Unknown sharding key: {0}. Must be one of: account, region, agent-type")]
    UnknownShardingKey(String),

    #[error("Invalid tick_interval_ms: {0}. Must be positive")]
    InvalidTickInterval(u64),

    #[error("Invalid max_concurrent_agents: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Invalid default_interval_secs: {0}. Must be positive")]
    InvalidAgentInterval(u64),

    #[error("Invalid default_timeout_secs: {0}. Must be positive")]
    InvalidAgentTimeout(u64),

    #[error("Invalid on_demand.timeout_ms: {0}. Must be positive")]
    InvalidOnDemandTimeout(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. fleetcache.yaml
    /// 3. fleetcache.local.yaml (optional overrides)
    /// 4. Environment variables (FLEETCACHE_* prefix, highest priority)
    ///
    /// Every pod must end up with identical sharding settings; only the pod
    /// index is expected to differ.
    pub fn load() -> Result<Config> {
        Self::load_layered(Some(Path::new(CONFIG_FILE)))
    }

    /// Load with an explicit primary file in place of `fleetcache.yaml`.
    pub fn load_layered(path: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment
            .merge(Yaml::file(LOCAL_CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.pod.count == 0 {
            return Err(ConfigError::InvalidPodCount(config.pod.count));
        }
        if config.pod.index >= config.pod.count {
            return Err(ConfigError::InvalidPodIndex {
                index: config.pod.index,
                count: config.pod.count,
            });
        }

        // Sharding names fail fast; never fall back to a default
        if config.sharding.strategy.parse::<ShardingStrategyKind>().is_err() {
            return Err(ConfigError::UnknownShardingStrategy(
                config.sharding.strategy.clone(),
            ));
        }
        if config.sharding.key.parse::<KeyExtractorKind>().is_err() {
            return Err(ConfigError::UnknownShardingKey(config.sharding.key.clone()));
        }

        if config.scheduler.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidTickInterval(0));
        }
        if config.scheduler.max_concurrent_agents == 0 {
            return Err(ConfigError::InvalidConcurrency(0));
        }
        if config.scheduler.default_interval_secs == 0 {
            return Err(ConfigError::InvalidAgentInterval(0));
        }
        if config.scheduler.default_timeout_secs == 0 {
            return Err(ConfigError::InvalidAgentTimeout(0));
        }
        if config.on_demand.timeout_ms == 0 {
            return Err(ConfigError::InvalidOnDemandTimeout(0));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        let mut providers = HashSet::new();
        for provider in &config.providers {
            if provider.name.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "Provider name cannot be empty".to_string(),
                ));
            }
            if !providers.insert(provider.name.as_str()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "Provider '{}' is configured twice",
                    provider.name
                )));
            }
            for account in &provider.accounts {
                if account.name.is_empty() || account.name.contains('/') {
                    return Err(ConfigError::ValidationFailed(format!(
                        "Provider '{}' has an invalid account name '{}'",
                        provider.name, account.name
                    )));
                }
                if account.regions.iter().any(|r| r.is_empty() || r.contains('/')) {
                    return Err(ConfigError::ValidationFailed(format!(
                        "Account '{}' has an invalid region name",
                        account.name
                    )));
                }
            }
        }

        let mut agents = HashSet::new();
        for agent in config.agent_types() {
            if !agents.insert(agent.clone()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "Agent '{agent}' is configured more than once"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{AccountConfig, ProviderConfig};

    fn provider() -> ProviderConfig {
        ProviderConfig {
            name: "aws".to_string(),
            accounts: vec![AccountConfig {
                name: "prod".to_string(),
                regions: vec!["us-east-1".to_string(), "us-west-2".to_string()],
            }],
            global_kinds: vec!["ImageCachingAgent".to_string()],
            regional_kinds: vec!["ServerGroupCachingAgent".to_string()],
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pod.count, 1);
        assert_eq!(config.sharding.strategy, "modulo");
        assert_eq!(config.sharding.key, "agent-type");
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
pod:
  index: 2
  count: 4
sharding:
  strategy: jump
  key: region
scheduler:
  max_concurrent_agents: 32
providers:
  - name: aws
    accounts:
      - name: prod
        regions: [us-east-1]
    regional_kinds: [ServerGroupCachingAgent]
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.pod.index, 2);
        assert_eq!(config.sharding.strategy, "jump");
        assert_eq!(config.scheduler.max_concurrent_agents, 32);
        assert_eq!(config.scheduler.tick_interval_ms, 1000);
        assert_eq!(
            config.agent_types(),
            vec!["prod/us-east-1/ServerGroupCachingAgent".to_string()]
        );

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_unknown_strategy() {
        let mut config = Config::default();
        config.sharding.strategy = "ring".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::UnknownShardingStrategy(name) => assert_eq!(name, "ring"),
            other => panic!("Expected UnknownShardingStrategy, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_unknown_key() {
        let mut config = Config::default();
        config.sharding.key = "zone".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::UnknownShardingKey(_))
        ));
    }

    #[test]
    fn test_validate_pod_index_out_of_range() {
        let mut config = Config::default();
        config.pod.index = 3;
        config.pod.count = 3;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPodIndex { index: 3, count: 3 })
        ));
    }

    #[test]
    fn test_validate_zero_pods() {
        let mut config = Config::default();
        config.pod.count = 0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPodCount(0))
        ));
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = Config::default();
        config.scheduler.max_concurrent_agents = 0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_account_with_separator() {
        let mut config = Config::default();
        let mut aws = provider();
        aws.accounts[0].name = "prod/main".to_string();
        config.providers.push(aws);

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_validate_duplicate_provider() {
        let mut config = Config::default();
        config.providers.push(provider());
        config.providers.push(provider());

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(msg)) if msg.contains("twice")
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "sharding:\n  strategy: jump\n  key: account\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "sharding:\n  key: region\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.sharding.key, "region", "Override should win");
        assert_eq!(config.sharding.strategy, "jump", "Base value should persist");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_env_override() {
        temp_env::with_vars(
            [
                ("FLEETCACHE_POD__INDEX", Some("1")),
                ("FLEETCACHE_POD__COUNT", Some("3")),
                ("FLEETCACHE_SHARDING__STRATEGY", Some("canonical-modulo")),
            ],
            || {
                let config = ConfigLoader::load_layered(None).expect("env config should load");
                assert_eq!(config.pod.index, 1);
                assert_eq!(config.pod.count, 3);
                assert_eq!(config.sharding.strategy, "canonical-modulo");
            },
        );
    }
}
