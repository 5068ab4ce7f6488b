use serde::{Deserialize, Serialize};

use super::agent::AgentIdentity;

/// Main configuration structure for a fleetcache pod
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// This pod's position in the fleet
    #[serde(default)]
    pub pod: PodConfig,

    /// Shard ownership configuration; must be identical on every pod
    #[serde(default)]
    pub sharding: ShardingConfig,

    /// Agent scheduling configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// On-demand refresh configuration
    #[serde(default)]
    pub on_demand: OnDemandConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Statically configured providers and their agent scopes
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Config {
    /// Every agent identity this fleet schedules, across all providers.
    pub fn agent_types(&self) -> Vec<String> {
        self.providers
            .iter()
            .flat_map(ProviderConfig::agent_types)
            .collect()
    }
}

/// Pod position configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PodConfig {
    /// Zero-based index of this pod
    #[serde(default)]
    pub index: usize,

    /// Fleet size known at startup; later updates come from fleet discovery
    #[serde(default = "default_pod_count")]
    pub count: usize,
}

const fn default_pod_count() -> usize {
    1
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            index: 0,
            count: default_pod_count(),
        }
    }
}

/// Sharding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ShardingConfig {
    /// Strategy name: modulo, legacy-modulo, canonical-modulo, jump
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Key extractor name: account, region, agent-type
    #[serde(default = "default_key")]
    pub key: String,
}

fn default_strategy() -> String {
    "modulo".to_string()
}

fn default_key() -> String {
    "agent-type".to_string()
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            key: default_key(),
        }
    }
}

/// Agent scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// How often ownership and due agents are re-evaluated
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Upper bound on concurrently running caching cycles in this pod
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,

    /// Poll interval for agents that do not declare their own
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: u64,

    /// Cycle timeout for agents that do not declare their own
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_max_concurrent_agents() -> usize {
    16
}

const fn default_interval_secs() -> u64 {
    60
}

const fn default_timeout_secs() -> u64 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_concurrent_agents: default_max_concurrent_agents(),
            default_interval_secs: default_interval_secs(),
            default_timeout_secs: default_timeout_secs(),
        }
    }
}

/// On-demand refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OnDemandConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Request-scoped timeout, independent of agent cycle timeouts
    #[serde(default = "default_on_demand_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_true() -> bool {
    true
}

const fn default_on_demand_timeout_ms() -> u64 {
    30_000
}

impl Default for OnDemandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_on_demand_timeout_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// A provider and the accounts/regions its agents cover
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProviderConfig {
    pub name: String,

    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// Resource kinds polled once per account
    #[serde(default)]
    pub global_kinds: Vec<String>,

    /// Resource kinds polled once per account and region
    #[serde(default)]
    pub regional_kinds: Vec<String>,
}

impl ProviderConfig {
    /// Agent identities for this provider, built once at startup.
    pub fn agent_types(&self) -> Vec<String> {
        let mut agents = Vec::new();
        for account in &self.accounts {
            for kind in &self.global_kinds {
                agents.push(AgentIdentity::global(&account.name, kind).to_string());
            }
            for region in &account.regions {
                for kind in &self.regional_kinds {
                    agents.push(AgentIdentity::regional(&account.name, region, kind).to_string());
                }
            }
        }
        agents
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountConfig {
    pub name: String,

    #[serde(default)]
    pub regions: Vec<String>,
}
