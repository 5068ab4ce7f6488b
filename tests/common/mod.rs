//! Common test utilities for integration tests
//!
//! Provides scripted caching and on-demand agents plus logging setup shared
//! across integration test files.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fleetcache::domain::errors::{DomainError, DomainResult};
use fleetcache::domain::models::{escape_glob, AgentDataType, CacheResult, Keys, ServerGroupName};
use fleetcache::domain::ports::{
    CacheMetrics, CachingAgent, OnDemandAgent, OnDemandRequest, OnDemandType, Outcome, PollContext,
};
use fleetcache::services::CacheResultBuilder;

pub const PROVIDER: &str = "aws";

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Id of a server group in the fixture provider.
pub fn server_group_id(account: &str, region: &str, name: &str) -> String {
    Keys::server_group(PROVIDER, account, region, name)
}

/// A poll result holding the named server groups, as a scheduled agent or an
/// on-demand match would build it.
pub fn server_groups_result(account: &str, region: &str, names: &[&str]) -> CacheResult {
    let mut builder = CacheResultBuilder::new();
    let ns = builder.namespace("serverGroups");
    for name in names {
        ns.keep(server_group_id(account, region, name))
            .attribute("name", *name)
            .attribute("account", account)
            .attribute("region", region)
            .relationship(
                "instances",
                Keys::instance(PROVIDER, account, region, &format!("i-{name}")),
            );
    }
    builder.build()
}

/// What the next `load_data` call of a [`ScriptedAgent`] does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return these server groups.
    Serve(Vec<String>),
    /// Fail with a provider error.
    Fail(String),
    /// Sleep, then return these server groups.
    Slow(Duration, Vec<String>),
    /// Panic inside the cycle.
    Panic,
}

impl Step {
    pub fn serve(names: &[&str]) -> Self {
        Self::Serve(names.iter().map(ToString::to_string).collect())
    }
}

/// Scheduled agent for one account/region whose answers are scripted.
///
/// Once the script is exhausted every call serves `fallback`.
pub struct ScriptedAgent {
    agent_type: String,
    account: String,
    region: String,
    types: Vec<AgentDataType>,
    steps: Mutex<VecDeque<Step>>,
    fallback: Vec<String>,
    calls: AtomicUsize,
    interval: Option<Duration>,
    timeout: Option<Duration>,
}

impl ScriptedAgent {
    pub fn new(account: &str, region: &str) -> Self {
        Self {
            agent_type: format!("{account}/{region}/ServerGroupCachingAgent"),
            account: account.to_string(),
            region: region.to_string(),
            types: vec![AgentDataType::authoritative("serverGroups")],
            steps: Mutex::new(VecDeque::new()),
            fallback: Vec::new(),
            calls: AtomicUsize::new(0),
            interval: None,
            timeout: None,
        }
    }

    pub fn with_steps(self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps
            .lock()
            .expect("script lock")
            .extend(steps);
        self
    }

    pub fn with_fallback(mut self, names: &[&str]) -> Self {
        self.fallback = names.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn serve(&self, names: &[String]) -> CacheResult {
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        server_groups_result(&self.account, &self.region, &names)
    }
}

#[async_trait]
impl CachingAgent for ScriptedAgent {
    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn provided_data_types(&self) -> &[AgentDataType] {
        &self.types
    }

    fn key_pattern(&self, namespace: &str) -> Option<String> {
        (namespace == "serverGroups")
            .then(|| Keys::server_group_pattern(PROVIDER, &self.account, &self.region))
    }

    fn interval(&self) -> Option<Duration> {
        self.interval
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn load_data(&self, _ctx: &PollContext) -> DomainResult<CacheResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().expect("script lock").pop_front();
        match step {
            None => Ok(self.serve(&self.fallback)),
            Some(Step::Serve(names)) => Ok(self.serve(&names)),
            Some(Step::Fail(message)) => Err(DomainError::provider(&self.agent_type, message)),
            Some(Step::Slow(delay, names)) => {
                tokio::time::sleep(delay).await;
                Ok(self.serve(&names))
            }
            Some(Step::Panic) => panic!("scripted panic in {}", self.agent_type),
        }
    }
}

/// On-demand agent for server groups whose provider answers are scripted.
pub struct ScriptedOnDemandAgent {
    matches: Mutex<DomainResult<Vec<CacheResult>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedOnDemandAgent {
    /// Resolves to the given results, one per provider match.
    pub fn resolving(matches: Vec<CacheResult>) -> Self {
        Self {
            matches: Mutex::new(Ok(matches)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every resolution with a provider error.
    pub fn failing(message: &str) -> Self {
        Self {
            matches: Mutex::new(Err(DomainError::provider("ServerGroupOnDemand", message))),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OnDemandAgent for ScriptedOnDemandAgent {
    fn on_demand_agent_type(&self) -> &str {
        "ServerGroupOnDemand"
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn handles(&self, kind: OnDemandType, provider: &str) -> bool {
        kind == OnDemandType::ServerGroup && provider == PROVIDER
    }

    async fn resolve(&self, _request: &OnDemandRequest) -> DomainResult<Vec<CacheResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &*self.matches.lock().expect("script lock") {
            Ok(matches) => Ok(matches.clone()),
            Err(DomainError::Provider { agent, message }) => {
                Err(DomainError::provider(agent.clone(), message.clone()))
            }
            Err(other) => Err(DomainError::Cache(other.to_string())),
        }
    }

    fn stale_patterns(&self, request: &OnDemandRequest) -> Vec<(String, String)> {
        let cluster = ServerGroupName::parse(&request.name).cluster;
        let region = request.region.as_deref().map_or_else(|| "*".to_string(), escape_glob);
        vec![(
            "serverGroups".to_string(),
            format!(
                "{PROVIDER}:serverGroups:{}:{}:{region}:{}",
                escape_glob(&cluster),
                escape_glob(&request.account),
                escape_glob(&request.name),
            ),
        )]
    }
}

/// Server group refresh request in the fixture provider.
pub fn server_group_request(account: &str, region: &str, name: &str) -> OnDemandRequest {
    OnDemandRequest {
        kind: OnDemandType::ServerGroup,
        provider: PROVIDER.to_string(),
        account: account.to_string(),
        region: Some(region.to_string()),
        name: name.to_string(),
    }
}

/// Keep a handle on a scripted agent while the scheduler owns a trait object.
pub fn shared<A: CachingAgent + 'static>(agent: A) -> (Arc<A>, Arc<dyn CachingAgent>) {
    let agent = Arc::new(agent);
    let dynamic: Arc<dyn CachingAgent> = agent.clone();
    (agent, dynamic)
}

/// Captures every metric the scheduler or refresher reports.
#[derive(Default)]
pub struct RecordingMetrics {
    /// `(kind, outcome)` per scheduled cycle.
    pub cycles: Mutex<Vec<(String, Outcome)>>,
    /// `(provider, kind, outcome)` per on-demand refresh.
    pub on_demand: Mutex<Vec<(String, String, Outcome)>>,
}

impl CacheMetrics for RecordingMetrics {
    fn record_cycle(&self, _provider: &str, kind: &str, outcome: Outcome, _elapsed: Duration) {
        self.cycles.lock().unwrap().push((kind.to_string(), outcome));
    }

    fn record_on_demand(&self, provider: &str, kind: &str, outcome: Outcome, _elapsed: Duration) {
        self.on_demand
            .lock()
            .unwrap()
            .push((provider.to_string(), kind.to_string(), outcome));
    }
}
