//! Out-of-band refresh of single named resources.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    escape_glob, CacheResult, Namespace, OnDemandConfig, OnDemandRecord, RelationshipFilter,
};
use crate::domain::ports::{
    CacheMetrics, NoopMetrics, OnDemandAgent, OnDemandRequest, OnDemandType, Outcome, ProviderCache,
};

/// Result of a refresh request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OnDemandOutcome {
    /// The resource resolved uniquely and the cache now reflects it.
    Refreshed {
        id: String,
        upserted: usize,
        evicted: Vec<String>,
    },
    /// Nothing or too much matched; the cache is untouched.
    Miss { reason: String },
    /// No registered agent handles this kind and provider.
    Unhandled,
}

impl OnDemandOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }
}

/// Routes refresh requests to the first agent that handles them.
pub struct OnDemandRefresher<C: ProviderCache> {
    cache: Arc<C>,
    agents: Vec<Arc<dyn OnDemandAgent>>,
    metrics: Arc<dyn CacheMetrics>,
    timeout: Duration,
    enabled: bool,
}

impl<C: ProviderCache> OnDemandRefresher<C> {
    pub fn new(cache: Arc<C>, config: &OnDemandConfig) -> Self {
        Self {
            cache,
            agents: Vec::new(),
            metrics: Arc::new(NoopMetrics),
            timeout: Duration::from_millis(config.timeout_ms),
            enabled: config.enabled,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn register(&mut self, agent: Arc<dyn OnDemandAgent>) {
        self.agents.push(agent);
    }

    fn agent_for(&self, kind: OnDemandType, provider: &str) -> Option<&Arc<dyn OnDemandAgent>> {
        self.agents.iter().find(|agent| agent.handles(kind, provider))
    }

    pub fn handles(&self, kind: OnDemandType, provider: &str) -> bool {
        self.enabled && self.agent_for(kind, provider).is_some()
    }

    /// Refresh one resource.
    ///
    /// Provider errors and timeouts are returned before anything is written.
    pub async fn refresh(&self, request: &OnDemandRequest) -> DomainResult<OnDemandOutcome> {
        if !self.enabled {
            return Ok(OnDemandOutcome::Unhandled);
        }
        let Some(agent) = self.agent_for(request.kind, &request.provider) else {
            debug!(kind = %request.kind, provider = request.provider.as_str(), "No on-demand agent");
            return Ok(OnDemandOutcome::Unhandled);
        };

        let started = Instant::now();
        let kind = request.kind.as_str();
        let outcome = self.refresh_with(agent.as_ref(), request).await;
        let metric = match &outcome {
            Ok(OnDemandOutcome::Refreshed { .. }) => Outcome::Success,
            Ok(_) => Outcome::Miss,
            Err(DomainError::CycleTimeout { .. }) => Outcome::Timeout,
            Err(_) => Outcome::Failure,
        };
        self.metrics
            .record_on_demand(&request.provider, kind, metric, started.elapsed());

        match &outcome {
            Ok(OnDemandOutcome::Refreshed { id, evicted, .. }) => info!(
                agent = agent.on_demand_agent_type(),
                id = id.as_str(),
                evicted = evicted.len(),
                "On-demand refresh completed"
            ),
            Ok(OnDemandOutcome::Miss { reason }) => info!(
                agent = agent.on_demand_agent_type(),
                name = request.name.as_str(),
                reason = reason.as_str(),
                "On-demand refresh missed"
            ),
            Ok(OnDemandOutcome::Unhandled) => {}
            Err(e) => warn!(
                agent = agent.on_demand_agent_type(),
                name = request.name.as_str(),
                error = %e,
                "On-demand refresh failed"
            ),
        }
        outcome
    }

    async fn refresh_with(
        &self,
        agent: &dyn OnDemandAgent,
        request: &OnDemandRequest,
    ) -> DomainResult<OnDemandOutcome> {
        let mut results = match timeout(self.timeout, agent.resolve(request)).await {
            Ok(results) => results?,
            Err(_) => {
                return Err(DomainError::CycleTimeout {
                    agent: agent.on_demand_agent_type().to_string(),
                    timeout: self.timeout,
                })
            }
        };

        if results.len() != 1 {
            return Ok(OnDemandOutcome::Miss {
                reason: match results.len() {
                    0 => format!("no {} named {}", request.kind, request.name),
                    n => format!("{n} resources named {} matched", request.name),
                },
            });
        }
        let Some(result) = results.pop() else {
            return Ok(OnDemandOutcome::Miss {
                reason: format!("no {} named {}", request.kind, request.name),
            });
        };

        let primary = request.kind.namespace().as_str();
        let id = match result.entries(primary) {
            [entry] => entry.id.clone(),
            entries => {
                return Ok(OnDemandOutcome::Miss {
                    reason: format!("resolved {} {primary} entries", entries.len()),
                })
            }
        };

        let upserted = self.write(primary, &result).await?;
        let evicted = self.evict_stale(agent, request, &result).await?;

        let record = OnDemandRecord::new(&request.provider, primary, &id, request.kind.as_str());
        self.cache
            .upsert(Namespace::OnDemand.as_str(), vec![record.to_cache_data()])
            .await?;

        Ok(OnDemandOutcome::Refreshed {
            id,
            upserted,
            evicted,
        })
    }

    /// Replace the refreshed entity; supplement its related namespaces.
    async fn write(&self, primary: &str, result: &CacheResult) -> DomainResult<usize> {
        let mut written = 0;
        for (namespace, entries) in result.cache_results() {
            if entries.is_empty() {
                continue;
            }
            written += entries.len();
            if namespace == primary {
                self.cache.upsert(namespace, entries.clone()).await?;
            } else {
                self.cache.merge(namespace, entries.clone()).await?;
            }
        }
        Ok(written)
    }

    async fn evict_stale(
        &self,
        agent: &dyn OnDemandAgent,
        request: &OnDemandRequest,
        result: &CacheResult,
    ) -> DomainResult<Vec<String>> {
        let mut evicted = Vec::new();
        for (namespace, glob) in agent.stale_patterns(request) {
            let fresh = result.ids(&namespace);
            let mut stale: BTreeSet<String> = self
                .cache
                .filter_identifiers(&namespace, &glob)
                .await?
                .into_iter()
                .filter(|id| !fresh.contains(id.as_str()))
                .collect();
            stale.extend(
                result
                    .evictions_for(&namespace)
                    .iter()
                    .filter(|id| !fresh.contains(id.as_str()))
                    .cloned(),
            );
            if stale.is_empty() {
                continue;
            }
            let stale: Vec<String> = stale.into_iter().collect();
            self.cache.evict(&namespace, &stale).await?;
            evicted.extend(stale);
        }
        Ok(evicted)
    }

    /// On-demand records for `provider` not yet superseded by a scheduled cycle.
    pub async fn pending_requests(&self, provider: &str) -> DomainResult<Vec<OnDemandRecord>> {
        let namespace = Namespace::OnDemand.as_str();
        let glob = format!("{}:{namespace}:*", escape_glob(provider));
        let ids = self.cache.filter_identifiers(namespace, &glob).await?;
        let records = self
            .cache
            .get_all(namespace, &ids, &RelationshipFilter::None)
            .await?
            .iter()
            .filter_map(OnDemandRecord::from_cache_data)
            .collect();
        Ok(records)
    }
}
