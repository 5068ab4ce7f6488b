//! Per-pod agent scheduler.
//!
//! Every tick recomputes ownership from the sharding filter, then starts due
//! cycles for owned agents. Each cycle runs on its own task under a shared
//! concurrency limit, so a slow provider call never delays sibling agents.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::SchedulerConfig;
use crate::domain::ports::{CacheMetrics, CachingAgent, NoopMetrics, Outcome, PollContext, ProviderCache};
use crate::services::cache_applier::{ApplyReport, CacheApplier};
use crate::services::sharding::ShardingFilter;

/// Observable state of one registered agent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentRunState {
    pub agent_type: String,
    pub provider: String,
    pub owned: bool,
    pub running: bool,
    #[serde(skip)]
    pub next_due: Option<Instant>,
    pub last_started: Option<DateTime<Utc>>,
    pub last_outcome: Option<Outcome>,
    pub last_duration_ms: Option<u64>,
    pub last_error: Option<String>,
    pub last_report: Option<ApplyReport>,
    pub consecutive_failures: u32,
}

/// Scheduler-wide counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub ticks: u64,
    pub cycles_started: u64,
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
    pub cycles_timed_out: u64,
    pub pod_index: usize,
    pub pod_count: usize,
    pub owned_agents: usize,
}

/// What one tick decided.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub owned: usize,
    pub not_owned: usize,
    pub started: Vec<String>,
    pub not_due: usize,
    pub still_running: usize,
    pub deferred_for_capacity: usize,
}

struct RegisteredAgent {
    agent: Arc<dyn CachingAgent>,
    state: Arc<Mutex<AgentRunState>>,
}

/// Handle to control a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    stop_flag: Arc<AtomicBool>,
    status: Arc<RwLock<SchedulerStatus>>,
    states: Vec<Arc<Mutex<AgentRunState>>>,
}

impl SchedulerHandle {
    /// Request the scheduler loop to stop after the current tick.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.status.read().await.clone()
    }

    pub async fn agent_states(&self) -> Vec<AgentRunState> {
        let mut states = Vec::with_capacity(self.states.len());
        for state in &self.states {
            states.push(state.lock().await.clone());
        }
        states
    }
}

/// Runs the owned subset of a statically configured agent list.
pub struct AgentScheduler<C>
where
    C: ProviderCache + 'static,
{
    agents: Vec<RegisteredAgent>,
    filter: ShardingFilter,
    applier: Arc<CacheApplier<C>>,
    metrics: Arc<dyn CacheMetrics>,
    config: SchedulerConfig,
    semaphore: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    status: Arc<RwLock<SchedulerStatus>>,
    stop_flag: Arc<AtomicBool>,
}

impl<C> AgentScheduler<C>
where
    C: ProviderCache + 'static,
{
    pub fn new(cache: Arc<C>, filter: ShardingFilter, config: SchedulerConfig) -> Self {
        let permits = config.max_concurrent_agents.max(1);
        Self {
            agents: Vec::new(),
            filter,
            applier: Arc::new(CacheApplier::new(cache)),
            metrics: Arc::new(NoopMetrics),
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
            tasks: Mutex::new(JoinSet::new()),
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the metrics hook for cycle outcomes.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Add an agent; agent types must be unique.
    pub fn register(&mut self, agent: Arc<dyn CachingAgent>) -> DomainResult<()> {
        let agent_type = agent.agent_type().to_string();
        if self.agents.iter().any(|r| r.agent.agent_type() == agent_type) {
            return Err(DomainError::DuplicateAgent(agent_type));
        }
        let state = AgentRunState {
            agent_type,
            provider: agent.provider_name().to_string(),
            ..AgentRunState::default()
        };
        self.agents.push(RegisteredAgent {
            agent,
            state: Arc::new(Mutex::new(state)),
        });
        Ok(())
    }

    pub fn register_all<I>(&mut self, agents: I) -> DomainResult<()>
    where
        I: IntoIterator<Item = Arc<dyn CachingAgent>>,
    {
        agents.into_iter().try_for_each(|agent| self.register(agent))
    }

    pub fn agent_types(&self) -> Vec<&str> {
        self.agents.iter().map(|r| r.agent.agent_type()).collect()
    }

    pub fn filter(&self) -> &ShardingFilter {
        &self.filter
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            stop_flag: self.stop_flag.clone(),
            status: self.status.clone(),
            states: self.agents.iter().map(|r| r.state.clone()).collect(),
        }
    }

    /// Decide ownership for every agent and start the due, owned ones.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let now = Instant::now();
        let pod_index = self.filter.pod_index();
        let pod_count = self.filter.pod_count();

        let mut tasks = self.tasks.lock().await;
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                error!(error = %e, "Caching cycle task failed to join");
            }
        }

        for registered in &self.agents {
            let agent_type = registered.agent.agent_type();
            let mut state = registered.state.lock().await;

            if self.filter.owner_for(agent_type, pod_count) != pod_index {
                if state.owned {
                    debug!(agent = agent_type, pod = pod_index, pod_count, "Agent no longer owned");
                }
                state.owned = false;
                state.next_due = None;
                report.not_owned += 1;
                continue;
            }
            state.owned = true;
            report.owned += 1;

            if state.running {
                report.still_running += 1;
                continue;
            }
            if state.next_due.is_some_and(|due| due > now) {
                report.not_due += 1;
                continue;
            }
            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                report.deferred_for_capacity += 1;
                continue;
            };

            state.running = true;
            state.last_started = Some(Utc::now());
            drop(state);
            report.started.push(agent_type.to_string());

            let ctx = PollContext::new(agent_type, pod_index, pod_count);
            let span = info_span!(
                "caching_cycle",
                agent = agent_type,
                cycle_id = %ctx.cycle_id,
                pod = pod_index
            );
            let cycle = CycleRunner {
                agent: registered.agent.clone(),
                state: registered.state.clone(),
                applier: self.applier.clone(),
                metrics: self.metrics.clone(),
                status: self.status.clone(),
                default_interval: Duration::from_secs(self.config.default_interval_secs),
                default_timeout: Duration::from_secs(self.config.default_timeout_secs),
            };
            tasks.spawn(
                async move {
                    cycle.run(ctx).await;
                    drop(permit);
                }
                .instrument(span),
            );
        }
        drop(tasks);

        {
            let mut status = self.status.write().await;
            status.ticks += 1;
            status.cycles_started += report.started.len() as u64;
            status.pod_index = pod_index;
            status.pod_count = pod_count;
            status.owned_agents = report.owned;
        }

        if !report.started.is_empty() || report.deferred_for_capacity > 0 {
            debug!(
                owned = report.owned,
                started = report.started.len(),
                deferred = report.deferred_for_capacity,
                "Scheduler tick"
            );
        }
        report
    }

    /// Run one cycle for `agent_type` inline, ignoring ownership and schedule.
    pub async fn run_agent_now(&self, agent_type: &str) -> DomainResult<ApplyReport> {
        let registered = self
            .agents
            .iter()
            .find(|r| r.agent.agent_type() == agent_type)
            .ok_or_else(|| DomainError::AgentNotFound(agent_type.to_string()))?;
        let ctx = PollContext::new(agent_type, self.filter.pod_index(), self.filter.pod_count());
        let timeout = registered
            .agent
            .timeout()
            .unwrap_or_else(|| Duration::from_secs(self.config.default_timeout_secs));
        execute_cycle(registered.agent.as_ref(), &self.applier, &ctx, timeout).await
    }

    /// Tick until stopped, then wait for in-flight cycles.
    pub async fn run(&self) {
        {
            let mut status = self.status.write().await;
            status.running = true;
        }
        info!(
            agents = self.agents.len(),
            pod = self.filter.pod_index(),
            strategy = self.filter.strategy().name(),
            key = self.filter.extractor().name(),
            "Agent scheduler started"
        );

        let mut ticker = interval(Duration::from_millis(self.config.tick_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if self.stop_flag.load(Ordering::Acquire) {
                break;
            }
            self.tick().await;
        }

        self.drain().await;
        {
            let mut status = self.status.write().await;
            status.running = false;
        }
        info!("Agent scheduler stopped");
    }

    /// Wait for every in-flight cycle to finish.
    pub async fn drain(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Caching cycle task failed to join");
            }
        }
    }
}

/// Everything a spawned cycle needs, detached from the scheduler borrow.
struct CycleRunner<C: ProviderCache + 'static> {
    agent: Arc<dyn CachingAgent>,
    state: Arc<Mutex<AgentRunState>>,
    applier: Arc<CacheApplier<C>>,
    metrics: Arc<dyn CacheMetrics>,
    status: Arc<RwLock<SchedulerStatus>>,
    default_interval: Duration,
    default_timeout: Duration,
}

impl<C: ProviderCache + 'static> CycleRunner<C> {
    async fn run(self, ctx: PollContext) {
        let agent = self.agent.as_ref();
        let timeout = agent.timeout().unwrap_or(self.default_timeout);
        let interval = agent.interval().unwrap_or(self.default_interval);
        let error_interval = agent.error_interval().unwrap_or(interval);
        let kind = agent.identity().kind;
        let started = Instant::now();

        let outcome = AssertUnwindSafe(execute_cycle(agent, &self.applier, &ctx, timeout))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(DomainError::provider(agent.agent_type(), "caching cycle panicked")));
        let elapsed = started.elapsed();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        let metric = match &outcome {
            Ok(_) => Outcome::Success,
            Err(DomainError::CycleTimeout { .. }) => Outcome::Timeout,
            Err(_) => Outcome::Failure,
        };
        self.metrics
            .record_cycle(agent.provider_name(), &kind, metric, elapsed);

        {
            let mut status = self.status.write().await;
            match metric {
                Outcome::Success => status.cycles_succeeded += 1,
                Outcome::Timeout => status.cycles_timed_out += 1,
                _ => status.cycles_failed += 1,
            }
        }

        let mut state = self.state.lock().await;
        state.running = false;
        state.last_outcome = Some(metric);
        state.last_duration_ms = Some(elapsed_ms);
        match outcome {
            Ok(report) => {
                info!(
                    upserted = report.upserted,
                    merged = report.merged,
                    evicted = report.evicted,
                    elapsed_ms,
                    "Caching cycle completed"
                );
                state.consecutive_failures = 0;
                state.last_error = None;
                state.last_report = Some(report);
                state.next_due = Some(started + interval);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    transient = e.is_transient(),
                    elapsed_ms,
                    "Caching cycle failed; retrying next interval"
                );
                state.consecutive_failures += 1;
                state.last_error = Some(e.to_string());
                state.next_due = Some(started + error_interval);
            }
        }
    }
}

/// Poll then apply. The timeout bounds the provider call; nothing is written
/// unless the poll finished in time.
pub async fn execute_cycle<C: ProviderCache>(
    agent: &dyn CachingAgent,
    applier: &CacheApplier<C>,
    ctx: &PollContext,
    limit: Duration,
) -> DomainResult<ApplyReport> {
    let result = match timeout(limit, agent.load_data(ctx)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(DomainError::CycleTimeout {
                agent: agent.agent_type().to_string(),
                timeout: limit,
            })
        }
    };
    applier.apply(agent, &result, ctx).await
}
