//! Shard planning commands: who owns which agent, and what a resize moves.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::adapters::StaticFleet;
use crate::cli::output::{output, percent, table, CommandOutput};
use crate::domain::models::Config;
use crate::services::{relocation_ratio, KeyExtractorKind, ShardingFilter, ShardingStrategyKind};

#[derive(Args, Debug)]
pub struct ShardArgs {
    #[command(subcommand)]
    pub command: ShardCommands,

    /// Override the configured sharding strategy
    #[arg(long, global = true)]
    pub strategy: Option<String>,

    /// Override the configured sharding key extractor
    #[arg(long, global = true)]
    pub key: Option<String>,

    /// Override the configured pod count
    #[arg(long, global = true)]
    pub pods: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum ShardCommands {
    /// Show the owning pod of each given agent identity
    Owner {
        /// Agent identities, e.g. prod/us-east-1/ServerGroupCachingAgent
        #[arg(required = true)]
        agents: Vec<String>,
    },

    /// Assign every configured agent to a pod
    Plan {
        /// Agent identities to plan instead of the configured ones
        agents: Vec<String>,
    },

    /// Fraction of agents relocated by a fleet resize, per strategy
    Movement {
        /// Fleet size before the resize
        #[arg(long)]
        from: usize,

        /// Fleet size after the resize
        #[arg(long)]
        to: usize,

        /// Agent identities to measure instead of the configured ones
        agents: Vec<String>,
    },
}

// -- Output structs --

#[derive(Debug, Serialize)]
pub struct Assignment {
    pub agent: String,
    pub key: String,
    pub owner: usize,
}

#[derive(Debug, Serialize)]
pub struct OwnerOutput {
    pub strategy: String,
    pub key: String,
    pub pods: usize,
    pub assignments: Vec<Assignment>,
}

impl CommandOutput for OwnerOutput {
    fn to_human(&self) -> String {
        let mut t = table(["AGENT", "SHARD KEY", "OWNER"]);
        for a in &self.assignments {
            t.add_row(vec![a.agent.clone(), a.key.clone(), a.owner.to_string()]);
        }
        format!(
            "strategy={} key={} pods={}\n{t}",
            self.strategy, self.key, self.pods
        )
    }
}

#[derive(Debug, Serialize)]
pub struct PodLoad {
    pub pod: usize,
    pub agents: usize,
}

#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub strategy: String,
    pub key: String,
    pub pods: usize,
    pub load: Vec<PodLoad>,
    pub assignments: Vec<Assignment>,
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        let mut assignments = table(["AGENT", "SHARD KEY", "OWNER"]);
        for a in &self.assignments {
            assignments.add_row(vec![a.agent.clone(), a.key.clone(), a.owner.to_string()]);
        }
        let mut load = table(["POD", "AGENTS"]);
        for l in &self.load {
            load.add_row(vec![l.pod.to_string(), l.agents.to_string()]);
        }
        format!(
            "strategy={} key={} pods={}\n{assignments}\n\nPer-pod load:\n{load}",
            self.strategy, self.key, self.pods
        )
    }
}

#[derive(Debug, Serialize)]
pub struct StrategyMovement {
    pub strategy: String,
    pub moved: usize,
    pub ratio: f64,
}

#[derive(Debug, Serialize)]
pub struct MovementOutput {
    pub key: String,
    pub from: usize,
    pub to: usize,
    pub agents: usize,
    /// Lower bound any strategy can reach: `|to - from| / max(from, to)`.
    pub ideal_ratio: f64,
    pub strategies: Vec<StrategyMovement>,
}

impl CommandOutput for MovementOutput {
    fn to_human(&self) -> String {
        let mut t = table(["STRATEGY", "MOVED", "RATIO"]);
        for s in &self.strategies {
            t.add_row(vec![s.strategy.clone(), s.moved.to_string(), percent(s.ratio)]);
        }
        format!(
            "{} -> {} pods, {} agents, key={} (ideal {})\n{t}",
            self.from,
            self.to,
            self.agents,
            self.key,
            percent(self.ideal_ratio)
        )
    }
}

struct Planner {
    filter: ShardingFilter,
    strategy: String,
    key: String,
    pods: usize,
}

impl Planner {
    fn new(args: &ShardArgs, config: &Config) -> Result<Self> {
        let strategy = args.strategy.as_deref().unwrap_or(&config.sharding.strategy);
        let key = args.key.as_deref().unwrap_or(&config.sharding.key);
        let pods = args.pods.unwrap_or(config.pod.count);
        if pods == 0 {
            bail!("Pod count must be at least 1");
        }
        let fleet = Arc::new(StaticFleet::new(config.pod.index.min(pods - 1), pods));
        let filter = ShardingFilter::from_names(strategy, key, fleet)
            .context("Invalid sharding configuration")?;
        Ok(Self {
            strategy: filter.strategy().name().to_string(),
            key: filter.extractor().name().to_string(),
            filter,
            pods,
        })
    }

    fn assign(&self, agents: &[String]) -> Vec<Assignment> {
        agents
            .iter()
            .map(|agent| Assignment {
                agent: agent.clone(),
                key: self.filter.extractor().extract_key(Some(agent)).to_string(),
                owner: self.filter.owner_for(agent, self.pods),
            })
            .collect()
    }
}

fn agents_or_configured(agents: Vec<String>, config: &Config) -> Result<Vec<String>> {
    let agents = if agents.is_empty() {
        config.agent_types()
    } else {
        agents
    };
    if agents.is_empty() {
        bail!("No agents configured; pass agent identities or add providers to the configuration");
    }
    Ok(agents)
}

fn plan(planner: &Planner, agents: &[String]) -> PlanOutput {
    let assignments = planner.assign(agents);
    let mut counts: BTreeMap<usize, usize> = (0..planner.pods).map(|pod| (pod, 0)).collect();
    for a in &assignments {
        *counts.entry(a.owner).or_default() += 1;
    }
    PlanOutput {
        strategy: planner.strategy.clone(),
        key: planner.key.clone(),
        pods: planner.pods,
        load: counts
            .into_iter()
            .map(|(pod, agents)| PodLoad { pod, agents })
            .collect(),
        assignments,
    }
}

fn movement(
    args: &ShardArgs,
    config: &Config,
    agents: &[String],
    from: usize,
    to: usize,
) -> Result<MovementOutput> {
    if from == 0 || to == 0 {
        bail!("Fleet sizes must be at least 1");
    }
    let extractor = args
        .key
        .as_deref()
        .unwrap_or(&config.sharding.key)
        .parse::<KeyExtractorKind>()?
        .build();
    let mut strategies = Vec::new();
    // legacy-modulo is an alias of modulo
    for kind in ShardingStrategyKind::ALL
        .into_iter()
        .filter(|k| *k != ShardingStrategyKind::LegacyModulo)
    {
        let filter = ShardingFilter::new(
            kind.build(),
            Arc::clone(&extractor),
            Arc::new(StaticFleet::new(0, from)),
        );
        let moved = agents
            .iter()
            .filter(|a| filter.owner_for(a, from) != filter.owner_for(a, to))
            .count();
        strategies.push(StrategyMovement {
            strategy: filter.strategy().name().to_string(),
            moved,
            ratio: relocation_ratio(&filter, agents.iter().map(String::as_str), from, to),
        });
    }
    #[allow(clippy::cast_precision_loss)]
    let ideal_ratio = from.abs_diff(to) as f64 / from.max(to) as f64;
    Ok(MovementOutput {
        key: extractor.name().to_string(),
        from,
        to,
        agents: agents.len(),
        ideal_ratio,
        strategies,
    })
}

pub fn execute(args: ShardArgs, config: &Config, json: bool) -> Result<()> {
    match &args.command {
        ShardCommands::Owner { agents } => {
            let planner = Planner::new(&args, config)?;
            let out = OwnerOutput {
                strategy: planner.strategy.clone(),
                key: planner.key.clone(),
                pods: planner.pods,
                assignments: planner.assign(agents),
            };
            output(&out, json);
        }
        ShardCommands::Plan { agents } => {
            let planner = Planner::new(&args, config)?;
            let agents = agents_or_configured(agents.clone(), config)?;
            output(&plan(&planner, &agents), json);
        }
        ShardCommands::Movement { from, to, agents } => {
            let agents = agents_or_configured(agents.clone(), config)?;
            output(&movement(&args, config, &agents, *from, *to)?, json);
        }
    }
    Ok(())
}
