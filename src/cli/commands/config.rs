//! Configuration inspection commands.

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, table, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration after all layers are merged
    Show,

    /// Load and validate the configuration without printing it
    Validate,
}

#[derive(Debug, Serialize)]
pub struct ShowOutput {
    pub config: Config,
    pub agents: usize,
}

impl CommandOutput for ShowOutput {
    fn to_human(&self) -> String {
        let yaml = serde_yaml::to_string(&self.config).unwrap_or_default();
        format!("{yaml}\n# {} agent(s) derived from providers", self.agents)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "config": self.config,
            "agents": self.agents,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub valid: bool,
    pub source: String,
    pub pod_index: usize,
    pub pod_count: usize,
    pub strategy: String,
    pub key: String,
    pub providers: usize,
    pub agents: usize,
}

impl ValidateOutput {
    fn new(config: &Config, source: Option<&Path>) -> Self {
        Self {
            valid: true,
            source: source.map_or_else(
                || "defaults and environment".to_string(),
                |p| p.display().to_string(),
            ),
            pod_index: config.pod.index,
            pod_count: config.pod.count,
            strategy: config.sharding.strategy.clone(),
            key: config.sharding.key.clone(),
            providers: config.providers.len(),
            agents: config.agent_types().len(),
        }
    }
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        let mut t = table(["SETTING", "VALUE"]);
        t.add_row(vec!["source".to_string(), self.source.clone()]);
        t.add_row(vec![
            "pod".to_string(),
            format!("{} of {}", self.pod_index, self.pod_count),
        ]);
        t.add_row(vec!["strategy".to_string(), self.strategy.clone()]);
        t.add_row(vec!["key".to_string(), self.key.clone()]);
        t.add_row(vec!["providers".to_string(), self.providers.to_string()]);
        t.add_row(vec!["agents".to_string(), self.agents.to_string()]);
        format!("Configuration is valid\n{t}")
    }
}

/// `config` commands receive the already loaded configuration; loading is
/// where validation happens, so reaching this point means it passed.
pub fn execute(args: &ConfigArgs, config: &Config, source: Option<&Path>, json: bool) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let out = ShowOutput {
                agents: config.agent_types().len(),
                config: config.clone(),
            };
            output(&out, json);
        }
        ConfigCommands::Validate => {
            ConfigLoader::validate(config)?;
            output(&ValidateOutput::new(config, source), json);
        }
    }
    Ok(())
}
