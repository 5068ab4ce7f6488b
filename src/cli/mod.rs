//! CLI type definitions and error reporting
//!
//! This module contains the clap command structures for the `fleetcache`
//! binary: shard planning against the configured agent list and
//! configuration inspection.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigArgs;
use commands::shard::ShardArgs;

#[derive(Parser, Debug)]
#[command(name = "fleetcache")]
#[command(about = "Fleetcache - sharded caching-agent fleet", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Primary configuration file (defaults to fleetcache.yaml)
    #[arg(short, long, global = true, env = "FLEETCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Shard ownership planning
    Shard(ShardArgs),

    /// Configuration inspection
    Config(ConfigArgs),
}

/// Print an error in the selected output mode and exit non-zero.
pub fn handle_error(err: &anyhow::Error, json: bool) -> ! {
    if json {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": causes,
        });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_else(|_| err.to_string())
        );
    } else {
        eprintln!("Error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    std::process::exit(1);
}
