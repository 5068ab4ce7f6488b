//! Fleetcache CLI entry point.

use std::path::Path;

use clap::Parser;

use fleetcache::cli::commands::{config, shard};
use fleetcache::cli::{handle_error, Cli, Commands};
use fleetcache::infrastructure::config::{loader::CONFIG_FILE, ConfigLoader};
use fleetcache::infrastructure::logging::{LogConfig, LoggerImpl};

fn main() {
    let cli = Cli::parse();

    if let Some(path) = cli.config.as_deref().filter(|p| !p.exists()) {
        let err = anyhow::anyhow!("Config file not found: {}", path.display());
        handle_error(&err, cli.json);
    }
    let source = cli.config.as_deref().unwrap_or_else(|| Path::new(CONFIG_FILE));
    let loaded = match ConfigLoader::load_layered(Some(source)) {
        Ok(loaded) => loaded,
        Err(err) => handle_error(&err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&loaded.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(&err, cli.json),
    };

    let source = source.exists().then_some(source);
    let result = match cli.command {
        Commands::Shard(args) => shard::execute(args, &loaded, cli.json),
        Commands::Config(args) => config::execute(&args, &loaded, source, cli.json),
    };

    if let Err(err) = result {
        handle_error(&err, cli.json);
    }
}
