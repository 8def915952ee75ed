pub mod browse;
pub mod config;
pub mod simulate;

use std::path::Path;

use clap::{Parser, Subcommand};

use tb_domain::config::Config;

/// tagbridge: OPC UA tag discovery served as MCP tools.
#[derive(Debug, Parser)]
#[command(name = "tagbridge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve {
        /// Run the simulated plants in-process, whatever `simulator.enabled` says.
        #[arg(long)]
        simulate: bool,
    },
    /// Run the simulated plants only, until Ctrl-C.
    Simulate,
    /// Connect to servers, print their first tags and read a sample value.
    Browse {
        /// Server to browse (repeatable). Defaults to the known servers.
        #[arg(long = "server")]
        servers: Vec<String>,
        /// How many tags to print per server.
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Include tags under system roots such as `Server`.
        #[arg(long)]
        include_system: bool,
        /// Start the simulated plants in-process before browsing.
        #[arg(long)]
        simulate: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `TB_CONFIG` (or `config.toml`
/// by default). Returns the parsed [`Config`] and the path that was used.
///
/// A missing file means all defaults.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("TB_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<Config> {
    Config::load(Path::new(config_path)).map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))
}
