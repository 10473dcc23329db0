pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};
use habctl_domain::config::Config;

/// habctld — the sandboxed scripting host and time/astronomy trigger
/// engine for a home-automation controller.
#[derive(Debug, Parser)]
#[command(name = "habctld", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the scheduler and script host (default when no subcommand is
    /// given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
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

/// Load `$HABCTL_CONFIG` (default `config.toml`), falling back to
/// [`Config::default`] when the file doesn't exist.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("HABCTL_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}
