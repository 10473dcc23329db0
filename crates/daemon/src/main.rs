use clap::Parser;
use tracing_subscriber::EnvFilter;

use habctl_daemon::cli::{self, Cli, Command, ConfigCommand};
use habctl_daemon::wiring::AppState;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            let (config, _config_path) = cli::load_config()?;
            init_tracing(&config.logging.level);
            run_serve(config)
        }
        Some(Command::Doctor) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::doctor::run(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("habctld {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(default_directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();
}

/// Start the trigger engine ticker and load every script from
/// `scripthost.scripts_dir`, then pump the main-thread queue forever —
/// the single thread permitted to touch host objects reachable from
/// scripts (§5).
fn run_serve(config: habctl_domain::config::Config) -> anyhow::Result<()> {
    tracing::info!("habctld starting");

    for issue in config.validate() {
        match issue.severity {
            habctl_domain::config::ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            habctl_domain::config::ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }

    let state = AppState::new(config);
    state.triggers.start();

    let loaded = state.load_scripts_dir()?;
    tracing::info!(count = loaded, "scripts loaded");

    state.queue.run_forever();
}
