//! A/B traffic router binary.
//!
//! ```text
//! ab-router -c /etc/ab-router/config.toml        # fresh start
//! ab-router --graceful -c /etc/ab-router/...     # adopt socket on fd 3
//! ```

use clap::Parser;
use std::path::PathBuf;

use ab_router::config::load_config;
use ab_router::lifecycle::{startup, StartupOptions};
use ab_router::observability::init_logging;

#[derive(Debug, Parser)]
#[command(name = "ab-router", version, about = "HTTP A/B traffic router")]
struct Cli {
    /// Resume from the listening socket inherited on fd 3.
    #[arg(long)]
    graceful: bool,

    /// Configuration file (.toml, or .json).
    #[arg(short = 'c', long = "config", default_value = "./config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ab-router: {}: {e}", cli.config.display());
            return Err(e.into());
        }
    };
    init_logging(&config.log)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        graceful = cli.graceful,
        port = config.options.port,
        hosts = config.rules.len(),
        idle_secs = config.timeouts.idle_secs,
        "ab-router starting"
    );

    let options = StartupOptions {
        config_path: cli.config,
        graceful: cli.graceful,
    };
    match startup::run(options, config).await {
        Ok(exit) => {
            tracing::info!(exit = ?exit, "ab-router exiting");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            Err(e.into())
        }
    }
}
