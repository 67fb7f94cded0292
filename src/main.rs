use anyhow::Result;
use clap::Parser;
use log::info;

use dp_harness::cli::commands::{config_command, token_command};
use dp_harness::cli::{Cli, Commands};
use dp_harness::config::HarnessConfig;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Starting dp-harness");

    let config = HarnessConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Token { context } => token_command(&config, context).await,
        Commands::Config => config_command(&config),
    }
}
