use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dp-harness")]
#[command(about = "Coordination helpers for parallel document-platform API tests")]
pub struct Cli {
    /// Path to the config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Request an access token and print the Authorization header value
    Token {
        /// Execution context to cache the token under
        #[arg(long)]
        context: Option<String>,
    },
    /// Print the effective configuration with secrets masked
    Config,
}
