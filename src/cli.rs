use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bitcoin up/down guessing game backend
#[derive(Parser, Debug)]
#[command(name = "bitguess", version, about)]
pub struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config", env = "BITGUESS_CONFIG_DIR")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run migrations, then start the API server and resolution worker
    Serve,

    /// Run database migrations and exit
    Migrate,
}
