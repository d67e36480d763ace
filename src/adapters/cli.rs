//! Command-line interface definitions

use clap::{Parser, Subcommand};

/// SolSentry - resilient position risk engine for Solana tokens
#[derive(Parser, Debug)]
#[command(name = "solsentry", version, about)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the risk evaluation loop
    Run(RunCmd),

    /// Show positions, capital and endpoint health
    Status(StatusCmd),
}

/// Start the risk evaluation loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: String,
}

/// Show stored positions and realized pnl
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: String,
}
