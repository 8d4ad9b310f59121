use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// xdomain: run cross-origin test scenarios against headless contexts.
#[derive(Parser, Debug)]
#[command(name = "xdomain", version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every test of a scenario file and print the results as JSON.
    Run { scenario: PathBuf },
    /// Print the effective configuration as JSON.
    Config,
}

pub fn parse() -> Args {
    Args::parse()
}
