//! CLI surface.

use clap::{ArgAction, Parser, Subcommand};

use crate::config::{ServeConfig, StandaloneConfig};
use crate::daemon;

#[derive(Parser, Debug)]
#[command(
    name = "argo-lite",
    version,
    about = "Minimal pull-based GitOps agent"
)]
pub struct Cli {
    /// Debug output (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the multi-target daemon with the HTTP control plane (default).
    Serve,

    /// Watch a single env-configured repository, no control plane.
    Standalone,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn run(cli: Cli) -> crate::Result<()> {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => daemon::run_serve(ServeConfig::from_env()),
        Command::Standalone => daemon::run_standalone(StandaloneConfig::from_env()?),
    }
}
