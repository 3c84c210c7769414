use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};
use anyhow::Result;

use pipeforge::presentation::cli::Cli;
use pipeforge::presentation::cli::commands::RunCommand;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("pipeforge=debug,info")
    } else {
        EnvFilter::new("pipeforge=info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    RunCommand::execute(&cli)?;

    Ok(())
}
