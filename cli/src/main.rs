#![allow(clippy::exit)]

mod cli;
mod commands;
mod output;
mod timing;

use anyhow::Result;
use clap::Parser as _;

use cli::{Cli, Commands};
use commands::{generate_completions, run_ci, run_compare, run_diff};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    timing::init_tracing(cli.verbose, cli.timing);

    let passed = match cli.command {
        Commands::Compare(args) => run_compare(args).await?,
        Commands::Diff {
            golden,
            candidate,
            policy,
            out,
        } => run_diff(&golden, &candidate, policy, out)?,
        Commands::Ci => {
            run_ci()?;
            true
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
