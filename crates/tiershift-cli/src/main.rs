use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod completion;
mod dispatch;
mod render;

#[cfg(test)]
mod tests;

#[derive(Parser, Debug)]
#[command(name = "tiershift")]
#[command(about = "Capacity-tier migration manager for foundation installations", long_about = None)]
pub(crate) struct Cli {
    #[arg(long)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    Install {
        tier: String,
    },
    Plan {
        target: String,
        #[arg(long)]
        allow_downgrade: bool,
        #[arg(long)]
        disable_removed_services: bool,
    },
    Migrate {
        target: String,
        #[arg(long)]
        allow_downgrade: bool,
        #[arg(long)]
        disable_removed_services: bool,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
    Rollback {
        tier: Option<String>,
    },
    Backups,
    Uninstall,
    Status {
        #[arg(long)]
        json: bool,
    },
    Doctor,
    Completions {
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dispatch::run_cli(cli)
}
