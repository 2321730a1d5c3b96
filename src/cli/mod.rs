pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "catalogctl")]
#[command(about = "Operator CLI for the Catalog API backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Account bootstrap and maintenance")]
    Admin {
        #[command(subcommand)]
        cmd: commands::admin::AdminCommands,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Admin { cmd } => commands::admin::run(cmd).await,
    }
}
