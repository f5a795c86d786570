//! Rapport CLI: the `rapport` command.

mod cli;
mod commands;
mod config;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Friend { command } => commands::friend::run(command),
        Commands::User { command } => commands::user::run(command),
        Commands::Serve { bind, store } => commands::serve::run(bind, store),
    }
}
