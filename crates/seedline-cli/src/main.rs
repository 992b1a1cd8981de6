//! Seedline CLI: the `seedline` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Commands::Merge {
            sentences,
            batches,
            snapshot,
            out_dir,
            json,
        } => commands::merge::run(commands::merge::Args {
            config,
            sentences,
            batches,
            snapshot,
            out_dir,
            json,
        }),

        Commands::TilingCheck {
            sentences,
            batches,
            json,
        } => commands::tiling_check::run(config, sentences, batches, json),

        Commands::CollisionCheck {
            sentences,
            units,
            json,
        } => commands::collision_check::run(config, sentences, units, json),

        Commands::Frontier {
            units,
            at,
            window,
            json,
        } => commands::frontier::run(config, units, at, window, json),

        Commands::GateCheck {
            units,
            basket,
            json,
        } => commands::gate_check::run(config, units, basket, json),

        Commands::Lookup { text, units, json } => {
            commands::lookup::run(config, units, text, json)
        }

        Commands::Verify {
            sentences,
            units,
            occurrences,
            json,
        } => commands::verify::run(config, sentences, units, occurrences, json),
    }
}
