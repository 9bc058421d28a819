mod app;
mod catalog;
mod cli;
mod commands;
mod config;
mod engine;
mod input;
mod media;
mod picker;
mod theme;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let default_filter = match cli.verbose {
        0 => "deckbooth=info",
        1 => "deckbooth=debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    cli.run()
}
