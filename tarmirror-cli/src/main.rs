use anyhow::Result;
use clap::Parser;
use tarmirror_core::{MirrorConfig, console};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_tracing(args.verbose);

    if let Err(error) = run(args).await {
        console::error(&format!("{error:#}"));
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    let config = MirrorConfig::from_env();

    match args.command {
        Command::Resolve(resolve_args) => commands::resolve::run(resolve_args, &config).await,
        Command::Download(download_args) => commands::download::run(download_args, &config).await,
        Command::Publish(publish_args) => commands::publish::run(publish_args, &config).await,
        Command::Clean(clean_args) => commands::clean::run(clean_args, &config),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
