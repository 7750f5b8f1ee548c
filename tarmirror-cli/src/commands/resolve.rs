use super::SourceArgs;
use anyhow::Result;
use clap::Args;
use tarmirror_core::{MirrorConfig, console, operations};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the list as JSON
    #[arg(long = "json")]
    pub json: bool,
}

pub async fn run(args: ResolveArgs, config: &MirrorConfig) -> Result<()> {
    if !args.json {
        console::header("resolve", env!("CARGO_PKG_VERSION"));
    }

    let resolved = operations::resolve(config, &args.source.request()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    for package in &resolved {
        console::package(&package.name, &package.version, package.is_latest);
    }
    console::summary("resolved", resolved.len(), console::elapsed_secs());

    Ok(())
}
