use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tarmirror_core::publish::PublishOutcome;
use tarmirror_core::{MirrorConfig, console, operations};

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Directory of mirrored tarballs, or a .tar made by `download --archive`
    pub path: PathBuf,

    /// Registry to publish to (defaults to TARMIRROR_TARGET_REGISTRY)
    #[arg(short = 'r', long = "registry")]
    pub registry: Option<String>,

    /// Publishes in flight at once
    #[arg(short = 'c', long = "concurrency")]
    pub concurrency: Option<usize>,
}

pub async fn run(args: PublishArgs, config: &MirrorConfig) -> Result<()> {
    console::header("publish", env!("CARGO_PKG_VERSION"));

    let request = operations::PublishRequest {
        source: args.path,
        registry: args.registry,
        concurrency: args.concurrency.unwrap_or(config.concurrency),
    };

    let report = operations::publish(config, &request).await?;

    let mut existing = 0;
    for (package, outcome) in &report.published {
        match outcome {
            PublishOutcome::AlreadyPublished => existing += 1,
            PublishOutcome::Published | PublishOutcome::Republished => {
                console::package(&package.name, &package.version, package.is_latest);
            }
        }
    }

    if existing > 0 {
        console::info(&format!("{existing} already present on the target registry"));
    }

    for (path, reason) in &report.failed {
        console::warn(&format!("{}: {}", path.display(), reason));
    }

    console::summary(
        "published",
        report.published.len() - existing,
        console::elapsed_secs(),
    );

    if !report.failed.is_empty() {
        anyhow::bail!("{} tarballs failed to publish", report.failed.len());
    }

    Ok(())
}
