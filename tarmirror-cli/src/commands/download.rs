use super::SourceArgs;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tarmirror_core::{MirrorConfig, console, operations};

#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Directory the tarballs are written to
    #[arg(short = 'd', long = "dest", default_value = "tarballs")]
    pub dest: PathBuf,

    /// Also pack the destination into <dest>.tar
    #[arg(long = "archive")]
    pub archive: bool,

    /// Downloads in flight at once
    #[arg(short = 'c', long = "concurrency")]
    pub concurrency: Option<usize>,

    /// Download even packages the record says were fetched before
    #[arg(long = "no-cache")]
    pub no_cache: bool,
}

pub async fn run(args: DownloadArgs, config: &MirrorConfig) -> Result<()> {
    console::header("download", env!("CARGO_PKG_VERSION"));

    let options = operations::MirrorOptions {
        dest: args.dest,
        archive: args.archive,
        concurrency: args.concurrency.unwrap_or(config.concurrency),
        use_cache: !args.no_cache,
    };

    let summary = operations::mirror(config, &args.source.request(), &options).await?;
    let report = &summary.report;

    if !report.skipped.is_empty() {
        console::info(&format!(
            "{} already downloaded in an earlier run",
            report.skipped.len()
        ));
    }

    for (package, reason) in &report.failed {
        console::warn(&format!("{}@{}: {}", package.name, package.version, reason));
    }

    if let Some(archive) = &summary.archive {
        console::info(&format!("Archive written to {}", archive.display()));
    }

    console::summary("downloaded", report.downloaded.len(), console::elapsed_secs());

    if !report.failed.is_empty() {
        anyhow::bail!(
            "{} of {} packages failed to download",
            report.failed.len(),
            summary.resolved.len()
        );
    }

    Ok(())
}
