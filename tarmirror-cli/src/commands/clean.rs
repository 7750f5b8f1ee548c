use anyhow::Result;
use clap::Args;
use tarmirror_core::{MirrorConfig, console, operations};

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Only clean the registry metadata cache
    #[arg(long = "metadata")]
    pub metadata: bool,

    /// Only forget which versions were downloaded
    #[arg(long = "downloads")]
    pub downloads: bool,
}

pub fn run(args: CleanArgs, config: &MirrorConfig) -> Result<()> {
    console::header("clean", env!("CARGO_PKG_VERSION"));

    let options = build_options(&args);
    let summary = operations::clean(config, &options)?;

    if summary.is_empty() {
        console::info("Nothing to clean.");
        return Ok(());
    }

    println!();
    if options.metadata && summary.metadata_count > 0 {
        console::info(&format!(
            "  Metadata cache:   {:>5} {}  ({})",
            summary.metadata_count,
            pluralize(summary.metadata_count, "entry", "entries"),
            operations::clean::format_bytes(summary.metadata_size)
        ));
    }

    if options.downloads && summary.record_size > 0 {
        console::info(&format!(
            "  Download record:  {:>5} {}  ({})",
            summary.recorded_versions,
            pluralize(summary.recorded_versions, "version", "versions"),
            operations::clean::format_bytes(summary.record_size)
        ));
    }

    println!();
    console::info(&format!(
        "Cleaned {} freed",
        operations::clean::format_bytes(summary.total_size())
    ));

    Ok(())
}

fn build_options(args: &CleanArgs) -> operations::CleanOptions {
    if args.metadata || args.downloads {
        operations::CleanOptions {
            metadata: args.metadata,
            downloads: args.downloads,
        }
    } else {
        operations::CleanOptions::default()
    }
}

fn pluralize<'a>(count: usize, singular: &'a str, plural: &'a str) -> &'a str {
    if count == 1 { singular } else { plural }
}
