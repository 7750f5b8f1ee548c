pub mod clean;
pub mod download;
pub mod publish;
pub mod resolve;

use clap::Args;
use std::path::PathBuf;
use tarmirror_core::ResolutionOptions;
use tarmirror_core::operations::MirrorRequest;

/// Inputs shared by `resolve` and `download`.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Packages to mirror, as name or name@version
    pub packages: Vec<String>,

    /// Read root dependencies from this package.json
    #[arg(short = 'm', long = "manifest")]
    pub manifest: Option<PathBuf>,

    /// Add the N most popular packages from the registry search
    #[arg(long = "top", value_parser = clap::value_parser!(u64).range(1..=5250))]
    pub top: Option<u64>,

    /// Follow devDependencies
    #[arg(short = 'D', long = "dev")]
    pub dev: bool,

    /// Follow peerDependencies
    #[arg(long = "peer")]
    pub peer: bool,

    /// Follow optionalDependencies
    #[arg(long = "optional")]
    pub optional: bool,
}

impl SourceArgs {
    pub fn request(&self) -> MirrorRequest {
        MirrorRequest {
            manifest: self.manifest.clone(),
            packages: self.packages.clone(),
            top: self.top.map(|count| count as usize),
            options: ResolutionOptions {
                include_dev: self.dev,
                include_peer: self.peer,
                include_optional: self.optional,
            },
        }
    }
}
