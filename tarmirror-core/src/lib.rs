pub mod archive;
pub mod batch;
pub mod cache;
pub mod config;
pub mod console;
pub mod download;
pub mod error;
pub mod operations;
pub mod project;
pub mod publish;
pub mod registry;
pub mod resolve;
pub mod tarball;
pub mod version;

#[cfg(test)]
mod testing;

pub use config::MirrorConfig;
pub use error::{MirrorError, PublishFailure};
pub use project::Manifest;
pub use resolve::{ResolutionOptions, ResolvedVersion};

pub type Result<T> = std::result::Result<T, MirrorError>;
