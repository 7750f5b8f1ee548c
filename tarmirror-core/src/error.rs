use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Failed to read file {path:?}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },

    #[error("Failed to write file {path:?}: {source}")]
    WriteFile { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse JSON in {path:?}: {source}")]
    ParseJson { path: PathBuf, source: serde_json::Error },

    #[error("Failed to serialize {path:?}: {reason}")]
    Serialize { path: PathBuf, reason: String },

    #[error("Project manifest package.json not found at {path:?}")]
    ManifestMissing { path: PathBuf },

    #[error("HTTP request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Package {name} not found in registry")]
    NotFound { name: String },

    #[error("No version of {name} matches {spec}")]
    TargetMismatch {
        name: String,
        spec: String,
        latest: Option<String>,
    },

    #[error("Registry returned an unusable document for {name}: {reason}")]
    Registry { name: String, reason: String },

    #[error("Invalid package request {value:?}: {reason}")]
    InvalidRequest { value: String, reason: String },

    #[error("Cannot decode package from tarball name {file_name:?}: {reason}")]
    TarballName { file_name: String, reason: String },

    #[error("Archive error at {path:?}: {source}")]
    Archive { path: PathBuf, source: std::io::Error },

    #[error("Failed to publish {name}@{version} ({kind}): {message}")]
    Publish {
        name: String,
        version: String,
        kind: PublishFailure,
        message: String,
    },

    #[error("No target registry; pass --registry or set TARMIRROR_TARGET_REGISTRY")]
    MissingTargetRegistry,

    #[error("Cannot publish from {path:?}: expected a directory of tarballs or a .tar archive")]
    PublishSource { path: PathBuf },

    #[error("Nothing to mirror: {reason}")]
    EmptyRequest { reason: String },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

/// How `npm publish` refused a tarball.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishFailure {
    Conflict,
    Permission,
    Other,
}

impl std::fmt::Display for PublishFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PublishFailure::Conflict => "version already exists",
            PublishFailure::Permission => "permission denied",
            PublishFailure::Other => "publish failed",
        };
        f.write_str(label)
    }
}
