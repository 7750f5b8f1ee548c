use crate::archive::unpack_archive;
use crate::config::normalize_registry_url;
use crate::publish::{NpmPublisher, PublishReport, Publisher, collect_tarballs, publish_all};
use crate::{MirrorConfig, MirrorError, Result, console};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct PublishRequest {
    /// A directory of mirrored tarballs or a `.tar` made by `download --archive`.
    pub source: PathBuf,
    pub registry: Option<String>,
    pub concurrency: usize,
}

pub async fn publish(config: &MirrorConfig, request: &PublishRequest) -> Result<PublishReport> {
    let registry = request
        .registry
        .as_deref()
        .map(|value| normalize_registry_url(value.trim()))
        .filter(|value| !value.is_empty())
        .or_else(|| config.target_registry.clone())
        .ok_or(MirrorError::MissingTargetRegistry)?;

    console::step(&format!("Publishing to {registry}..."));
    let publisher = NpmPublisher::new(&registry);
    publish_from(&publisher, &request.source, request.concurrency).await
}

/// Publishes every tarball found at `source` with `publisher`.
pub async fn publish_from<P: Publisher>(
    publisher: &P,
    source: &Path,
    concurrency: usize,
) -> Result<PublishReport> {
    let scratch = tempfile::tempdir().map_err(|source| MirrorError::WriteFile {
        path: std::env::temp_dir(),
        source,
    })?;

    let tarball_dir = if source.is_dir() {
        source.to_path_buf()
    } else if source.is_file() && source.extension().is_some_and(|ext| ext == "tar") {
        let unpacked = scratch.path().join("unpacked");
        debug!("unpacking {} into {}", source.display(), unpacked.display());
        unpack_archive(source, &unpacked)?;
        unpacked
    } else {
        return Err(MirrorError::PublishSource {
            path: source.to_path_buf(),
        });
    };

    let rewrites = scratch.path().join("rewritten");
    fs::create_dir_all(&rewrites).map_err(|source| MirrorError::WriteFile {
        path: rewrites.clone(),
        source,
    })?;

    let tarballs = collect_tarballs(&tarball_dir)?;
    debug!("found {} tarballs in {}", tarballs.len(), tarball_dir.display());

    Ok(publish_all(publisher, tarballs, concurrency, &rewrites).await)
}
