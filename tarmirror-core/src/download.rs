pub mod cache;

pub use cache::DownloadCache;

use crate::batch::run_chunked;
use crate::registry::HttpRegistry;
use crate::resolve::ResolvedVersion;
use crate::tarball::TarballName;
use crate::{MirrorError, Result, console};
use futures::StreamExt;
use reqwest::Client;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Where a package version's tarball can be fetched from.
pub trait TarballSource: Send + Sync {
    fn tarball_url(
        &self,
        name: &str,
        version: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

impl TarballSource for HttpRegistry {
    async fn tarball_url(&self, name: &str, version: &str) -> Result<String> {
        HttpRegistry::tarball_url(self, name, version).await
    }
}

#[derive(Clone, Debug)]
pub struct DownloadOptions {
    pub dest: PathBuf,
    pub concurrency: usize,
    /// Skip packages the durable record already lists.
    pub use_cache: bool,
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: Vec<PathBuf>,
    pub skipped: Vec<ResolvedVersion>,
    pub failed: Vec<(ResolvedVersion, String)>,
}

/// Writes one `.tgz` per package into `options.dest`.
///
/// Packages are fetched in chunks of `options.concurrency`. A failed package
/// lands in the report and does not stop the rest. Every success is added to
/// `cache`, which is saved before returning.
pub async fn download_all<S: TarballSource>(
    source: &S,
    client: &Client,
    packages: &[ResolvedVersion],
    cache: &mut DownloadCache,
    options: &DownloadOptions,
) -> Result<DownloadReport> {
    fs::create_dir_all(&options.dest)
        .await
        .map_err(|source| MirrorError::WriteFile {
            path: options.dest.clone(),
            source,
        })?;

    let (pending, skipped) = partition_cached(packages, cache, options.use_cache);
    debug!(
        "download plan: {} to fetch, {} already recorded",
        pending.len(),
        skipped.len()
    );

    let total = pending.len();
    let finished = AtomicUsize::new(0);

    let results = run_chunked(pending, options.concurrency, |package| {
        let finished = &finished;
        async move {
            let result = download_one(source, client, &package, &options.dest).await;
            let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
            console::progress("📦", "downloading", done, total);
            (package, result)
        }
    })
    .await;
    console::clear_line();

    let mut report = DownloadReport {
        skipped,
        ..DownloadReport::default()
    };

    for (package, result) in results {
        match result {
            Ok(path) => {
                cache.record(&package.name, &package.version);
                report.downloaded.push(path);
            }
            Err(error) => {
                warn!("download failed for {}@{}: {}", package.name, package.version, error);
                report.failed.push((package, error.to_string()));
            }
        }
    }

    cache.save()?;
    Ok(report)
}

/// Splits `packages` into those still to fetch and those the record covers.
/// With `use_cache` off nothing is skipped.
pub fn partition_cached(
    packages: &[ResolvedVersion],
    cache: &DownloadCache,
    use_cache: bool,
) -> (Vec<ResolvedVersion>, Vec<ResolvedVersion>) {
    packages
        .iter()
        .cloned()
        .partition(|package| !use_cache || !cache.contains(&package.name, &package.version))
}

async fn download_one<S: TarballSource>(
    source: &S,
    client: &Client,
    package: &ResolvedVersion,
    dest: &Path,
) -> Result<PathBuf> {
    let started = Instant::now();
    let url = source.tarball_url(&package.name, &package.version).await?;
    let target = dest.join(TarballName::of(package).file_name());
    let partial = target.with_extension("tgz.part");

    let written = match stream_to(client, &url, &partial, &target).await {
        Ok(written) => written,
        Err(error) => {
            if fs::remove_file(&partial).await.is_ok() {
                debug!("removed partial download {}", partial.display());
            }
            return Err(error);
        }
    };

    debug!(
        "downloaded {}@{} ({} bytes) in {:.3}s",
        package.name,
        package.version,
        written,
        started.elapsed().as_secs_f64()
    );

    Ok(target)
}

/// Streams `url` into `partial`, then renames it to `target`.
async fn stream_to(client: &Client, url: &str, partial: &Path, target: &Path) -> Result<usize> {
    let http_err = |source| MirrorError::Http {
        url: url.to_string(),
        source,
    };
    let write_err = |source| MirrorError::WriteFile {
        path: partial.to_path_buf(),
        source,
    };

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(http_err)?;

    let mut file = fs::File::create(partial).await.map_err(write_err)?;
    let mut body = response.bytes_stream();
    let mut written = 0usize;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(http_err)?;
        written += chunk.len();
        file.write_all(&chunk).await.map_err(write_err)?;
    }

    file.flush().await.map_err(write_err)?;
    drop(file);

    fs::rename(partial, target)
        .await
        .map_err(|source| MirrorError::WriteFile {
            path: target.to_path_buf(),
            source,
        })?;

    Ok(written)
}
