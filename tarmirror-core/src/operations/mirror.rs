use crate::archive::archive_directory;
use crate::download::{DownloadCache, DownloadOptions, DownloadReport, download_all};
use crate::project::{LATEST, Manifest, parse_request};
use crate::registry::search::top_packages;
use crate::registry::{HttpRegistry, Registry};
use crate::resolve::{DependencySpec, ResolutionOptions, ResolvedVersion, Resolver};
use crate::{MirrorConfig, MirrorError, Result, console};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Where the root package list comes from. With no manifest, packages or
/// `top`, `./package.json` is used.
#[derive(Clone, Debug, Default)]
pub struct MirrorRequest {
    pub manifest: Option<PathBuf>,
    pub packages: Vec<String>,
    pub top: Option<usize>,
    pub options: ResolutionOptions,
}

#[derive(Clone, Debug)]
pub struct MirrorOptions {
    pub dest: PathBuf,
    pub archive: bool,
    pub concurrency: usize,
    pub use_cache: bool,
}

#[derive(Debug)]
pub struct MirrorSummary {
    pub resolved: Vec<ResolvedVersion>,
    pub report: DownloadReport,
    pub archive: Option<PathBuf>,
}

/// Resolves the request and writes every package's tarball into
/// `options.dest`, then optionally packs that directory into `{dest}.tar`.
pub async fn mirror(
    config: &MirrorConfig,
    request: &MirrorRequest,
    options: &MirrorOptions,
) -> Result<MirrorSummary> {
    let registry = Arc::new(HttpRegistry::new(config, Client::new()));
    let resolved = resolve_with(&registry, request, options.concurrency).await?;

    let mut cache = DownloadCache::load(&config.download_record_path());
    let download_options = DownloadOptions {
        dest: options.dest.clone(),
        concurrency: options.concurrency,
        use_cache: options.use_cache,
    };

    console::step(&format!(
        "Downloading into {}...",
        options.dest.display()
    ));
    let report = download_all(
        registry.as_ref(),
        registry.client(),
        &resolved,
        &mut cache,
        &download_options,
    )
    .await?;

    let archive = if options.archive {
        let path = archive_path(&options.dest);
        console::step(&format!("Archiving to {}...", path.display()));
        archive_directory(&options.dest, &path)?;
        Some(path)
    } else {
        None
    };

    Ok(MirrorSummary {
        resolved,
        report,
        archive,
    })
}

/// Resolves the request without downloading anything.
pub async fn resolve(config: &MirrorConfig, request: &MirrorRequest) -> Result<Vec<ResolvedVersion>> {
    let registry = Arc::new(HttpRegistry::new(config, Client::new()));
    resolve_with(&registry, request, config.concurrency).await
}

async fn resolve_with(
    registry: &Arc<HttpRegistry>,
    request: &MirrorRequest,
    fetch_limit: usize,
) -> Result<Vec<ResolvedVersion>> {
    let root = build_root(registry, request).await?;

    console::step("Resolving dependencies...");
    let started = Instant::now();
    let resolved = resolve_request(registry.clone(), &root, request.options, fetch_limit).await;
    debug!(
        "resolved {} packages in {:.3}s",
        resolved.len(),
        started.elapsed().as_secs_f64()
    );

    Ok(resolved)
}

/// Builds the synthetic root manifest for a request, running the popularity
/// search when `top` is set.
pub async fn build_root(registry: &HttpRegistry, request: &MirrorRequest) -> Result<Manifest> {
    let mut requests = request
        .packages
        .iter()
        .map(|value| parse_request(value))
        .collect::<Result<Vec<_>>>()?;

    if let Some(count) = request.top {
        console::step(&format!("Searching for the top {count} packages..."));
        let names = top_packages(registry.client(), registry.base_url(), count).await?;
        requests.extend(names.into_iter().map(|name| DependencySpec {
            name,
            version_range: LATEST.to_string(),
        }));
    }

    let manifest = match &request.manifest {
        Some(path) => Some(path.clone()),
        None if request.packages.is_empty() && request.top.is_none() => {
            Some(PathBuf::from("package.json"))
        }
        None => None,
    };

    root_manifest(manifest.as_deref(), &requests)
}

/// Merges explicit requests into the manifest at `manifest`, or into an
/// empty root. Requests win over the manifest's own `dependencies`.
pub fn root_manifest(manifest: Option<&Path>, requests: &[DependencySpec]) -> Result<Manifest> {
    let Some(path) = manifest else {
        if requests.is_empty() {
            return Err(MirrorError::EmptyRequest {
                reason: "no packages requested".to_string(),
            });
        }
        return Ok(Manifest::from_requests(requests));
    };

    let mut root = Manifest::from_path(path)?;
    for spec in requests {
        root.dependencies
            .insert(spec.name.clone(), spec.version_range.clone());
    }

    Ok(root)
}

/// Runs one fresh resolution, drawing a percentage line from the depth-0
/// progress events. At most `fetch_limit` manifests are fetched at once.
pub async fn resolve_request<R: Registry>(
    registry: Arc<R>,
    root: &Manifest,
    options: ResolutionOptions,
    fetch_limit: usize,
) -> Vec<ResolvedVersion> {
    let resolver = Resolver::new(registry)
        .with_fetch_limit(fetch_limit)
        .with_progress(|event| {
            if event.depth() == 0 {
                console::progress_fraction("🔍", "resolving", event.fraction());
            }
        });

    resolver.reset().await;
    let resolved = resolver.resolve(root, options).await;
    console::clear_line();

    resolved
}

/// `{dest}.tar`, next to the mirror directory.
fn archive_path(dest: &Path) -> PathBuf {
    let normalized: PathBuf = dest.components().collect();
    let mut file = normalized.into_os_string();
    file.push(".tar");
    PathBuf::from(file)
}
