pub mod fetch;
pub mod memo;
pub mod types;

pub use fetch::fetch_manifest;
pub use memo::ResolutionMemo;
pub use types::*;

use crate::Result;
use crate::config::DEFAULT_CONCURRENCY;
use crate::project::Manifest;
use crate::registry::Registry;
use crate::version::normalize_specifier;
use async_recursion::async_recursion;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub type ProgressFn = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Clone, Copy, Debug)]
struct ResolveContext {
    options: ResolutionOptions,
    depth: usize,
}

impl ResolveContext {
    fn descend(self) -> Self {
        ResolveContext {
            options: self.options,
            depth: self.depth + 1,
        }
    }
}

/// Expands manifests into a flat, de-duplicated list of concrete packages.
///
/// Siblings are fetched concurrently, at most `fetch_limit` at a time;
/// subtrees are walked one at a time in edge order so the output is
/// parent-first and stable between runs.
pub struct Resolver<R: Registry> {
    registry: Arc<R>,
    memo: ResolutionMemo,
    on_progress: Option<ProgressFn>,
    fetch_limit: usize,
}

impl<R: Registry> Resolver<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Resolver {
            registry,
            memo: ResolutionMemo::new(),
            on_progress: None,
            fetch_limit: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = limit.max(1);
        self
    }

    pub fn with_progress<F>(mut self, on_progress: F) -> Self
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    pub fn memo(&self) -> &ResolutionMemo {
        &self.memo
    }

    /// Forgets everything resolved so far. Call before each new run.
    pub async fn reset(&self) {
        self.memo.clear().await;
    }

    pub async fn resolve(
        &self,
        manifest: &Manifest,
        options: ResolutionOptions,
    ) -> Vec<ResolvedVersion> {
        let context = ResolveContext { options, depth: 0 };
        let fetched = self.fetch_level(manifest, options).await;

        if fetched.is_empty() {
            return Vec::new();
        }

        let step = 1.0 / fetched.len() as f64;
        let mut completed = 0.0;
        let mut resolved = Vec::new();

        for (edge, result) in fetched {
            if let Some(child) = self.accept(&edge, result).await {
                self.report(ProgressEvent::Resolved {
                    name: child.name.clone(),
                    version: child.version.clone(),
                    depth: 0,
                    fraction: completed,
                });
                resolved.push(ResolvedVersion::of(&child));
                resolved.extend(self.resolve_level(&child, context.descend()).await);
            }

            completed += step;
            self.report(ProgressEvent::RootCompleted {
                name: edge.name,
                fraction: completed,
            });
        }

        resolved
    }

    #[async_recursion]
    async fn resolve_level(
        &self,
        manifest: &Manifest,
        context: ResolveContext,
    ) -> Vec<ResolvedVersion> {
        let fetched = self.fetch_level(manifest, context.options).await;
        let siblings = fetched.len();
        let mut resolved = Vec::new();

        for (index, (edge, result)) in fetched.into_iter().enumerate() {
            let Some(child) = self.accept(&edge, result).await else {
                continue;
            };

            self.report(ProgressEvent::Resolved {
                name: child.name.clone(),
                version: child.version.clone(),
                depth: context.depth,
                fraction: (index + 1) as f64 / siblings as f64,
            });
            resolved.push(ResolvedVersion::of(&child));
            resolved.extend(self.resolve_level(&child, context.descend()).await);
        }

        resolved
    }

    /// Fetches every declared edge that is not memoized yet, concurrently.
    /// Results come back in edge order.
    async fn fetch_level(
        &self,
        manifest: &Manifest,
        options: ResolutionOptions,
    ) -> Vec<(DependencySpec, Result<Manifest>)> {
        let edges = declared_edges(manifest, options);
        if edges.is_empty() {
            return Vec::new();
        }

        let mut pending = Vec::with_capacity(edges.len());
        for edge in edges {
            if self.memo.has(&edge.name, &edge.version_range).await {
                debug!("already resolved {}@{}", edge.name, edge.version_range);
                continue;
            }
            pending.push(edge);
        }

        let registry = self.registry.as_ref();
        let fetches: Vec<_> = pending
            .iter()
            .map(|edge| fetch_manifest(registry, &edge.name, &edge.version_range))
            .collect();
        let results: Vec<_> = stream::iter(fetches)
        .buffered(self.fetch_limit)
        .collect()
        .await;

        pending.into_iter().zip(results).collect()
    }

    /// Keeps a fetched manifest only if it is the first claim on its
    /// `(name, version)`.
    async fn accept(&self, edge: &DependencySpec, result: Result<Manifest>) -> Option<Manifest> {
        match result {
            Ok(manifest) => {
                if self.memo.claim(&manifest.name, &manifest.version).await {
                    Some(manifest)
                } else {
                    debug!(
                        "{}@{} resolved to already seen {}@{}",
                        edge.name, edge.version_range, manifest.name, manifest.version
                    );
                    None
                }
            }
            Err(error) => {
                warn!(
                    "skipping {}@{}: {}",
                    edge.name, edge.version_range, error
                );
                None
            }
        }
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(on_progress) = &self.on_progress {
            on_progress(&event);
        }
    }
}

/// The manifest's edges with specifiers normalized.
///
/// Categories merge in the order dependencies, dev, peer, optional; when a
/// name appears in several, the later category's specifier wins.
pub fn declared_edges(manifest: &Manifest, options: ResolutionOptions) -> Vec<DependencySpec> {
    let mut merged: BTreeMap<&str, &str> = manifest
        .dependencies
        .iter()
        .map(|(name, range)| (name.as_str(), range.as_str()))
        .collect();

    let extra = [
        (options.include_dev, &manifest.dev_dependencies),
        (options.include_peer, &manifest.peer_dependencies),
        (options.include_optional, &manifest.optional_dependencies),
    ];

    for (enabled, category) in extra {
        if enabled {
            merged.extend(
                category
                    .iter()
                    .map(|(name, range)| (name.as_str(), range.as_str())),
            );
        }
    }

    merged
        .into_iter()
        .map(|(name, range)| DependencySpec {
            name: name.to_string(),
            version_range: normalize_specifier(range),
        })
        .collect()
}
