use crate::project::Manifest;
use serde::Serialize;

/// One raw edge from a manifest, before or after normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencySpec {
    pub name: String,
    pub version_range: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVersion {
    pub name: String,
    pub version: String,
    pub is_latest: bool,
}

impl ResolvedVersion {
    pub fn of(manifest: &Manifest) -> Self {
        ResolvedVersion {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            is_latest: manifest.is_latest,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
}

impl PackageKey {
    pub fn new(name: &str, version: &str) -> Self {
        PackageKey {
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

/// Which optional edge categories to follow. Regular `dependencies` are
/// always followed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolutionOptions {
    pub include_dev: bool,
    pub include_peer: bool,
    pub include_optional: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// A package joined the result. At depth 0 `fraction` is the cumulative
    /// share of root edges finished so far; deeper down it is the position
    /// within the current sibling list.
    Resolved {
        name: String,
        version: String,
        depth: usize,
        fraction: f64,
    },
    /// A root edge and its whole subtree are done.
    RootCompleted { name: String, fraction: f64 },
}

impl ProgressEvent {
    pub fn fraction(&self) -> f64 {
        match self {
            ProgressEvent::Resolved { fraction, .. } => *fraction,
            ProgressEvent::RootCompleted { fraction, .. } => *fraction,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            ProgressEvent::Resolved { depth, .. } => *depth,
            ProgressEvent::RootCompleted { .. } => 0,
        }
    }
}
