use crate::resolve::DependencySpec;
use crate::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const LATEST: &str = "latest";

/// A package's own dependency declarations.
///
/// Read either from a local `package.json` or from a registry version
/// document. `is_latest` is never part of the JSON; the manifest fetcher
/// fills it in after comparing against the registry's dist-tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(skip)]
    pub is_latest: bool,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, String>,
}

impl Manifest {
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(MirrorError::ManifestMissing {
                path: path.to_path_buf(),
            });
        }

        let data = fs::read_to_string(path).map_err(|source| MirrorError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&data).map_err(|source| MirrorError::ParseJson {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds a synthetic root whose `dependencies` are the given requests.
    pub fn from_requests(requests: &[DependencySpec]) -> Self {
        let dependencies = requests
            .iter()
            .map(|spec| (spec.name.clone(), spec.version_range.clone()))
            .collect();

        Manifest {
            dependencies,
            ..Manifest::default()
        }
    }
}

/// Parses `name`, `name@version`, `@scope/name` or `@scope/name@version`.
pub fn parse_request(value: &str) -> Result<DependencySpec> {
    let trimmed = value.trim();
    let invalid = |reason: &str| MirrorError::InvalidRequest {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("empty package name"));
    }

    let (name, version) = match trimmed.rfind('@') {
        Some(at) if at > 0 => (&trimmed[..at], &trimmed[at + 1..]),
        _ => (trimmed, ""),
    };

    if name.starts_with('@') && !name.contains('/') {
        return Err(invalid("scoped package names need a '/'"));
    }

    let version = if version.trim().is_empty() {
        LATEST
    } else {
        version.trim()
    };

    Ok(DependencySpec {
        name: name.to_string(),
        version_range: version.to_string(),
    })
}
