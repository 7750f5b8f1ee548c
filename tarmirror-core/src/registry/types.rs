use crate::project::Manifest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A registry packument: every published version plus the dist-tags.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RegistryPackage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub versions: BTreeMap<String, RegistryVersion>,
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RegistryVersion {
    #[serde(default)]
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "peerDependencies")]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "optionalDependencies")]
    pub optional_dependencies: BTreeMap<String, String>,
    pub dist: RegistryDist,
}

impl RegistryVersion {
    pub fn into_manifest(self) -> Manifest {
        Manifest {
            name: self.name,
            version: self.version,
            is_latest: false,
            dependencies: self.dependencies,
            dev_dependencies: self.dev_dependencies,
            peer_dependencies: self.peer_dependencies,
            optional_dependencies: self.optional_dependencies,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RegistryDist {
    pub tarball: String,
    #[serde(default)]
    pub integrity: Option<String>,
}
