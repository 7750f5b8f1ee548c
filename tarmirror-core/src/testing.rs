//! In-memory stand-ins for the registry and the publisher.

use crate::error::PublishFailure;
use crate::project::{LATEST, Manifest};
use crate::publish::Publisher;
use crate::registry::Registry;
use crate::tarball::TarballName;
use crate::{MirrorError, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct FakePackage {
    versions: BTreeMap<String, Manifest>,
    latest: Option<String>,
}

#[derive(Default)]
pub struct FakeRegistry {
    packages: BTreeMap<String, FakePackage>,
    failing: BTreeSet<String>,
    qualified_not_found: BTreeSet<String>,
    manifest_calls: AtomicUsize,
    requests: Mutex<Vec<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name@version` with runtime dependencies and makes it `latest`.
    pub fn publish(&mut self, name: &str, version: &str, deps: &[(&str, &str)]) -> &mut Self {
        let manifest = Manifest {
            name: name.to_string(),
            version: version.to_string(),
            dependencies: deps
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            ..Manifest::default()
        };
        self.publish_manifest(manifest)
    }

    pub fn publish_manifest(&mut self, manifest: Manifest) -> &mut Self {
        let package = self.packages.entry(manifest.name.clone()).or_default();
        package.latest = Some(manifest.version.clone());
        package.versions.insert(manifest.version.clone(), manifest);
        self
    }

    pub fn set_latest(&mut self, name: &str, version: Option<&str>) -> &mut Self {
        if let Some(package) = self.packages.get_mut(name) {
            package.latest = version.map(str::to_string);
        }
        self
    }

    /// Every lookup for `name` fails with a transport-style error.
    pub fn fail(&mut self, name: &str) -> &mut Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Version-qualified lookups for `name` answer 404; unqualified ones work.
    pub fn not_found_when_qualified(&mut self, name: &str) -> &mut Self {
        self.qualified_not_found.insert(name.to_string());
        self
    }

    /// Every manifest lookup sleeps for `delay` before answering.
    pub fn slow(&mut self, delay: Duration) -> &mut Self {
        self.delay = Some(delay);
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn manifest_calls(&self) -> usize {
        self.manifest_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Registry for FakeRegistry {
    async fn manifest(&self, name: &str, spec: Option<&str>) -> Result<Manifest> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push(format!("{}@{}", name, spec.unwrap_or("<default>")));

        if let Some(delay) = self.delay {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        if self.failing.contains(name) {
            return Err(MirrorError::Registry {
                name: name.to_string(),
                reason: "connection reset".to_string(),
            });
        }

        let package = self.packages.get(name).ok_or_else(|| MirrorError::NotFound {
            name: name.to_string(),
        })?;

        let spec = match spec {
            Some(_) if self.qualified_not_found.contains(name) => {
                return Err(MirrorError::NotFound {
                    name: name.to_string(),
                });
            }
            Some(spec) if spec != LATEST => spec.to_string(),
            _ => package.latest.clone().ok_or_else(|| MirrorError::TargetMismatch {
                name: name.to_string(),
                spec: LATEST.to_string(),
                latest: None,
            })?,
        };

        package
            .versions
            .get(&spec)
            .cloned()
            .ok_or_else(|| MirrorError::TargetMismatch {
                name: name.to_string(),
                spec,
                latest: package.latest.clone(),
            })
    }

    async fn dist_tags(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let package = self.packages.get(name).ok_or_else(|| MirrorError::NotFound {
            name: name.to_string(),
        })?;

        let mut tags = BTreeMap::new();
        if let Some(latest) = &package.latest {
            tags.insert(LATEST.to_string(), latest.clone());
        }
        Ok(tags)
    }
}

/// Answers each publish from a script; `None` entries and an exhausted
/// script succeed. Packages named `broken` always fail.
#[derive(Default)]
pub struct FakePublisher {
    script: Mutex<VecDeque<Option<PublishFailure>>>,
    calls: Mutex<Vec<(PathBuf, Option<String>)>>,
}

impl FakePublisher {
    pub fn scripted(responses: &[Option<PublishFailure>]) -> Self {
        FakePublisher {
            script: Mutex::new(responses.iter().copied().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Publisher for FakePublisher {
    async fn publish(&self, tarball: &Path, package: &TarballName, tag: Option<&str>) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((tarball.to_path_buf(), tag.map(str::to_string)));

        let scripted = if package.name == "broken" {
            Some(PublishFailure::Other)
        } else {
            self.script.lock().unwrap().pop_front().flatten()
        };

        match scripted {
            None => Ok(()),
            Some(kind) => Err(MirrorError::Publish {
                name: package.name.clone(),
                version: package.version.clone(),
                kind,
                message: kind.to_string(),
            }),
        }
    }
}
