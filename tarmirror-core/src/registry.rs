pub mod search;
pub mod types;

pub use types::*;

use crate::project::{LATEST, Manifest};
use crate::version::select_version;
use crate::{MirrorConfig, MirrorError, Result, cache};
use futures::lock::Mutex;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Read access to an npm-compatible registry.
pub trait Registry: Send + Sync + 'static {
    /// Manifest for `name@spec`; `None` asks for the registry default.
    ///
    /// Fails with [`MirrorError::NotFound`] when the package is unknown and
    /// with [`MirrorError::TargetMismatch`] when no version satisfies `spec`.
    fn manifest(
        &self,
        name: &str,
        spec: Option<&str>,
    ) -> impl Future<Output = Result<Manifest>> + Send;

    fn dist_tags(&self, name: &str)
    -> impl Future<Output = Result<BTreeMap<String, String>>> + Send;
}

pub struct HttpRegistry {
    config: MirrorConfig,
    client: Client,
    packuments: Mutex<BTreeMap<String, Arc<RegistryPackage>>>,
}

impl HttpRegistry {
    pub fn new(config: &MirrorConfig, client: Client) -> Self {
        HttpRegistry {
            config: config.clone(),
            client,
            packuments: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        self.config.source_registry.trim_end_matches('/')
    }

    pub async fn packument(&self, name: &str) -> Result<Arc<RegistryPackage>> {
        if let Some(package) = self.packuments.lock().await.get(name) {
            return Ok(package.clone());
        }

        let package = match cache::load_metadata(&self.config, name) {
            Some(cached) => cached,
            None => {
                let fetched = self.fetch_packument(name).await?;
                cache::save_metadata(&self.config, name, &fetched);
                fetched
            }
        };

        let package = Arc::new(package);
        self.packuments
            .lock()
            .await
            .insert(name.to_string(), package.clone());

        Ok(package)
    }

    /// Tarball location for one version, preferring the packument's `dist`.
    pub async fn tarball_url(&self, name: &str, version: &str) -> Result<String> {
        let package = self.packument(name).await?;

        if let Some(meta) = package.versions.get(version) {
            return Ok(meta.dist.tarball.clone());
        }

        Ok(conventional_tarball_url(self.base_url(), name, version))
    }

    async fn fetch_packument(&self, name: &str) -> Result<RegistryPackage> {
        let url = format!("{}/{}", self.base_url(), encode_package_name(name));

        // The abbreviated install document drops devDependencies.
        let request = self
            .client
            .get(&url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));

        debug!("registry request: name={} url={}", name, url);
        let started = Instant::now();

        let response = request.send().await.map_err(|source| MirrorError::Http {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        debug!(
            "registry response: name={} status={} in {:.3}s",
            name,
            status.as_u16(),
            started.elapsed().as_secs_f64()
        );

        if status == StatusCode::NOT_FOUND {
            return Err(MirrorError::NotFound {
                name: name.to_string(),
            });
        }

        let package = response
            .error_for_status()
            .map_err(|source| MirrorError::Http {
                url: url.clone(),
                source,
            })?
            .json::<RegistryPackage>()
            .await
            .map_err(|source| MirrorError::Http {
                url: url.clone(),
                source,
            })?;

        debug!(
            "registry decode: name={} versions={} dist_tags={}",
            name,
            package.versions.len(),
            package.dist_tags.len()
        );

        if package.versions.is_empty() {
            return Err(MirrorError::Registry {
                name: name.to_string(),
                reason: "no published versions".to_string(),
            });
        }

        Ok(package)
    }
}

impl Registry for HttpRegistry {
    async fn manifest(&self, name: &str, spec: Option<&str>) -> Result<Manifest> {
        let package = self.packument(name).await?;
        let selected = select_version(name, spec.unwrap_or(LATEST), &package)?;
        Ok(selected.into_manifest())
    }

    async fn dist_tags(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let package = self.packument(name).await?;
        Ok(package.dist_tags.clone())
    }
}

pub fn encode_package_name(name: &str) -> String {
    if name.starts_with('@') {
        name.replace('/', "%2F")
    } else {
        name.to_string()
    }
}

fn conventional_tarball_url(base: &str, name: &str, version: &str) -> String {
    let basename = name.rsplit('/').next().unwrap_or(name);
    format!(
        "{}/{}/-/{}-{}.tgz",
        base.trim_end_matches('/'),
        name,
        basename,
        version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scoped_names_only() {
        assert_eq!(encode_package_name("@types/node"), "@types%2Fnode");
        assert_eq!(encode_package_name("lodash"), "lodash");
    }

    #[test]
    fn builds_conventional_tarball_urls() {
        assert_eq!(
            conventional_tarball_url("https://registry.example/", "@types/node", "20.1.0"),
            "https://registry.example/@types/node/-/node-20.1.0.tgz"
        );
        assert_eq!(
            conventional_tarball_url("https://registry.example", "lodash", "4.17.21"),
            "https://registry.example/lodash/-/lodash-4.17.21.tgz"
        );
    }
}
