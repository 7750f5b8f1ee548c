use crate::MirrorConfig;
use crate::registry::RegistryPackage;
use std::fs;
use std::path::Path;
use tracing::debug;

pub fn load_metadata(config: &MirrorConfig, name: &str) -> Option<RegistryPackage> {
    let sanitized = sanitize_package_name(name);
    let cache_path = config.metadata_dir().join(&sanitized).join("index.json");

    if !cache_path.exists() {
        return None;
    }

    if !is_fresh(config, &cache_path) {
        debug!("cached metadata for {} is stale, will refetch", name);
        return None;
    }

    let data = fs::read_to_string(&cache_path).ok()?;
    match serde_json::from_str::<RegistryPackage>(&data) {
        Ok(package) => {
            debug!(
                "using cached metadata for {} from {}",
                name,
                cache_path.display()
            );
            Some(package)
        }
        Err(e) => {
            debug!("ignoring unreadable metadata cache for {}: {}", name, e);
            None
        }
    }
}

/// Best effort: a failed write only costs a refetch next time.
pub fn save_metadata(config: &MirrorConfig, name: &str, package: &RegistryPackage) {
    let sanitized = sanitize_package_name(name);
    let cache_dir = config.metadata_dir().join(&sanitized);
    let cache_path = cache_dir.join("index.json");

    if let Err(e) = fs::create_dir_all(&cache_dir) {
        debug!(
            "failed to create metadata cache dir {}: {}",
            cache_dir.display(),
            e
        );
        return;
    }

    match serde_json::to_string(package) {
        Ok(json) => {
            if let Err(e) = fs::write(&cache_path, json) {
                debug!("failed to write metadata cache for {}: {}", name, e);
            } else {
                debug!(
                    "saved metadata cache for {} to {}",
                    name,
                    cache_path.display()
                );
            }
        }
        Err(e) => debug!("failed to serialize metadata for {}: {}", name, e),
    }
}

fn is_fresh(config: &MirrorConfig, cache_path: &Path) -> bool {
    let Some(max_age) = config.metadata_max_age else {
        return false;
    };

    if let Ok(metadata) = fs::metadata(cache_path)
        && let Ok(modified) = metadata.modified()
        && let Ok(elapsed) = modified.elapsed()
    {
        return elapsed < max_age;
    }

    false
}

fn sanitize_package_name(name: &str) -> String {
    name.replace('/', "__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn config_in(dir: &Path, max_age: Option<Duration>) -> MirrorConfig {
        MirrorConfig {
            cache_dir: dir.join("cache"),
            data_dir: dir.join("data"),
            source_registry: "https://registry.example".to_string(),
            target_registry: None,
            concurrency: 4,
            metadata_max_age: max_age,
        }
    }

    fn package() -> RegistryPackage {
        let mut dist_tags = BTreeMap::new();
        dist_tags.insert("latest".to_string(), "1.0.0".to_string());
        RegistryPackage {
            name: "@scope/pkg".to_string(),
            versions: BTreeMap::new(),
            dist_tags,
        }
    }

    #[test]
    fn round_trips_scoped_package_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), Some(Duration::from_secs(600)));

        save_metadata(&config, "@scope/pkg", &package());

        assert!(config.metadata_dir().join("@scope__pkg").is_dir());
        let loaded = load_metadata(&config, "@scope/pkg").unwrap();
        assert_eq!(loaded.name, "@scope/pkg");
        assert_eq!(loaded.dist_tags.get("latest").unwrap(), "1.0.0");
    }

    #[test]
    fn disabled_max_age_never_reuses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), None);

        save_metadata(&config, "pkg", &package());

        assert!(load_metadata(&config, "pkg").is_none());
    }
}
