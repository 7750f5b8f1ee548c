pub mod clean;
pub mod mirror;
pub mod publish;

pub use clean::{CleanOptions, CleanSummary, clean};
pub use mirror::{MirrorOptions, MirrorRequest, MirrorSummary, build_root, mirror, resolve, resolve_request};
pub use publish::{PublishRequest, publish, publish_from};

#[cfg(test)]
pub(crate) mod tests {
    use crate::MirrorConfig;
    use std::path::Path;

    pub fn test_config(dir: &Path) -> MirrorConfig {
        MirrorConfig {
            cache_dir: dir.join("cache"),
            data_dir: dir.join("data"),
            source_registry: "https://registry.example".to_string(),
            target_registry: None,
            concurrency: 4,
            metadata_max_age: None,
        }
    }
}
