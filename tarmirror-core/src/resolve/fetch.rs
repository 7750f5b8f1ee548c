use crate::project::{LATEST, Manifest};
use crate::registry::Registry;
use crate::{MirrorError, Result};
use tracing::debug;

/// Fetches the manifest for `name@version_or_tag` and works out `is_latest`.
///
/// A missing version falls back to the registry's `latest` when the registry
/// names one. An unknown `name@version` is retried once without a version;
/// an unknown `name@latest` is final. Everything else propagates.
pub async fn fetch_manifest<R: Registry>(
    registry: &R,
    name: &str,
    version_or_tag: &str,
) -> Result<Manifest> {
    let mut manifest = match registry.manifest(name, Some(version_or_tag)).await {
        Ok(manifest) => manifest,
        Err(MirrorError::TargetMismatch {
            latest: Some(latest),
            ..
        }) => {
            debug!(
                "{}@{} not published, falling back to latest {}",
                name, version_or_tag, latest
            );
            registry.manifest(name, Some(&latest)).await?
        }
        Err(MirrorError::NotFound { .. }) if version_or_tag != LATEST => {
            debug!(
                "{}@{} not found, retrying with registry default",
                name, version_or_tag
            );
            registry.manifest(name, None).await?
        }
        Err(MirrorError::NotFound { .. }) => {
            return Err(MirrorError::NotFound {
                name: name.to_string(),
            });
        }
        Err(error) => return Err(error),
    };

    if manifest.name.is_empty() {
        manifest.name = name.to_string();
    }

    manifest.is_latest = if version_or_tag == LATEST {
        true
    } else {
        let tags = registry.dist_tags(name).await?;
        tags.get(LATEST) == Some(&manifest.version)
    };

    Ok(manifest)
}
