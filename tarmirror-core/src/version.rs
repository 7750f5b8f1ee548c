use crate::project::LATEST;
use crate::registry::{RegistryPackage, RegistryVersion};
use crate::{MirrorError, Result};
use tarmirror_semver::Version;

/// Turns a raw dependency specifier into a concrete version or `"latest"`.
///
/// `^`/`~` prefixes are stripped; a valid version is kept as written, anything
/// else is coerced to the first version-looking substring. Specifiers with no
/// recoverable version (dist-tags, `*`, urls without numbers) become `latest`.
pub fn normalize_specifier(raw: &str) -> String {
    let stripped = raw.trim().trim_start_matches(['^', '~']).trim();

    if Version::parse(stripped).is_ok() {
        return stripped.to_string();
    }

    match tarmirror_semver::coerce(stripped) {
        Some(version) => version.to_string(),
        None => LATEST.to_string(),
    }
}

/// Picks the version document a registry would serve for `name@spec`.
///
/// `spec` is a dist-tag or a concrete version, as produced by
/// [`normalize_specifier`]. An exact version only ever matches itself.
pub fn select_version(name: &str, spec: &str, package: &RegistryPackage) -> Result<RegistryVersion> {
    let trimmed = spec.trim();

    if let Some(tag_version) = package.dist_tags.get(trimmed)
        && let Some(meta) = package.versions.get(tag_version)
    {
        return Ok(meta.clone());
    }

    if let Some(meta) = package.versions.get(trimmed) {
        return Ok(meta.clone());
    }

    Err(MirrorError::TargetMismatch {
        name: name.to_string(),
        spec: spec.to_string(),
        latest: package.dist_tags.get(LATEST).cloned(),
    })
}
