use crate::{MirrorError, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path};
use tar::{Archive, Builder};
use tracing::debug;

/// Packs every file under `dir` into an uncompressed `.tar` at `output`.
pub fn archive_directory(dir: &Path, output: &Path) -> Result<()> {
    let archive_err = |source| MirrorError::Archive {
        path: output.to_path_buf(),
        source,
    };

    let file = File::create(output).map_err(archive_err)?;
    let mut builder = Builder::new(file);
    builder.append_dir_all(".", dir).map_err(archive_err)?;
    builder.into_inner().map_err(archive_err)?;

    Ok(())
}

pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<()> {
    let archive_err = |source| MirrorError::Archive {
        path: archive.to_path_buf(),
        source,
    };

    let file = File::open(archive).map_err(archive_err)?;
    fs::create_dir_all(dest).map_err(|source| MirrorError::WriteFile {
        path: dest.to_path_buf(),
        source,
    })?;
    Archive::new(file).unpack(dest).map_err(archive_err)?;

    Ok(())
}

/// Copies the `.tgz` at `tarball` to `output`, dropping
/// `publishConfig.registry` from its top-level `package.json`.
///
/// Returns whether the manifest carried an override.
pub fn strip_registry_override(tarball: &Path, output: &Path) -> Result<bool> {
    let read_err = |source| MirrorError::Archive {
        path: tarball.to_path_buf(),
        source,
    };
    let write_err = |source| MirrorError::Archive {
        path: output.to_path_buf(),
        source,
    };

    let mut source = Archive::new(GzDecoder::new(File::open(tarball).map_err(read_err)?));
    let encoder = GzEncoder::new(File::create(output).map_err(write_err)?, Compression::default());
    let mut builder = Builder::new(encoder);
    let mut stripped = false;

    for entry in source.entries().map_err(read_err)? {
        let mut entry = entry.map_err(read_err)?;
        let path = entry.path().map_err(read_err)?.into_owned();
        let mut header = entry.header().clone();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(read_err)?;

        if is_top_level_manifest(&path) {
            let (rewritten, changed) = rewrite_manifest(tarball, &data)?;
            if changed {
                debug!("removed publishConfig.registry from {}", tarball.display());
                data = rewritten;
                stripped = true;
            }
        }

        header.set_size(data.len() as u64);
        builder
            .append_data(&mut header, &path, data.as_slice())
            .map_err(write_err)?;
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(write_err)?;

    Ok(stripped)
}

fn is_top_level_manifest(path: &Path) -> bool {
    let parts: Vec<_> = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    parts.len() == 2 && path.file_name().is_some_and(|name| name == "package.json")
}

fn rewrite_manifest(tarball: &Path, data: &[u8]) -> Result<(Vec<u8>, bool)> {
    let mut manifest: serde_json::Value =
        serde_json::from_slice(data).map_err(|source| MirrorError::ParseJson {
            path: tarball.to_path_buf(),
            source,
        })?;

    let Some(publish_config) = manifest
        .get_mut("publishConfig")
        .and_then(|value| value.as_object_mut())
    else {
        return Ok((data.to_vec(), false));
    };

    if publish_config.remove("registry").is_none() {
        return Ok((data.to_vec(), false));
    }

    if publish_config.is_empty()
        && let Some(object) = manifest.as_object_mut()
    {
        object.remove("publishConfig");
    }

    let rewritten =
        serde_json::to_vec_pretty(&manifest).map_err(|e| MirrorError::Serialize {
            path: tarball.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok((rewritten, true))
}

#[cfg(test)]
pub(crate) fn write_test_tarball(path: &Path, package_json: &str) {
    let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    let mut builder = Builder::new(encoder);

    for (name, body) in [
        ("package/package.json", package_json),
        ("package/index.js", "module.exports = 42;\n"),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, body.as_bytes()).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn read_entries(path: &Path) -> BTreeMap<String, String> {
        let mut archive = Archive::new(GzDecoder::new(File::open(path).unwrap()));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry.path().unwrap().display().to_string();
                let mut body = String::new();
                entry.read_to_string(&mut body).unwrap();
                (name, body)
            })
            .collect()
    }

    #[test]
    fn strips_only_the_registry_override() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pkg-1.0.0.tgz");
        let output = dir.path().join("out.tgz");
        write_test_tarball(
            &input,
            r#"{"name":"pkg","version":"1.0.0","publishConfig":{"registry":"https://private.example","access":"public"}}"#,
        );

        assert!(strip_registry_override(&input, &output).unwrap());

        let entries = read_entries(&output);
        let manifest: serde_json::Value =
            serde_json::from_str(&entries["package/package.json"]).unwrap();
        assert!(manifest["publishConfig"].get("registry").is_none());
        assert_eq!(manifest["publishConfig"]["access"], "public");
        assert_eq!(entries["package/index.js"], "module.exports = 42;\n");
    }

    #[test]
    fn drops_empty_publish_config() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pkg-1.0.0.tgz");
        let output = dir.path().join("out.tgz");
        write_test_tarball(
            &input,
            r#"{"name":"pkg","version":"1.0.0","publishConfig":{"registry":"https://private.example"}}"#,
        );

        assert!(strip_registry_override(&input, &output).unwrap());

        let entries = read_entries(&output);
        let manifest: serde_json::Value =
            serde_json::from_str(&entries["package/package.json"]).unwrap();
        assert!(manifest.get("publishConfig").is_none());
    }

    #[test]
    fn leaves_manifest_without_override_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pkg-1.0.0.tgz");
        let output = dir.path().join("out.tgz");
        let original = r#"{"name":"pkg","version":"1.0.0"}"#;
        write_test_tarball(&input, original);

        assert!(!strip_registry_override(&input, &output).unwrap());
        assert_eq!(read_entries(&output)["package/package.json"], original);
    }

    #[test]
    fn archives_and_unpacks_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = dir.path().join("mirror");
        fs::create_dir_all(&mirror).unwrap();
        fs::write(mirror.join("a-1.0.0.tgz"), b"tarball").unwrap();

        let tar_path = dir.path().join("mirror.tar");
        archive_directory(&mirror, &tar_path).unwrap();

        let restored = dir.path().join("restored");
        unpack_archive(&tar_path, &restored).unwrap();
        assert_eq!(fs::read(restored.join("a-1.0.0.tgz")).unwrap(), b"tarball");
    }
}
