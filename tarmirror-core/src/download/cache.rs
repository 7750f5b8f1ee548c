use crate::{MirrorError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Durable record of every `(name, version)` already written to disk.
///
/// Survives across runs, unlike the resolver's memo. A package found here is
/// skipped by the downloader no matter which destination it went to.
#[derive(Debug, Default)]
pub struct DownloadCache {
    path: PathBuf,
    record: BTreeMap<String, BTreeSet<String>>,
}

impl DownloadCache {
    /// Reads the record at `path`. A missing file is an empty record; an
    /// unreadable one is logged and replaced on the next save.
    pub fn load(path: &Path) -> Self {
        let record = match File::open(path) {
            Ok(file) => match bincode::deserialize_from(BufReader::new(file)) {
                Ok(record) => record,
                Err(error) => {
                    warn!(
                        "ignoring unreadable download record {}: {}",
                        path.display(),
                        error
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        let cache = DownloadCache {
            path: path.to_path_buf(),
            record,
        };
        debug!(
            "download record {} holds {} versions",
            path.display(),
            cache.len()
        );
        cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, name: &str, version: &str) -> bool {
        self.record
            .get(name)
            .is_some_and(|versions| versions.contains(version))
    }

    /// Returns `false` when the pair was already recorded.
    pub fn record(&mut self, name: &str, version: &str) -> bool {
        self.record
            .entry(name.to_string())
            .or_default()
            .insert(version.to_string())
    }

    pub fn len(&self) -> usize {
        self.record.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn save(&self) -> Result<()> {
        let write_err = |source| MirrorError::WriteFile {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = self.path.with_extension("bin.tmp");
        let tmp_err = |source| MirrorError::WriteFile {
            path: tmp.clone(),
            source,
        };

        let mut writer = BufWriter::new(File::create(&tmp).map_err(tmp_err)?);
        bincode::serialize_into(&mut writer, &self.record).map_err(|e| {
            MirrorError::Serialize {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;
        writer.flush().map_err(tmp_err)?;
        drop(writer);

        fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }

    /// Deletes the record file. Returns whether there was one.
    pub fn remove(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(MirrorError::WriteFile {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
