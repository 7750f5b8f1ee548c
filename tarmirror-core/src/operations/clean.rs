use crate::download::DownloadCache;
use crate::{MirrorConfig, MirrorError, Result, console};
use std::fs;
use std::path::Path;

#[derive(Debug, Default)]
pub struct CleanSummary {
    pub metadata_count: usize,
    pub metadata_size: u64,
    pub recorded_versions: usize,
    pub record_size: u64,
}

impl CleanSummary {
    pub fn total_size(&self) -> u64 {
        self.metadata_size + self.record_size
    }

    pub fn is_empty(&self) -> bool {
        self.metadata_count == 0 && self.record_size == 0
    }
}

#[derive(Debug, Clone)]
pub struct CleanOptions {
    pub metadata: bool,
    pub downloads: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            metadata: true,
            downloads: true,
        }
    }
}

pub fn analyze(config: &MirrorConfig, options: &CleanOptions) -> Result<CleanSummary> {
    let mut summary = CleanSummary::default();

    if options.metadata {
        let (count, size) = count_directory_contents(&config.metadata_dir())?;
        summary.metadata_count = count;
        summary.metadata_size = size;
    }

    if options.downloads {
        let record = config.download_record_path();
        if record.is_file() {
            summary.recorded_versions = DownloadCache::load(&record).len();
            summary.record_size = directory_size(&record);
        }
    }

    Ok(summary)
}

/// Removes the metadata cache and/or the durable download record.
/// Mirrored tarballs on disk are never touched.
pub fn clean(config: &MirrorConfig, options: &CleanOptions) -> Result<CleanSummary> {
    let summary = analyze(config, options)?;

    if options.metadata {
        let metadata_directory = config.metadata_dir();
        if metadata_directory.exists() {
            console::step("Removing registry metadata cache...");
            fs::remove_dir_all(&metadata_directory).map_err(|source| {
                MirrorError::WriteFile {
                    path: metadata_directory.clone(),
                    source,
                }
            })?;
        }
    }

    if options.downloads && DownloadCache::remove(&config.download_record_path())? {
        console::step("Removing download record...");
    }

    Ok(summary)
}

fn count_directory_contents(path: &Path) -> Result<(usize, u64)> {
    if !path.exists() {
        return Ok((0, 0));
    }

    let entries = fs::read_dir(path).map_err(|source| MirrorError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let count = entries.filter_map(|entry| entry.ok()).count();
    Ok((count, directory_size(path)))
}

fn directory_size(path: &Path) -> u64 {
    if path.is_file() {
        return path.metadata().map(|metadata| metadata.len()).unwrap_or(0);
    }

    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| directory_size(&entry.path()))
        .sum()
}

pub fn format_bytes(bytes: u64) -> String {
    const KILOBYTE: u64 = 1024;
    const MEGABYTE: u64 = KILOBYTE * 1024;

    if bytes >= MEGABYTE {
        format!("{:.2} MB", bytes as f64 / MEGABYTE as f64)
    } else if bytes >= KILOBYTE {
        format!("{:.2} KB", bytes as f64 / KILOBYTE as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
