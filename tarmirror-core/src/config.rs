use directories::{BaseDirs, ProjectDirs};
use std::time::Duration;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";
pub const DEFAULT_CONCURRENCY: usize = 20;
const DEFAULT_METADATA_MAX_AGE_MINUTES: u64 = 30;

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
    pub source_registry: String,
    pub target_registry: Option<String>,
    pub concurrency: usize,
    pub metadata_max_age: Option<Duration>,
}

impl MirrorConfig {
    pub fn from_env() -> Self {
        let (cache_dir, data_dir) = if let Ok(home) = env::var("TARMIRROR_HOME") {
            let base = PathBuf::from(home);
            (base.join("cache"), base.join("data"))
        } else {
            match ProjectDirs::from("io", "tarmirror", "tarmirror") {
                Some(dirs) => (
                    dirs.cache_dir().to_path_buf(),
                    dirs.data_local_dir().to_path_buf(),
                ),
                None => {
                    let fallback = PathBuf::from(".tarmirror");
                    (fallback.join("cache"), fallback.join("data"))
                }
            }
        };

        let target_registry = env::var("TARMIRROR_TARGET_REGISTRY")
            .ok()
            .map(|value| normalize_registry_url(value.trim()))
            .filter(|value| !value.is_empty());

        MirrorConfig {
            cache_dir,
            data_dir,
            source_registry: read_source_registry(),
            target_registry,
            concurrency: read_concurrency_from_env(),
            metadata_max_age: read_metadata_max_age_from_env(),
        }
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.cache_dir.join("metadata")
    }

    pub fn download_record_path(&self) -> PathBuf {
        self.data_dir.join("downloaded.bin")
    }
}

fn read_concurrency_from_env() -> usize {
    env::var("TARMIRROR_CONCURRENCY")
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_CONCURRENCY)
}

fn read_metadata_max_age_from_env() -> Option<Duration> {
    let raw = env::var("TARMIRROR_METADATA_MAX_AGE_MINUTES").ok();
    parse_metadata_max_age(raw.as_deref())
}

/// `0` disables reuse; anything unparsable falls back to the default.
fn parse_metadata_max_age(raw: Option<&str>) -> Option<Duration> {
    let minutes = raw
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_METADATA_MAX_AGE_MINUTES);

    if minutes == 0 {
        None
    } else {
        Some(Duration::from_secs(minutes.saturating_mul(60)))
    }
}

fn read_source_registry() -> String {
    let mut registry = DEFAULT_REGISTRY.to_string();

    // 1) Global rc file in the user's home directory.
    if let Some(base) = BaseDirs::new() {
        apply_rc_file(&base.home_dir().join(".npmrc"), &mut registry);
    }

    // 2) Repo-level rc file in the current working directory.
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    apply_rc_file(&cwd.join(".npmrc"), &mut registry);

    // 3) Env overrides the default registry (npm-compatible).
    if let Ok(value) = env::var("NPM_CONFIG_REGISTRY").or_else(|_| env::var("npm_config_registry"))
    {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            registry = trimmed.to_string();
        }
    }

    normalize_registry_url(&registry)
}

fn apply_rc_file(path: &Path, registry: &mut String) {
    if !path.is_file() {
        return;
    }

    if let Ok(data) = fs::read_to_string(path)
        && let Some(value) = registry_from_rc(&data)
    {
        *registry = value;
    }
}

fn registry_from_rc(data: &str) -> Option<String> {
    let mut found = None;

    for line in data.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if let Some((key, value)) = trimmed.split_once('=')
            && key.trim() == "registry"
        {
            let value = value.trim();
            if !value.is_empty() {
                found = Some(value.to_string());
            }
        }
    }

    found
}

pub fn normalize_registry_url(value: &str) -> String {
    let url = if value.starts_with("//") {
        format!("https:{}", value)
    } else {
        value.to_string()
    };

    url.trim_end_matches('/').to_string()
}
