use crate::archive::strip_registry_override;
use crate::batch::run_chunked;
use crate::error::PublishFailure;
use crate::tarball::TarballName;
use crate::{MirrorError, Result, console};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::process::Command;
use tracing::{debug, warn};

/// Something that can push one tarball to the target registry.
pub trait Publisher: Send + Sync {
    /// Fails with [`MirrorError::Publish`] when the registry refuses the
    /// tarball, carrying the refusal kind.
    fn publish(
        &self,
        tarball: &Path,
        package: &TarballName,
        tag: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Shells out to `npm publish`.
pub struct NpmPublisher {
    program: String,
    registry: String,
}

impl NpmPublisher {
    pub fn new(registry: &str) -> Self {
        NpmPublisher {
            program: "npm".to_string(),
            registry: registry.to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }
}

impl Publisher for NpmPublisher {
    async fn publish(&self, tarball: &Path, package: &TarballName, tag: Option<&str>) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .arg("publish")
            .arg(tarball)
            .arg("--registry")
            .arg(&self.registry);

        if let Some(tag) = tag {
            command.arg("--tag").arg(tag);
        }

        debug!(
            "npm publish {} (registry={}, tag={:?})",
            tarball.display(),
            self.registry,
            tag
        );

        let output = command.output().await.map_err(|source| MirrorError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let kind = classify_failure(&format!("{stderr}\n{stdout}"));
        let message = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("npm publish exited with an error")
            .to_string();

        Err(MirrorError::Publish {
            name: package.name.clone(),
            version: package.version.clone(),
            kind,
            message,
        })
    }
}

/// Reads npm's error output to tell a duplicate version from a refusal.
pub fn classify_failure(output: &str) -> PublishFailure {
    let output = output.to_ascii_lowercase();

    let conflict = ["epublishconflict", "cannot publish over", "previously published"];
    if conflict.iter().any(|needle| output.contains(needle)) {
        return PublishFailure::Conflict;
    }

    let permission = ["e401", "e403", "eperm", "forbidden", "permission"];
    if permission.iter().any(|needle| output.contains(needle)) {
        return PublishFailure::Permission;
    }

    PublishFailure::Other
}

/// Dist-tag for a non-latest publish so it doesn't move `latest`.
pub fn publish_tag(package: &TarballName) -> Option<String> {
    if package.is_latest {
        None
    } else {
        Some(format!("{}@{}", package.name, package.version))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// The target registry already has this version.
    AlreadyPublished,
    /// Published after removing the manifest's registry override.
    Republished,
}

#[derive(Debug, Default)]
pub struct PublishReport {
    pub published: Vec<(TarballName, PublishOutcome)>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Publishes one mirrored tarball.
///
/// A permission refusal gets one retry with a copy of the tarball, written
/// under `scratch`, whose `package.json` no longer pins a registry.
pub async fn publish_tarball<P: Publisher>(
    publisher: &P,
    tarball: &Path,
    scratch: &Path,
) -> Result<(TarballName, PublishOutcome)> {
    let file_name = tarball
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let package = TarballName::parse(file_name)?;
    let tag = publish_tag(&package);

    match publisher.publish(tarball, &package, tag.as_deref()).await {
        Ok(()) => return Ok((package, PublishOutcome::Published)),
        Err(MirrorError::Publish {
            kind: PublishFailure::Conflict,
            ..
        }) => return Ok((package, PublishOutcome::AlreadyPublished)),
        Err(MirrorError::Publish {
            kind: PublishFailure::Permission,
            message,
            ..
        }) => {
            debug!(
                "{}@{} refused ({}), retrying without registry override",
                package.name, package.version, message
            );
        }
        Err(error) => return Err(error),
    }

    let rewritten = scratch.join(file_name);
    if !strip_registry_override(tarball, &rewritten)? {
        debug!("{} had no registry override to remove", file_name);
    }

    match publisher.publish(&rewritten, &package, tag.as_deref()).await {
        Ok(()) => Ok((package, PublishOutcome::Republished)),
        Err(MirrorError::Publish {
            kind: PublishFailure::Conflict,
            ..
        }) => Ok((package, PublishOutcome::AlreadyPublished)),
        Err(error) => Err(error),
    }
}

/// Lists the `.tgz` files directly inside `dir`, sorted by name.
pub fn collect_tarballs(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_err = |source| MirrorError::ReadFile {
        path: dir.to_path_buf(),
        source,
    };

    let mut tarballs = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let is_tarball = path.extension().is_some_and(|ext| ext == "tgz");
        if is_tarball && path.is_file() {
            tarballs.push(path);
        }
    }

    tarballs.sort();
    Ok(tarballs)
}

/// Publishes `tarballs` in chunks of `concurrency`; failures are collected
/// per tarball.
pub async fn publish_all<P: Publisher>(
    publisher: &P,
    tarballs: Vec<PathBuf>,
    concurrency: usize,
    scratch: &Path,
) -> PublishReport {
    let total = tarballs.len();
    let finished = AtomicUsize::new(0);

    let results = run_chunked(tarballs, concurrency, |path| {
        let finished = &finished;
        async move {
            let result = publish_tarball(publisher, &path, scratch).await;
            let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
            console::progress("🚀", "publishing", done, total);
            (path, result)
        }
    })
    .await;
    console::clear_line();

    let mut report = PublishReport::default();
    for (path, result) in results {
        match result {
            Ok(published) => report.published.push(published),
            Err(error) => {
                warn!("publish failed for {}: {}", path.display(), error);
                report.failed.push((path, error.to_string()));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::write_test_tarball;
    use crate::testing::FakePublisher;

    fn tarball(dir: &Path, file_name: &str, package_json: &str) -> PathBuf {
        let path = dir.join(file_name);
        write_test_tarball(&path, package_json);
        path
    }

    #[test]
    fn classifies_npm_errors() {
        assert_eq!(
            classify_failure("npm ERR! code EPUBLISHCONFLICT"),
            PublishFailure::Conflict
        );
        assert_eq!(
            classify_failure("You cannot publish over the previously published versions: 1.0.0."),
            PublishFailure::Conflict
        );
        assert_eq!(
            classify_failure("npm ERR! code E403\nnpm ERR! 403 Forbidden"),
            PublishFailure::Permission
        );
        assert_eq!(classify_failure("npm ERR! code E401"), PublishFailure::Permission);
        assert_eq!(
            classify_failure("npm ERR! code ECONNREFUSED"),
            PublishFailure::Other
        );
    }

    #[test]
    fn only_non_latest_versions_get_a_tag() {
        let latest = TarballName::parse("pkg-2.0.0-latest.tgz").unwrap();
        let older = TarballName::parse("@scope-pkg-1.0.0.tgz").unwrap();

        assert_eq!(publish_tag(&latest), None);
        assert_eq!(publish_tag(&older).as_deref(), Some("@scope/pkg@1.0.0"));
    }

    #[tokio::test]
    async fn publishes_with_tag_for_older_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = tarball(dir.path(), "pkg-1.0.0.tgz", r#"{"name":"pkg"}"#);
        let publisher = FakePublisher::default();

        let (package, outcome) = publish_tarball(&publisher, &path, dir.path())
            .await
            .unwrap();

        assert_eq!(package.name, "pkg");
        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(
            publisher.calls(),
            vec![(path, Some("pkg@1.0.0".to_string()))]
        );
    }

    #[tokio::test]
    async fn conflict_counts_as_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = tarball(dir.path(), "pkg-1.0.0-latest.tgz", r#"{"name":"pkg"}"#);
        let publisher = FakePublisher::scripted(&[Some(PublishFailure::Conflict)]);

        let (_, outcome) = publish_tarball(&publisher, &path, dir.path())
            .await
            .unwrap();

        assert_eq!(outcome, PublishOutcome::AlreadyPublished);
        assert_eq!(publisher.calls().len(), 1);
    }

    #[tokio::test]
    async fn permission_failure_retries_without_registry_override() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let path = tarball(
            dir.path(),
            "pkg-1.0.0-latest.tgz",
            r#"{"name":"pkg","publishConfig":{"registry":"https://private.example"}}"#,
        );
        let publisher = FakePublisher::scripted(&[Some(PublishFailure::Permission), None]);

        let (_, outcome) = publish_tarball(&publisher, &path, scratch.path())
            .await
            .unwrap();

        assert_eq!(outcome, PublishOutcome::Republished);
        let calls = publisher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, path);
        assert_eq!(calls[1].0, scratch.path().join("pkg-1.0.0-latest.tgz"));
        assert_eq!(calls[1].1, None);
    }

    #[tokio::test]
    async fn second_permission_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = tarball(dir.path(), "pkg-1.0.0.tgz", r#"{"name":"pkg"}"#);
        let publisher = FakePublisher::scripted(&[
            Some(PublishFailure::Permission),
            Some(PublishFailure::Permission),
        ]);

        let err = publish_tarball(&publisher, &path, dir.path())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MirrorError::Publish {
                kind: PublishFailure::Permission,
                ..
            }
        ));
        assert_eq!(publisher.calls().len(), 2);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = tarball(dir.path(), "pkg-1.0.0.tgz", r#"{"name":"pkg"}"#);
        let publisher = FakePublisher::scripted(&[Some(PublishFailure::Other)]);

        assert!(publish_tarball(&publisher, &path, dir.path()).await.is_err());
        assert_eq!(publisher.calls().len(), 1);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        tarball(dir.path(), "a-1.0.0-latest.tgz", r#"{"name":"a"}"#);
        tarball(dir.path(), "broken-1.0.0.tgz", r#"{"name":"broken"}"#);
        tarball(dir.path(), "c-2.0.0.tgz", r#"{"name":"c"}"#);
        fs::write(dir.path().join("notes.txt"), "not a tarball").unwrap();
        fs::write(dir.path().join("garbage.tgz"), "undecodable name").unwrap();

        let tarballs = collect_tarballs(dir.path()).unwrap();
        assert_eq!(tarballs.len(), 4);

        let publisher = FakePublisher::default();
        let report = publish_all(&publisher, tarballs, 2, scratch.path()).await;

        let published: Vec<_> = report
            .published
            .iter()
            .map(|(package, _)| package.name.as_str())
            .collect();
        assert_eq!(published, vec!["a", "c"]);
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed.iter().any(|(path, _)| path.ends_with("broken-1.0.0.tgz")));
        assert!(report.failed.iter().any(|(path, _)| path.ends_with("garbage.tgz")));
    }
}
