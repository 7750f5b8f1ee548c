use crate::resolve::ResolvedVersion;
use crate::{MirrorError, Result};
use tarmirror_semver::Version;

const EXTENSION: &str = ".tgz";
const LATEST_SUFFIX: &str = "-latest";

/// Package identity as encoded in a mirrored tarball's file name:
/// `{name with '/' as '-'}-{version}[-latest].tgz`.
///
/// The encoding is lossy. Decoding assumes a scope never contains `-`, that
/// a trailing `-latest` is the flag rather than a prerelease tag, and that the
/// version starts at the first `-<digit>` whose remainder parses as semver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TarballName {
    pub name: String,
    pub version: String,
    pub is_latest: bool,
}

impl TarballName {
    pub fn of(package: &ResolvedVersion) -> Self {
        TarballName {
            name: package.name.clone(),
            version: package.version.clone(),
            is_latest: package.is_latest,
        }
    }

    pub fn file_name(&self) -> String {
        let suffix = if self.is_latest { LATEST_SUFFIX } else { "" };
        format!(
            "{}-{}{}{}",
            self.name.replace('/', "-"),
            self.version,
            suffix,
            EXTENSION
        )
    }

    pub fn parse(file_name: &str) -> Result<Self> {
        let invalid = |reason: &str| MirrorError::TarballName {
            file_name: file_name.to_string(),
            reason: reason.to_string(),
        };

        let stem = file_name
            .strip_suffix(EXTENSION)
            .ok_or_else(|| invalid("missing .tgz extension"))?;

        let (stem, is_latest) = match stem.strip_suffix(LATEST_SUFFIX) {
            Some(rest) => (rest, true),
            None => (stem, false),
        };

        let (flat_name, version) = split_version(stem).ok_or_else(|| invalid("no version"))?;

        let name = if flat_name.starts_with('@') {
            flat_name
                .split_once('-')
                .map(|(scope, rest)| format!("{scope}/{rest}"))
                .ok_or_else(|| invalid("scoped name without package part"))?
        } else {
            flat_name.to_string()
        };

        Ok(TarballName {
            name,
            version: version.to_string(),
            is_latest,
        })
    }
}

fn split_version(stem: &str) -> Option<(&str, &str)> {
    stem.match_indices('-').find_map(|(at, _)| {
        let (name, rest) = (&stem[..at], &stem[at + 1..]);
        let starts_with_digit = rest.starts_with(|c: char| c.is_ascii_digit());

        if !name.is_empty() && starts_with_digit && Version::parse(rest).is_ok() {
            Some((name, rest))
        } else {
            None
        }
    })
}
