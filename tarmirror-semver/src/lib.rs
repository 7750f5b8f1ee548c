//! Version helpers shared by the mirror crates.

pub use semver::Version;

const MAX_COMPONENT_DIGITS: usize = 16;

/// Pulls the first version-looking run of digits out of `input`.
///
/// Accepts one to three dot-separated numeric components that are not
/// preceded by another digit; missing minor/patch components become `0`.
/// Anything after the last component (prerelease tags, range operators,
/// trailing text) is dropped.
pub fn coerce(input: &str) -> Option<Version> {
    let bytes = input.as_bytes();
    let mut start = 0;

    while start < bytes.len() {
        if !bytes[start].is_ascii_digit() || (start > 0 && bytes[start - 1].is_ascii_digit()) {
            start += 1;
            continue;
        }

        if let Some(version) = coerce_at(&input[start..]) {
            return Some(version);
        }

        while start < bytes.len() && bytes[start].is_ascii_digit() {
            start += 1;
        }
    }

    None
}

fn coerce_at(text: &str) -> Option<Version> {
    let mut components = [0u64; 3];
    let mut rest = text;

    for (index, slot) in components.iter_mut().enumerate() {
        if index > 0 {
            match rest.strip_prefix('.') {
                Some(after) if after.starts_with(|c: char| c.is_ascii_digit()) => rest = after,
                _ => break,
            }
        }

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits > MAX_COMPONENT_DIGITS {
            return None;
        }

        *slot = rest[..digits].parse().ok()?;
        rest = &rest[digits..];
    }

    Some(Version::new(components[0], components[1], components[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_partial_versions() {
        assert_eq!(coerce("2.0"), Some(Version::new(2, 0, 0)));
        assert_eq!(coerce("3"), Some(Version::new(3, 0, 0)));
        assert_eq!(coerce(">=1.4.2 <2"), Some(Version::new(1, 4, 2)));
        assert_eq!(coerce("v4.17.21-beta"), Some(Version::new(4, 17, 21)));
    }

    #[test]
    fn coerce_gives_up_without_digits() {
        assert_eq!(coerce("next"), None);
        assert_eq!(coerce("*"), None);
        assert_eq!(coerce(""), None);
    }

    #[test]
    fn coerce_skips_oversized_components() {
        assert_eq!(coerce("12345678901234567 1.2"), Some(Version::new(1, 2, 0)));
    }
}
