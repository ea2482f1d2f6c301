//! Semantic version comparison for release tags.
//!
//! Release tags and firmware identifiers arrive as free-form strings
//! (`"v24.2.12"`, `"1.9"`, a git hash...). Both comparison functions parse
//! leniently and fail closed: anything that is not a version compares as
//! `false`, so a broken tag never breaks the advisory logic.

use std::cmp::Ordering;

use semver::{BuildMetadata, Version};

/// Returns `true` iff `a` and `b` denote the same release.
///
/// A leading `v`/`V` and build metadata are ignored. Pre-release
/// identifiers are significant.
#[must_use]
pub fn compare_exact(a: &str, b: &str) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

/// Returns `true` iff `a` is the same as or newer than `b`.
#[must_use]
pub fn is_at_least(a: &str, b: &str) -> bool {
    matches!(compare(a, b), Some(Ordering::Greater | Ordering::Equal))
}

/// Orders two version strings, or `None` if either fails to parse.
#[must_use]
pub fn compare(a: &str, b: &str) -> Option<Ordering> {
    let a = parse_lenient(a)?;
    let b = parse_lenient(b)?;
    Some(a.cmp(&b))
}

/// Parses a tag into a [`Version`], stripping the `v` prefix, padding
/// `MAJOR` / `MAJOR.MINOR` forms and clearing build metadata.
#[must_use]
pub fn parse_lenient(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }

    // Split off pre-release / build suffix before padding the core.
    let suffix_at = trimmed
        .find(|c: char| c == '-' || c == '+')
        .unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(suffix_at);
    let components = core.split('.').count();
    let padded = match components {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => trimmed.to_string(),
    };

    let mut version = Version::parse(&padded).ok()?;
    version.build = BuildMetadata::EMPTY;
    Some(version)
}

/// Strips a leading `v`/`V` for display (`"v2.0.0"` → `"2.0.0"`).
#[must_use]
pub fn pretty_tag(tag: &str) -> &str {
    tag.strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag)
}
