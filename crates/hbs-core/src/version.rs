//! Dotted-numeric release ordering used by version propagation.
//!
//! Release identifiers look like `v1.2.0`, the never-released sentinel is `"0"`,
//! and in-progress stamps carry a suffix (`v1.2.0-pending`). Comparison is
//! partial: a segment that fails validation makes the pair incomparable, and
//! callers treat that as "leave both versions alone".

use crate::config::VersionConfig;
use std::cmp::Ordering;

/// Version of a fragment that no release has touched.
pub const NEVER_RELEASED: &str = "0";

/// Knobs for [`compare_versions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareOptions {
    /// Segments match `^\d+[A-Za-z]*$` and are compared as strings.
    pub lexicographical: bool,
    /// Pad the shorter sequence with `"0"` segments before comparing.
    pub zero_extend: bool,
    /// Marker appended to in-progress stamps.
    pub pending_suffix: String,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            lexicographical: false,
            zero_extend: false,
            pending_suffix: "-pending".to_string(),
        }
    }
}

impl CompareOptions {
    pub fn from_config(versions: &VersionConfig, pending_suffix: &str) -> Self {
        Self {
            lexicographical: versions.lexicographical,
            zero_extend: versions.zero_extend,
            pending_suffix: pending_suffix.to_string(),
        }
    }
}

/// Build the in-progress stamp for changes made after `last_release`.
pub fn pending_stamp(last_release: Option<&str>, pending_suffix: &str) -> String {
    format!("{}{}", last_release.unwrap_or(NEVER_RELEASED), pending_suffix)
}

struct ParsedVersion<'a> {
    segments: Vec<&'a str>,
    pending: bool,
}

fn parse<'a>(raw: &'a str, options: &CompareOptions) -> Option<ParsedVersion<'a>> {
    let (body, pending) = match raw.strip_suffix(options.pending_suffix.as_str()) {
        Some(body) if !options.pending_suffix.is_empty() => (body, true),
        _ => (raw, false),
    };
    let body = body
        .strip_prefix('v')
        .or_else(|| body.strip_prefix('V'))
        .unwrap_or(body);

    let segments: Vec<&str> = body.split('.').collect();
    if !segments.iter().all(|s| is_valid_segment(s, options.lexicographical)) {
        return None;
    }
    Some(ParsedVersion { segments, pending })
}

fn is_valid_segment(segment: &str, lexicographical: bool) -> bool {
    let digits = segment.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return false;
    }
    let rest = &segment[digits..];
    if lexicographical {
        rest.bytes().all(|b| b.is_ascii_alphabetic())
    } else {
        rest.is_empty()
    }
}

fn compare_segment(a: &str, b: &str, lexicographical: bool) -> Option<Ordering> {
    if lexicographical {
        return Some(a.cmp(b));
    }
    let a: u64 = a.parse().ok()?;
    let b: u64 = b.parse().ok()?;
    Some(a.cmp(&b))
}

/// Compare two version strings.
///
/// Segments are compared left to right; a strict prefix orders before the
/// longer sequence. With equal segments an in-progress stamp orders after the
/// release it builds on. Returns `None` when either side has an invalid segment.
pub fn compare_versions(a: &str, b: &str, options: &CompareOptions) -> Option<Ordering> {
    let a = parse(a, options)?;
    let b = parse(b, options)?;

    let mut left = a.segments;
    let mut right = b.segments;
    if options.zero_extend {
        while left.len() < right.len() {
            left.push("0");
        }
        while right.len() < left.len() {
            right.push("0");
        }
    }

    for (i, l) in left.iter().enumerate() {
        let Some(r) = right.get(i) else {
            return Some(Ordering::Greater);
        };
        match compare_segment(l, r, options.lexicographical)? {
            Ordering::Equal => {}
            other => return Some(other),
        }
    }
    if left.len() != right.len() {
        return Some(Ordering::Less);
    }

    Some(a.pending.cmp(&b.pending))
}

/// True when `candidate` is strictly newer than `current`.
/// Incomparable pairs are never newer.
pub fn is_newer(candidate: &str, current: &str, options: &CompareOptions) -> bool {
    compare_versions(candidate, current, options) == Some(Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &str, b: &str) -> Option<Ordering> {
        compare_versions(a, b, &CompareOptions::default())
    }

    #[test]
    fn test_numeric_segments_compare_numerically() {
        assert_eq!(cmp("1.10", "1.9"), Some(Ordering::Greater));
        assert_eq!(cmp("2.0", "10.0"), Some(Ordering::Less));
        assert_eq!(cmp("3.1.4", "3.1.4"), Some(Ordering::Equal));
    }

    #[test]
    fn test_strict_prefix_is_lesser() {
        assert_eq!(cmp("1.0", "1.0.1"), Some(Ordering::Less));
        assert_eq!(cmp("1.0.1", "1.0"), Some(Ordering::Greater));
    }

    #[test]
    fn test_tag_prefix_ignored() {
        assert_eq!(cmp("v2.0", "v1.0"), Some(Ordering::Greater));
        assert_eq!(cmp("V1.0", "1.0"), Some(Ordering::Equal));
    }

    #[test]
    fn test_sentinel_orders_before_any_release() {
        assert_eq!(cmp("v0.1", NEVER_RELEASED), Some(Ordering::Greater));
        assert_eq!(cmp(NEVER_RELEASED, "v1.0"), Some(Ordering::Less));
    }

    #[test]
    fn test_pending_outranks_its_release() {
        assert_eq!(cmp("v2.0-pending", "v2.0"), Some(Ordering::Greater));
        assert_eq!(cmp("v2.0-pending", "v2.1"), Some(Ordering::Less));
        assert_eq!(cmp("0-pending", NEVER_RELEASED), Some(Ordering::Greater));
    }

    #[test]
    fn test_non_numeric_segment_is_incomparable() {
        assert_eq!(cmp("1.0-beta", "1.0"), None);
        assert_eq!(cmp("release", "1.0"), None);
        assert_eq!(cmp("1..0", "1.0"), None);
        assert!(!is_newer("1.0rc", "0.9", &CompareOptions::default()));
    }

    #[test]
    fn test_lexicographical_mode_accepts_letter_suffixes() {
        let options = CompareOptions {
            lexicographical: true,
            ..CompareOptions::default()
        };
        assert_eq!(
            compare_versions("1.0b", "1.0a", &options),
            Some(Ordering::Greater)
        );
        assert_eq!(compare_versions("1.a", "1.0", &options), None);
    }

    #[test]
    fn test_zero_extend_equalizes_trailing_zeros() {
        let options = CompareOptions {
            zero_extend: true,
            ..CompareOptions::default()
        };
        assert_eq!(
            compare_versions("1.0", "1.0.0", &options),
            Some(Ordering::Equal)
        );
        assert_eq!(cmp("1.0", "1.0.0"), Some(Ordering::Less));
    }

    #[test]
    fn test_pending_stamp_without_release_uses_sentinel() {
        assert_eq!(pending_stamp(None, "-pending"), "0-pending");
        assert_eq!(pending_stamp(Some("v3.0"), "-dev"), "v3.0-dev");
    }
}
