//! Content fingerprints for change detection.
//!
//! Every item is reduced to canonical content (see [`super::canonical`]) and
//! then fingerprinted with SHA256. Only the fingerprint pair is persisted
//! between runs, so change detection never needs the previous content.

use sha2::{Digest, Sha256};

/// Fingerprint of canonical content.
///
/// Empty content maps to the empty sentinel `""`, not to the digest of the
/// empty string, so "absent" and "present" never collide.
///
/// # Example
///
/// ```
/// use confsync::sync::fingerprint;
///
/// assert_eq!(fingerprint(""), "");
/// assert_eq!(fingerprint("{}").len(), 64);
/// ```
#[must_use]
pub fn fingerprint(canonical: &str) -> String {
    if canonical.is_empty() {
        return String::new();
    }
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check whether a side changed since the last recorded run.
///
/// A missing prior fingerprint means the item was never seen, which is the
/// same as a prior empty sentinel: absent content is unchanged, anything
/// else counts as a change.
#[must_use]
pub fn has_changed(current: &str, prior: Option<&str>) -> bool {
    prior.unwrap_or("") != current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint(r#"{"a":"x"}"#);
        let b = fingerprint(r#"{"a":"x"}"#);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        assert_ne!(fingerprint(r#"{"a":"x"}"#), fingerprint(r#"{"a":"y"}"#));
    }

    #[test]
    fn test_empty_content_is_sentinel() {
        assert_eq!(fingerprint(""), "");
    }

    #[test]
    fn test_has_changed_never_seen() {
        assert!(has_changed("abc123", None));
        assert!(!has_changed("", None));
    }

    #[test]
    fn test_has_changed_against_prior() {
        assert!(has_changed("abc123", Some("xyz789")));
        assert!(!has_changed("abc123", Some("abc123")));
        assert!(has_changed("", Some("abc123")));
    }
}
