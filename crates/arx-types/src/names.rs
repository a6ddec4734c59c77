//! Naming rules for storage path segments.
//!
//! Valid segments:
//! - Must be non-empty and at most 255 bytes
//! - Must not be `.` or `..`
//! - Must not start with `.` (reserved for backend bookkeeping)
//! - Must not contain `/`, `\`, `:` or control characters
//!
//! Container names are stricter: ASCII alphanumerics, `-` and `_` only, so
//! that every backend can map them onto a bucket, table or directory.

use crate::error::PathError;

/// Maximum byte length of a single segment.
pub const MAX_SEGMENT_LEN: usize = 255;

/// Characters that are forbidden anywhere in a segment.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':'];

/// Validate a single path segment, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use arx_types::names::validate_segment;
///
/// assert!(validate_segment("aip.json").is_ok());
/// assert!(validate_segment("").is_err());
/// assert!(validate_segment("..").is_err());
/// assert!(validate_segment("a/b").is_err());
/// ```
pub fn validate_segment(segment: &str) -> Result<(), PathError> {
    let invalid = |reason: String| PathError::InvalidSegment {
        segment: segment.to_string(),
        reason,
    };

    if segment.is_empty() {
        return Err(invalid("segment must not be empty".into()));
    }
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(invalid(format!(
            "segment is {} bytes long, limit is {MAX_SEGMENT_LEN}",
            segment.len()
        )));
    }
    if segment.starts_with('.') {
        return Err(invalid("must not start with '.'".into()));
    }
    for ch in FORBIDDEN_CHARS {
        if segment.contains(*ch) {
            return Err(invalid(format!("contains forbidden character: {ch:?}")));
        }
    }
    if let Some(ch) = segment.chars().find(|c| c.is_control()) {
        return Err(invalid(format!("contains control character: {ch:?}")));
    }
    Ok(())
}

/// Validate a container name.
///
/// ```
/// use arx_types::names::validate_container_name;
///
/// assert!(validate_container_name("job-report").is_ok());
/// assert!(validate_container_name("with space").is_err());
/// ```
pub fn validate_container_name(name: &str) -> Result<(), PathError> {
    validate_segment(name).map_err(|e| match e {
        PathError::InvalidSegment { reason, .. } => PathError::InvalidContainer {
            name: name.to_string(),
            reason,
        },
        other => other,
    })?;

    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(PathError::InvalidContainer {
            name: name.to_string(),
            reason: format!("contains unsupported character: {ch:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_names_are_valid() {
        for name in ["aip.json", "data", "file with spaces.pdf", "ünïcode", "v1-2_3"] {
            assert!(validate_segment(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn dot_names_are_rejected() {
        assert!(validate_segment(".").is_err());
        assert!(validate_segment("..").is_err());
        assert!(validate_segment(".history").is_err());
    }

    #[test]
    fn forbidden_characters_are_rejected() {
        assert!(validate_segment("a/b").is_err());
        assert!(validate_segment("a\\b").is_err());
        assert!(validate_segment("a:b").is_err());
        assert!(validate_segment("a\nb").is_err());
        assert!(validate_segment("tab\there").is_err());
    }

    #[test]
    fn overlong_segment_is_rejected() {
        let long = "x".repeat(MAX_SEGMENT_LEN + 1);
        assert!(validate_segment(&long).is_err());
        assert!(validate_segment(&long[..MAX_SEGMENT_LEN]).is_ok());
    }

    #[test]
    fn container_names_are_restricted() {
        assert!(validate_container_name("aip").is_ok());
        assert!(validate_container_name("job-report").is_ok());
        assert!(validate_container_name("action_log2").is_ok());
        assert!(validate_container_name("aip.json").is_err());
        assert!(validate_container_name("with space").is_err());
        assert!(matches!(
            validate_container_name(""),
            Err(PathError::InvalidContainer { .. })
        ));
    }
}
