use std::sync::LazyLock;

use regex_lite::Regex;
use thiserror::Error;

/// Separator between the segments of a hierarchical name.
pub const SEPARATOR: char = '/';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,
    #[error("name must not contain '.' or '..' segments")]
    RelativeSegment,
    #[error("name must not contain backslashes")]
    Backslash,
    #[error("name must not start or end with '{SEPARATOR}'")]
    LeadingOrTrailingSeparator,
    #[error("name must not contain empty segments")]
    EmptySegment,
    #[error("name contains invalid character {0:?}: must contain only alphanumeric characters, dashes, underscores, and dots")]
    InvalidCharacter(char),
}

static SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[A-Za-z0-9._-]+$").unwrap()
});

/// Ensures the name is usable as a repository or group name. Names address
/// directories below the managed root, so anything that could walk out of it
/// is rejected. If the name does not pass validation, an error describing the
/// first violated rule is returned.
///
/// Effectively, the name should comply with the following grammar, with the
/// segments `.` and `..` excluded:
///
/// ```text
/// segment := /[A-Za-z0-9._-]+/
/// name := segment ['/' segment]*
/// ```
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    if name == "." || name == ".." {
        return Err(NameError::RelativeSegment);
    }

    if name.contains('\\') {
        return Err(NameError::Backslash);
    }

    if name.starts_with(SEPARATOR) || name.ends_with(SEPARATOR) {
        return Err(NameError::LeadingOrTrailingSeparator);
    }

    for segment in name.split(SEPARATOR) {
        if segment.is_empty() {
            return Err(NameError::EmptySegment);
        }

        if segment == "." || segment == ".." {
            return Err(NameError::RelativeSegment);
        }

        if !SEGMENT_RE.is_match(segment) {
            let ch = segment
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
                .unwrap_or(SEPARATOR);
            return Err(NameError::InvalidCharacter(ch));
        }
    }

    Ok(())
}

/// Predicate form of [`validate_name`].
pub fn is_valid_name(name: &str) -> bool {
    validate_name(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_single_segment_names() {
        let valid_names = vec!["myrepo", "my-repo", "my_repo", "my.repo", "repo123", "A", "x.git.bak"];

        for name in valid_names {
            assert!(is_valid_name(name), "Name '{name}' should be valid");
        }
    }

    #[test]
    fn test_valid_multi_segment_names() {
        let valid_names = vec![
            "username/repo",
            "group/project/repo",
            "org/team/project/repo",
            "org/tagsteam/repo",
            "org/tags/thing",
            "a/.hidden/b",
        ];

        for name in valid_names {
            assert!(is_valid_name(name), "Name '{name}' should be valid");
        }
    }

    #[test]
    fn test_relative_segments_rejected_at_any_depth() {
        let names = vec![".", "..", "../repo", "user/../repo", "a/../b", "user/..", "user/./repo", "./a"];

        for name in names {
            let result = validate_name(name);
            assert_eq!(
                result,
                Err(NameError::RelativeSegment),
                "Name '{name}' should fail with RelativeSegment, got {result:?}"
            );
        }
    }

    #[test]
    fn test_separator_placement() {
        assert_eq!(validate_name("/repo"), Err(NameError::LeadingOrTrailingSeparator));
        assert_eq!(validate_name("repo/"), Err(NameError::LeadingOrTrailingSeparator));
        assert_eq!(validate_name("/"), Err(NameError::LeadingOrTrailingSeparator));
        assert_eq!(validate_name("user//repo"), Err(NameError::EmptySegment));
        assert_eq!(validate_name("user\\repo"), Err(NameError::Backslash));
        assert_eq!(validate_name(""), Err(NameError::Empty));
    }

    #[test]
    fn test_invalid_characters() {
        let cases = vec![
            ("my repo", ' '),
            ("user@repo", '@'),
            ("repo#1", '#'),
            ("repo&test", '&'),
            ("org/te$m/repo", '$'),
            ("caf\u{e9}", '\u{e9}'),
        ];

        for (name, ch) in cases {
            assert_eq!(
                validate_name(name),
                Err(NameError::InvalidCharacter(ch)),
                "Name '{name}' should be rejected for {ch:?}"
            );
        }
    }

    #[test]
    fn test_predicate_agrees_with_validation() {
        let inputs = vec!["ok/name", "bad name", "a//b", "..", "x/y/z", "trailing/"];

        for input in inputs {
            assert_eq!(is_valid_name(input), validate_name(input).is_ok(), "Mismatch for '{input}'");
        }
    }
}
