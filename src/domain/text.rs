//! Validation of user-authored text bodies (posts and comments).

use super::error::DomainError;

/// Minimum number of characters accepted for post and comment bodies.
pub const MIN_TEXT_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Post,
    Comment,
}

impl TextKind {
    fn too_short_message(self) -> &'static str {
        match self {
            TextKind::Post => "Post text is too short",
            TextKind::Comment => "Comment is too short",
        }
    }
}

/// Normalise submitted text and enforce the minimum length.
///
/// Surrounding whitespace is stripped before measuring; length is counted in
/// Unicode scalar values so non-Latin text is measured the way users see it.
pub fn validate_text(kind: TextKind, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("text", "This field is required"));
    }

    if trimmed.chars().count() < MIN_TEXT_LENGTH {
        return Err(DomainError::validation("text", kind.too_short_message()));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_text_below_minimum() {
        let err = validate_text(TextKind::Post, "seven!!").expect_err("too short");
        assert!(matches!(err, DomainError::Validation { field: "text", .. }));
    }

    #[test]
    fn accepts_text_at_minimum() {
        let text = validate_text(TextKind::Comment, "eight!!!").expect("valid");
        assert_eq!(text, "eight!!!");
    }

    #[test]
    fn whitespace_does_not_count() {
        assert!(validate_text(TextKind::Post, "   short   ").is_err());
        assert!(validate_text(TextKind::Post, "\n\t ").is_err());
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 7 Cyrillic letters are 14 bytes but still too short.
        assert!(validate_text(TextKind::Post, "привет!").is_err());
        assert!(validate_text(TextKind::Post, "приветик").is_ok());
    }
}
