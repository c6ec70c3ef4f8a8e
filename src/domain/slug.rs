//! Group slug derivation and validation.

use slug::slugify;
use thiserror::Error;

const MAX_SLUG_LEN: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{slug}` may only contain letters, digits, hyphens and underscores")]
    InvalidCharacters { slug: String },
    #[error("slug exceeds {MAX_SLUG_LEN} characters")]
    TooLong,
}

/// Derive a slug from a human-readable title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }
    candidate.truncate(MAX_SLUG_LEN);
    Ok(candidate.trim_end_matches('-').to_string())
}

/// Check an explicitly supplied slug.
pub fn validate_slug(slug: &str) -> Result<(), SlugError> {
    if slug.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if slug.chars().count() > MAX_SLUG_LEN {
        return Err(SlugError::TooLong);
    }
    if !slug
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(SlugError::InvalidCharacters {
            slug: slug.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_ascii_slug() {
        assert_eq!(derive_slug("Cats & Dogs").unwrap(), "cats-dogs");
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn validates_explicit_slugs() {
        assert!(validate_slug("test_slug").is_ok());
        assert!(validate_slug("with-dash-2").is_ok());
        assert!(matches!(
            validate_slug("has space"),
            Err(SlugError::InvalidCharacters { .. })
        ));
        assert_eq!(validate_slug(&"a".repeat(51)), Err(SlugError::TooLong));
    }
}
