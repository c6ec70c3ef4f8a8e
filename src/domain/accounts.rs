//! Username and password rules for author accounts.

use super::error::DomainError;

const MAX_USERNAME_LEN: usize = 150;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Usernames allow letters, digits and `@ . + - _`, up to 150 characters.
pub fn validate_username(raw: &str) -> Result<String, DomainError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(DomainError::validation("username", "This field is required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(
            "username",
            format!("Ensure this value has at most {MAX_USERNAME_LEN} characters"),
        ));
    }
    if !username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(DomainError::validation(
            "username",
            "Enter a valid username: letters, digits and @/./+/-/_ only",
        ));
    }
    Ok(username.to_string())
}

pub fn validate_password(raw: &str) -> Result<(), DomainError> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(
            "password",
            format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if raw.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(DomainError::validation(
            "password",
            "This password is entirely numeric",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert_eq!(validate_username(" TestUser ").unwrap(), "TestUser");
        assert!(validate_username("user-to-follow").is_ok());
        assert!(validate_username("no spaces").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn passwords() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("correct horse").is_ok());
    }
}
