//! Registration parameter validation.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("valid regex"));
static CAKE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z]+$").expect("valid regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("email is not valid")]
    InvalidEmail,

    #[error("password should have at least 8 symbols")]
    PasswordTooShort,

    #[error("favorite cake should not be empty")]
    CakeEmpty,

    #[error("favorite cake should have only alphabetic characters")]
    CakeNotAlphabetic,
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < 8 {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

pub fn validate_cake(cake: &str) -> Result<(), ValidationError> {
    if cake.is_empty() {
        return Err(ValidationError::CakeEmpty);
    }
    if !CAKE_RE.is_match(cake) {
        return Err(ValidationError::CakeNotAlphabetic);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_email() {
        assert!(validate_email("user@example.com").is_ok());
    }

    #[test]
    fn rejects_bad_emails() {
        assert_eq!(validate_email("nope"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email("a b@c.d"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email("a@b"), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn password_length_rule() {
        assert_eq!(
            validate_password("short"),
            Err(ValidationError::PasswordTooShort)
        );
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn cake_rules() {
        assert_eq!(validate_cake(""), Err(ValidationError::CakeEmpty));
        assert_eq!(
            validate_cake("red velvet"),
            Err(ValidationError::CakeNotAlphabetic)
        );
        assert_eq!(
            validate_cake("cheesecake9"),
            Err(ValidationError::CakeNotAlphabetic)
        );
        assert!(validate_cake("cheesecake").is_ok());
    }
}
