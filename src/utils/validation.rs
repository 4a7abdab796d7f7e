//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Usernames start with a letter and may contain letters, digits, dot, dash and underscore
static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9._-]*$").unwrap()
});

/// Intentionally loose: one `@`, no whitespace, a dot in the domain part
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap()
});

/// Validate a username
pub fn validate_username(username: &str) -> bool {
    username.len() >= 3 && username.len() <= 64 && USERNAME_REGEX.is_match(username)
}

/// Validate an email address
pub fn validate_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Validate a password against the configured minimum length
///
/// Requires at least one letter and one digit.
pub fn validate_password(password: &str, min_length: usize) -> bool {
    password.chars().count() >= min_length
        && password.chars().any(|c| c.is_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Escape a single CSV field
pub fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
