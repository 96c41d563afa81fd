//! Input checks for registration and sign-in.

use crate::error::{ApiError, AppError};
use crate::models::User;
use regex::Regex;
use std::sync::LazyLock;

const EMAIL_PATTERN: &str = r"^[a-z0-9.\-_]+@[a-z0-9\-_]+(\.[a-z0-9\-_]+){1,4}$";
const SHA1_PATTERN: &str = r"^[0-9a-f]{40}$";

static EMAIL: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN));
static SHA1: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(SHA1_PATTERN));

fn matches(re: &Result<Regex, regex::Error>, s: &str) -> Result<bool, AppError> {
    match re {
        Ok(re) => Ok(re.is_match(s)),
        Err(e) => Err(AppError::Config(format!("invalid pattern: {}", e))),
    }
}

pub fn is_email(s: &str) -> Result<bool, AppError> {
    matches(&EMAIL, s)
}

/// 40 lowercase hex chars, as produced by the browser-side SHA-1 of `email:password`.
pub fn is_sha1(s: &str) -> Result<bool, AppError> {
    matches(&SHA1, s)
}

/// Trimmed value, or a `value:invalid` error naming `field`.
pub fn non_blank(field: &str, value: Option<String>, message: &str) -> Result<String, AppError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::value_invalid(field, message).into()),
    }
}

pub fn check_admin(user: Option<&User>) -> Result<(), AppError> {
    match user {
        Some(u) if u.admin() => Ok(()),
        _ => Err(ApiError::permission("admin only").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_pattern() {
        assert!(is_email("ann.lee@example.com").unwrap());
        assert!(is_email("a_b-c@mail.co.uk").unwrap());
        assert!(!is_email("Ann@example.com").unwrap());
        assert!(!is_email("ann@localhost").unwrap());
        assert!(!is_email("ann@a.b.c.d.e.f").unwrap());
    }

    #[test]
    fn sha1_pattern() {
        assert!(is_sha1(&"a".repeat(40)).unwrap());
        assert!(!is_sha1(&"A".repeat(40)).unwrap());
        assert!(!is_sha1(&"a".repeat(39)).unwrap());
    }

    #[test]
    fn non_blank_trims_or_fails() {
        assert_eq!(non_blank("name", Some("  x ".into()), "").unwrap(), "x");
        let err = non_blank("name", Some("   ".into()), "name cannot be empty.").unwrap_err();
        assert!(matches!(err, AppError::Api(e) if e.data == "name" && e.error == "value:invalid"));
        assert!(non_blank("name", None, "").is_err());
    }

    #[test]
    fn admin_check() {
        assert!(check_admin(Some(&User::new().with("admin", true))).is_ok());
        assert!(check_admin(Some(&User::new().with("admin", false))).is_err());
        let err = check_admin(None).unwrap_err();
        assert!(matches!(err, AppError::Api(e) if e.error == "permission:forbidden"));
    }
}
