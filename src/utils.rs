// Utility modules

use crate::{
    constants::{DEFAULT_PAGE_LIMIT, MAX_FIELD_LENGTH, MAX_PAGE_LIMIT, MIN_PASSWORD_LENGTH},
    error::{AppError, Result},
};

const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_LIMIT;

/// Clamps client paging input. Returns `(page, limit, offset)`; pages start at 1.
/// The page cap keeps `offset` within `i64` for any accepted limit.
pub fn normalize_page(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).clamp(1, MAX_PAGE);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    (page, limit, (page - 1) * limit)
}

/// Escapes `%`, `_` and `\` so user input matches literally inside `LIKE ... ESCAPE '\'`.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Trims a submitted field; absent and whitespace-only both count as missing.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Optional field for partial updates: absent stays `None`, present must not be blank.
pub fn optional_field(value: Option<&str>, field: &str) -> Result<Option<String>> {
    let value = optional_text(value, field)?;
    if let Some(value) = value.as_deref() {
        ensure_max_length(value, field)?;
    }
    Ok(value)
}

/// Like [`optional_field`] without the length cap, for free-form bodies.
pub fn optional_text(value: Option<&str>, field: &str) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(raw) => non_blank(Some(raw))
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("{field} cannot be empty"))),
    }
}

pub fn ensure_max_length(value: &str, field: &str) -> Result<()> {
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "{field} exceeds maximum length ({MAX_FIELD_LENGTH})"
        )));
    }
    Ok(())
}

/// Something@something.tld with no whitespace.
pub fn validate_email(email: &str) -> Result<()> {
    let valid = !email.chars().any(char::is_whitespace)
        && email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        });
    if !valid {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    Ok(())
}

/// At least eight ASCII letters/digits with one upper-case letter, one lower-case letter and one digit.
pub fn validate_password(password: &str) -> Result<()> {
    let strong = password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().all(|c| c.is_ascii_alphanumeric())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit());
    if !strong {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters long, contain at least one uppercase letter, one lowercase letter, and one number"
                .to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_page_applies_defaults_and_caps() {
        assert_eq!(normalize_page(None, None), (1, 20, 0));
        assert_eq!(normalize_page(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(normalize_page(Some(0), Some(1000)), (1, 100, 0));
        assert_eq!(normalize_page(Some(-4), Some(0)), (1, 1, 0));
    }

    #[test]
    fn normalize_page_caps_huge_page_numbers() {
        let (page, limit, offset) = normalize_page(Some(i64::MAX), Some(MAX_PAGE_LIMIT));
        assert_eq!(page, i64::MAX / MAX_PAGE_LIMIT);
        assert_eq!(limit, MAX_PAGE_LIMIT);
        assert_eq!(offset, (page - 1) * MAX_PAGE_LIMIT);
        assert!(offset > 0);
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c\\d"), "c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn non_blank_trims() {
        assert_eq!(non_blank(Some("  x ")), Some("x".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn optional_field_rejects_blank() {
        assert_eq!(optional_field(None, "title").unwrap(), None);
        assert_eq!(
            optional_field(Some(" t "), "title").unwrap(),
            Some("t".to_string())
        );
        assert!(optional_field(Some(" "), "title").is_err());
        assert!(optional_field(Some(&"x".repeat(MAX_FIELD_LENGTH + 1)), "title").is_err());
    }

    #[test]
    fn optional_text_has_no_length_cap() {
        let long = "x".repeat(MAX_FIELD_LENGTH + 1);
        assert_eq!(optional_text(Some(&long), "content").unwrap(), Some(long));
        assert!(optional_text(Some("  "), "content").is_err());
        assert_eq!(optional_text(None, "content").unwrap(), None);
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("user@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("us er@example.com").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }

    #[test]
    fn password_validation() {
        assert!(validate_password("Secret123").is_ok());
        assert!(validate_password("secret123").is_err());
        assert!(validate_password("SECRET123").is_err());
        assert!(validate_password("SecretXYZ").is_err());
        assert!(validate_password("Sec12").is_err());
        assert!(validate_password("Secret 123").is_err());
    }
}
