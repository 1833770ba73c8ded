//! Input validation shared by the CRUD operations

use crate::constants::{
    HTTP_METHODS, MAX_KEY_PART, NAME_MAX_LEN, NAME_MIN_LEN, PASSWORD_MAX_LEN, PASSWORD_MIN_LEN, PHONE_MAX_DIGITS,
    TEXT_MAX_LEN,
};
use crate::error::{PathbitError, Result};

fn invalid<T>(msg: String) -> Result<T> {
    Err(PathbitError::Invalid(msg))
}

/// Names and usernames: trimmed, NAME_MIN_LEN..=NAME_MAX_LEN characters
pub fn name(field: &str, value: &str) -> Result<String> {
    let v = value.trim();
    let n = v.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&n) {
        return invalid(format!("{} must be {}..={} characters", field, NAME_MIN_LEN, NAME_MAX_LEN));
    }
    if v.len() > MAX_KEY_PART {
        return invalid(format!("{} must be at most {} bytes", field, MAX_KEY_PART));
    }
    Ok(v.to_string())
}

/// Free text (descriptions, remarks, nicknames)
pub fn text(field: &str, value: &str) -> Result<String> {
    if value.chars().count() > TEXT_MAX_LEN {
        return invalid(format!("{} must be at most {} characters", field, TEXT_MAX_LEN));
    }
    Ok(value.to_string())
}

/// Optional email: empty, or `local@domain` with a dot in the domain
pub fn email(value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Ok(String::new());
    }
    let ok = match v.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !ok || v.len() > MAX_KEY_PART || v.chars().any(char::is_whitespace) {
        return invalid(format!("invalid email '{}'", v));
    }
    Ok(v.to_string())
}

/// Optional phone in E.164 form
pub fn phone(value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Ok(String::new());
    }
    let ok = match v.strip_prefix('+') {
        Some(digits) => {
            (2..=PHONE_MAX_DIGITS).contains(&digits.len())
                && digits.bytes().all(|b| b.is_ascii_digit())
                && !digits.starts_with('0')
        }
        None => false,
    };
    if !ok {
        return invalid(format!("invalid phone '{}', expected E.164", v));
    }
    Ok(v.to_string())
}

pub fn password(value: &str) -> Result<()> {
    let n = value.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&n) {
        return invalid(format!("password must be {}..={} characters", PASSWORD_MIN_LEN, PASSWORD_MAX_LEN));
    }
    Ok(())
}

/// Upper-cased HTTP verb
pub fn method(value: &str) -> Result<String> {
    let m = value.trim().to_ascii_uppercase();
    if !HTTP_METHODS.contains(&m.as_str()) {
        return invalid(format!("unsupported method '{}'", value));
    }
    Ok(m)
}

/// Endpoint pattern: starts with `/`, no whitespace, fits a key part
pub fn pattern(value: &str) -> Result<String> {
    let p = value.trim();
    if !p.starts_with('/') || p.chars().any(char::is_whitespace) {
        return invalid(format!("path '{}' must start with '/' and contain no whitespace", value));
    }
    if p.len() > MAX_KEY_PART {
        return invalid(format!("path must be at most {} bytes", MAX_KEY_PART));
    }
    Ok(p.to_string())
}
