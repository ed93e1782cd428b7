//! Request validation module
//!
//! Provides validation utilities for identifiers carried in request bodies
//! and query strings.

use crate::error::ApiError;

/// Maximum length accepted for participant ids, class ids and names
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Maximum length accepted for device fingerprints
pub const MAX_FINGERPRINT_LEN: usize = 512;

/// Validates a required text field
///
/// Returns the trimmed value. Rejects empty values, values longer than
/// `max_len` and values containing control characters.
pub fn require_field<'a>(field: &str, value: &'a str, max_len: usize) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    validate_text(field, trimmed, max_len)?;
    Ok(trimmed)
}

/// Validates an optional text field; empty counts as absent.
pub fn optional_field<'a>(
    field: &str,
    value: Option<&'a str>,
    max_len: usize,
) -> Result<Option<&'a str>, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => {
            validate_text(field, v, max_len)?;
            Ok(Some(v))
        }
        _ => Ok(None),
    }
}

/// Validates a device fingerprint
///
/// Fingerprints are opaque and compared byte for byte, so the value is
/// returned untrimmed. An empty value is allowed only when `required` is false.
pub fn fingerprint_field<'a>(
    field: &str,
    value: &'a str,
    required: bool,
) -> Result<&'a str, ApiError> {
    if required && value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    validate_text(field, value, MAX_FINGERPRINT_LEN)?;
    Ok(value)
}

fn validate_text(field: &str, value: &str, max_len: usize) -> Result<(), ApiError> {
    if value.len() > max_len {
        return Err(ApiError::bad_request(format!(
            "{} too long: {} bytes exceeds maximum of {} bytes",
            field,
            value.len(),
            max_len
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(ApiError::bad_request(format!(
            "{} contains control characters",
            field
        )));
    }
    Ok(())
}
