//! Validation helpers for DTOs.

use validator::ValidationError;

/// Maximum length accepted for display names.
const USERNAME_MAX_LEN: usize = 32;

/// Validates that a username is non-empty, trimmed, and at most 32 characters.
///
/// # Examples
///
/// ```ignore
/// validate_username("alice")   // Ok
/// validate_username("")        // Err - empty
/// validate_username(" alice ") // Err - surrounding whitespace
/// ```
pub fn validate_username(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        let mut err = ValidationError::new("username_empty");
        err.message = Some("Username must not be empty".into());
        return Err(err);
    }

    if name.trim() != name {
        let mut err = ValidationError::new("username_whitespace");
        err.message = Some("Username must not start or end with whitespace".into());
        return Err(err);
    }

    if name.chars().count() > USERNAME_MAX_LEN {
        let mut err = ValidationError::new("username_length");
        err.message =
            Some(format!("Username must be at most {USERNAME_MAX_LEN} characters").into());
        return Err(err);
    }

    Ok(())
}
