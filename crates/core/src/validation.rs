//! Input normalisation and server-side bounds for client-supplied values.

use crate::error::CoreError;

/// Share lifetimes the server issues, in hours. Ascending.
pub const SHARE_EXPIRY_HOURS: [i64; 5] = [1, 6, 24, 72, 168];

/// Minimum length for account passwords.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Upper bound on any password we are willing to hash.
pub const MAX_PASSWORD_LENGTH: usize = 256;

/// Clamp a requested share lifetime to the longest allow-listed value that
/// does not exceed it. Requests above the largest entry get that entry.
/// Non-positive requests are rejected.
pub fn clamp_share_expiry(hours: i64) -> Result<i64, CoreError> {
    if hours <= 0 {
        return Err(CoreError::Validation(
            "expiresInHours must be a positive number of hours".to_string(),
        ));
    }
    Ok(SHARE_EXPIRY_HOURS
        .iter()
        .copied()
        .take_while(|&allowed| allowed <= hours)
        .last()
        .unwrap_or(SHARE_EXPIRY_HOURS[0]))
}

/// Trim and lower-case an email so uniqueness is case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_password_strength(password: &str) -> Result<(), CoreError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(CoreError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(CoreError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn share_expiry_clamps_down_to_allow_list() {
        for hours in SHARE_EXPIRY_HOURS {
            assert_eq!(clamp_share_expiry(hours).unwrap(), hours);
        }
        assert_eq!(clamp_share_expiry(2).unwrap(), 1);
        assert_eq!(clamp_share_expiry(48).unwrap(), 24);
        assert_eq!(clamp_share_expiry(100).unwrap(), 72);
        assert_eq!(clamp_share_expiry(169).unwrap(), 168);
        assert_eq!(clamp_share_expiry(i64::MAX).unwrap(), 168);
    }

    #[test]
    fn share_expiry_rejects_non_positive() {
        assert_matches!(clamp_share_expiry(0), Err(CoreError::Validation(_)));
        assert_matches!(clamp_share_expiry(-5), Err(CoreError::Validation(_)));
    }

    #[test]
    fn email_is_case_folded() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn password_bounds() {
        assert!(validate_password_strength("short").is_err());
        assert!(validate_password_strength("twelve_chars").is_ok());
        assert!(validate_password_strength(&"x".repeat(300)).is_err());
    }
}
