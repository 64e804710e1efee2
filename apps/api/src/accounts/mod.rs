//! Seeker and employer accounts: registration data, profiles, and login-day tracking.

pub mod directory;
pub mod handlers;
pub mod queries;

use serde::Serialize;

use crate::errors::AppError;
use crate::models::account::{EmployerRow, SeekerRow};

/// The caller's own account, tagged by kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Profile {
    Seeker(SeekerRow),
    Employer(EmployerRow),
    Admin { email: String },
}

/// Trims and lower-cases an email address, rejecting obviously malformed ones.
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AppError::Validation(format!("'{}' is not a valid email address", raw.trim())))
    }
}

/// Empty strings from forms are stored as NULL.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_lowercases_and_trims() {
        assert_eq!(
            normalize_email("  Ada.Lovelace@Example.COM ").unwrap(),
            "ada.lovelace@example.com"
        );
    }

    #[test]
    fn test_normalize_email_rejects_malformed() {
        for bad in ["", "no-at-sign", "@example.com", "a@b", "a@@b.com", "a b@c.com", "a@.com"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_clean_optional() {
        assert_eq!(clean_optional(Some("  ".to_string())), None);
        assert_eq!(clean_optional(Some(" BSc ".to_string())), Some("BSc".to_string()));
        assert_eq!(clean_optional(None), None);
    }

    #[test]
    fn test_profile_is_tagged_by_kind() {
        let profile = Profile::Seeker(crate::testing::seeker());
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["type"], "seeker");
        assert!(json.get("password_hash").is_none());

        let admin = serde_json::to_value(Profile::Admin {
            email: "root@example.com".to_string(),
        })
        .unwrap();
        assert_eq!(admin["type"], "admin");
    }
}
