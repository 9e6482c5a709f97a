//! User and group document models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use olp_common::{Error, Result};

/// Collection name for user documents
pub const USERS: &str = "users";

/// Collection name for group documents
pub const USER_GROUPS: &str = "user_groups";

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_INACTIVE: &str = "inactive";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub uuid: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_type: String,
    pub status: String,
    /// Groups this user belongs to; mirrored in each group's `users` list
    #[serde(default)]
    pub user_groups: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGroup {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Members; mirrored in each user's `user_groups` list
    #[serde(default)]
    pub users: Vec<Uuid>,
}

/// Minimal shape check: one '@', non-empty local part, domain with a dot,
/// no whitespace. Deliverability is the mail system's problem.
pub fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(Error::Validation(format!("Invalid email '{}'", email)));
    }
    Ok(())
}

pub fn validate_status(status: &str) -> Result<()> {
    if status != STATUS_ACTIVE && status != STATUS_INACTIVE {
        return Err(Error::Validation(format!(
            "Status must be '{}' or '{}', got '{}'",
            STATUS_ACTIVE, STATUS_INACTIVE, status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails_accepted() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("first.last@sub.example.org").is_ok());
    }

    #[test]
    fn test_invalid_emails_rejected() {
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@nodot").is_err());
        assert!(validate_email("user@.com").is_err());
        assert!(validate_email("user name@example.com").is_err());
    }

    #[test]
    fn test_status_values() {
        assert!(validate_status("active").is_ok());
        assert!(validate_status("inactive").is_ok());
        assert!(validate_status("suspended").is_err());
    }
}
