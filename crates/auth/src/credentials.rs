//! Login and password-change inputs.
//!
//! Validation here is limited to what the client can decide without the
//! backend: required fields. Password values never appear in `Debug` output.

use schoolerp_core::{DomainError, DomainResult};

/// Login credentials.
///
/// `identifier` is an email address or a username assigned by a school admin
/// (students and teachers often get the latter).
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    identifier: String,
    password: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> DomainResult<Self> {
        let identifier = identifier.into().trim().to_string();
        let password = password.into();

        if identifier.is_empty() {
            return Err(DomainError::validation("email or username is required"));
        }
        if password.is_empty() {
            return Err(DomainError::validation("password is required"));
        }

        Ok(Self {
            identifier,
            password,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Request to change the signed-in user's password.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordChange {
    current: String,
    new: String,
}

impl PasswordChange {
    pub fn new(current: impl Into<String>, new: impl Into<String>) -> DomainResult<Self> {
        let current = current.into();
        let new = new.into();

        if current.is_empty() {
            return Err(DomainError::validation("current password is required"));
        }
        if new.is_empty() {
            return Err(DomainError::validation("new password is required"));
        }

        Ok(Self { current, new })
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn new_password(&self) -> &str {
        &self.new
    }
}

impl core::fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordChange { .. }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_is_trimmed_and_required() {
        let creds = Credentials::new("  admin@school.com ", "secret").unwrap();
        assert_eq!(creds.identifier(), "admin@school.com");

        let err = Credentials::new("   ", "secret").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn password_is_required_but_not_trimmed() {
        assert!(Credentials::new("stu-042", "").is_err());
        let creds = Credentials::new("stu-042", " spaced ").unwrap();
        assert_eq!(creds.password(), " spaced ");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = Credentials::new("admin@school.com", "hunter2").unwrap();
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("admin@school.com"));
        assert!(!rendered.contains("hunter2"));

        let change = PasswordChange::new("old-pass", "new-pass").unwrap();
        let rendered = format!("{change:?}");
        assert!(!rendered.contains("old-pass"));
        assert!(!rendered.contains("new-pass"));
    }

    #[test]
    fn password_change_requires_both_fields() {
        assert!(PasswordChange::new("", "next").is_err());
        assert!(PasswordChange::new("prev", "").is_err());
        let change = PasswordChange::new("prev", "next").unwrap();
        assert_eq!(change.current(), "prev");
        assert_eq!(change.new_password(), "next");
    }
}
