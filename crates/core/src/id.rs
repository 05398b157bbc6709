//! Strongly-typed identifiers used across the client.
//!
//! The backend issues opaque string identifiers (document ids), so these
//! newtypes wrap a validated `String` rather than a UUID.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a school (the multi-tenant boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchoolId(String);

/// Identifier of a user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

fn validate_raw(raw: &str, name: &str) -> Result<(), DomainError> {
    if raw.is_empty() {
        return Err(DomainError::invalid_id(format!("{name}: empty")));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(DomainError::invalid_id(format!(
            "{name}: contains whitespace ({raw:?})"
        )));
    }
    Ok(())
}

macro_rules! impl_string_id {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Parse and validate an identifier issued by the backend.
            pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
                let raw = raw.into();
                validate_raw(&raw, $name)?;
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

impl_string_id!(SchoolId, "SchoolId");
impl_string_id!(UserId, "UserId");
