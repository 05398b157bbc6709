use core::str::FromStr;

use serde::{Deserialize, Serialize};

use schoolerp_core::DomainError;

/// Role of a signed-in account.
///
/// The set is closed: adding a role is a compile-time change, and every
/// role-gated boundary matches on it exhaustively.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform operator; manages schools and may switch between them.
    SuperAdmin,
    /// Administrator of a single school.
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::Teacher, Role::Student];

    /// Wire name used by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "superadmin",
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Whether accounts with this role belong to exactly one school.
    pub fn is_school_scoped(&self) -> bool {
        match self {
            Role::SuperAdmin => false,
            Role::Admin | Role::Teacher | Role::Student => true,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown role '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "principal".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("principal"));
        assert!(serde_json::from_str::<Role>("\"Admin\"").is_err());
    }

    #[test]
    fn only_super_admin_spans_schools() {
        assert!(!Role::SuperAdmin.is_school_scoped());
        assert!(Role::Teacher.is_school_scoped());
    }
}
