//! Signed-in user record as returned by the auth endpoints.
//!
//! The backend returns a user document with a handful of well-known fields
//! and an open-ended set of profile fields (phone, address, avatar, ...).
//! Known fields are typed; everything else is carried verbatim so that a
//! shallow merge and a round trip through storage never lose data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use schoolerp_core::{DomainError, DomainResult, SchoolId, UserId};

use crate::Role;

// ─────────────────────────────────────────────────────────────────────────────
// School reference
// ─────────────────────────────────────────────────────────────────────────────

/// Minimal description of a school, as embedded in a user document or
/// chosen by a super-admin when switching tenants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolSummary {
    #[serde(alias = "_id")]
    pub id: SchoolId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SchoolSummary {
    pub fn new(id: SchoolId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            extra: Map::new(),
        }
    }
}

/// A user's school: either populated by the backend or a bare id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchoolRef {
    Summary(SchoolSummary),
    Id(SchoolId),
}

impl SchoolRef {
    pub fn id(&self) -> &SchoolId {
        match self {
            SchoolRef::Summary(summary) => &summary.id,
            SchoolRef::Id(id) => id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// The identity held by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub role: Role,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<SchoolRef>,
    /// Profile fields the client does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionUser {
    pub fn new(id: UserId, role: Role, email: impl Into<String>) -> Self {
        Self {
            id,
            role,
            first_name: String::new(),
            last_name: String::new(),
            email: email.into(),
            school: None,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    pub fn with_school(mut self, school: SchoolRef) -> Self {
        self.school = Some(school);
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn school_id(&self) -> Option<&SchoolId> {
        self.school.as_ref().map(SchoolRef::id)
    }

    /// Shallow-merge `patch` into this user, returning the merged record.
    ///
    /// Top-level keys in the patch replace the corresponding keys of the user
    /// document; nested objects are replaced wholesale, not merged. The user id
    /// is immutable.
    pub fn merged(&self, patch: &UserPatch) -> DomainResult<SessionUser> {
        let Value::Object(mut doc) = serde_json::to_value(self)
            .map_err(|e| DomainError::invariant(format!("user is not serializable: {e}")))?
        else {
            return Err(DomainError::invariant("user did not serialize to an object"));
        };

        for (key, value) in patch.fields() {
            if key == "id" || key == "_id" {
                if value.as_str() != Some(self.id.as_str()) {
                    return Err(DomainError::invariant("user id is immutable"));
                }
                continue;
            }
            doc.insert(key.clone(), value.clone());
        }

        serde_json::from_value(Value::Object(doc))
            .map_err(|e| DomainError::validation(format!("merged user is invalid: {e}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Patch
// ─────────────────────────────────────────────────────────────────────────────

/// A partial user document (wire field names, e.g. `firstName`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserPatch(Map<String, Value>);

impl UserPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a patch from a JSON value; only objects are accepted.
    pub fn from_value(value: Value) -> DomainResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DomainError::validation(format!(
                "user patch must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The full user document as a patch, e.g. to adopt a canonical user
/// returned by the backend.
impl TryFrom<&SessionUser> for UserPatch {
    type Error = DomainError;

    fn try_from(user: &SessionUser) -> DomainResult<Self> {
        match serde_json::to_value(user) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(DomainError::invariant(format!(
                "user did not serialize to an object, got {other}"
            ))),
            Err(e) => Err(DomainError::invariant(format!("user is not serializable: {e}"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn teacher() -> SessionUser {
        SessionUser::new(UserId::parse("u-1").unwrap(), Role::Teacher, "ada@school.com")
            .with_name("Ada", "Lovelace")
            .with_school(SchoolRef::Id(SchoolId::parse("s-1").unwrap()))
    }

    #[test]
    fn decodes_backend_document() {
        let user: SessionUser = serde_json::from_value(json!({
            "_id": "64f1",
            "role": "admin",
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "grace@school.com",
            "school": { "_id": "s-9", "name": "Northside High", "code": "NSH" },
            "phone": "555-0100"
        }))
        .unwrap();

        assert_eq!(user.id.as_str(), "64f1");
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.full_name(), "Grace Hopper");
        assert_eq!(user.school_id().map(SchoolId::as_str), Some("s-9"));
        assert_eq!(user.extra.get("phone"), Some(&json!("555-0100")));
        let Some(SchoolRef::Summary(school)) = &user.school else {
            panic!("expected populated school");
        };
        assert_eq!(school.name, "Northside High");
        assert_eq!(school.extra.get("code"), Some(&json!("NSH")));
    }

    #[test]
    fn school_may_be_a_bare_id() {
        let user: SessionUser = serde_json::from_value(json!({
            "id": "u-2", "role": "student", "email": "kid@school.com", "school": "s-3"
        }))
        .unwrap();
        assert_eq!(user.school, Some(SchoolRef::Id(SchoolId::parse("s-3").unwrap())));
        assert_eq!(user.full_name(), "");
    }

    #[test]
    fn storage_round_trip_preserves_extra_fields() {
        let mut user = teacher();
        user.extra.insert("avatar".into(), json!("/uploads/ada.png"));
        let stored = serde_json::to_string(&user).unwrap();
        let restored: SessionUser = serde_json::from_str(&stored).unwrap();
        assert_eq!(restored, user);
    }

    #[test]
    fn merge_adds_and_replaces_top_level_fields() {
        let user = teacher();
        let patch = UserPatch::new()
            .set("phone", "555-0101")
            .set("firstName", "Augusta");

        let merged = user.merged(&patch).unwrap();
        assert_eq!(merged.first_name, "Augusta");
        assert_eq!(merged.last_name, "Lovelace");
        assert_eq!(merged.extra.get("phone"), Some(&json!("555-0101")));
        assert_eq!(merged.id, user.id);
    }

    #[test]
    fn merge_replaces_nested_objects_wholesale() {
        let user = teacher().with_school(SchoolRef::Summary(SchoolSummary::new(
            SchoolId::parse("s-1").unwrap(),
            "Old Name",
        )));
        let patch = UserPatch::from_value(json!({ "school": "s-2" })).unwrap();
        let merged = user.merged(&patch).unwrap();
        assert_eq!(merged.school, Some(SchoolRef::Id(SchoolId::parse("s-2").unwrap())));
    }

    #[test]
    fn merge_rejects_identity_change_and_invalid_role() {
        let user = teacher();
        let err = user.merged(&UserPatch::new().set("_id", "u-other")).unwrap_err();
        assert!(err.to_string().contains("immutable"));

        let same_id = user.merged(&UserPatch::new().set("id", "u-1")).unwrap();
        assert_eq!(same_id, user);

        assert!(user.merged(&UserPatch::new().set("role", "janitor")).is_err());
    }

    #[test]
    fn user_converts_to_a_full_patch() {
        let user = teacher();
        let patch = UserPatch::try_from(&user).unwrap();
        assert_eq!(patch.fields().get("id"), Some(&json!("u-1")));
        assert_eq!(patch.fields().get("firstName"), Some(&json!("Ada")));
        assert_eq!(patch.fields().get("school"), Some(&json!("s-1")));
    }

    #[test]
    fn patch_must_be_an_object() {
        assert!(UserPatch::from_value(json!(["a"])).is_err());
        assert!(UserPatch::from_value(json!({})).unwrap().is_empty());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: merging `{x}` into `{a, b}` yields `{a, b, x}`.
            #[test]
            fn merge_is_a_shallow_union(
                key in "[a-z]{3,12}",
                value in "[A-Za-z0-9 ]{0,24}"
            ) {
                prop_assume!(!["id", "role", "email", "school"].contains(&key.as_str()));
                let user = teacher();
                let merged = user.merged(&UserPatch::new().set(key.clone(), value.clone())).unwrap();

                prop_assert_eq!(merged.extra.get(&key), Some(&Value::String(value)));
                prop_assert_eq!(&merged.email, &user.email);
                prop_assert_eq!(merged.role, user.role);
                prop_assert_eq!(merged.school_id(), user.school_id());
            }

            /// Property: merging the user's own document is a no-op.
            #[test]
            fn merge_with_self_is_identity(phone in "[0-9]{3}-[0-9]{4}") {
                let mut user = teacher();
                user.extra.insert("phone".into(), Value::String(phone));
                let patch = UserPatch::try_from(&user).unwrap();
                prop_assert_eq!(user.merged(&patch).unwrap(), user);
            }
        }
    }
}
