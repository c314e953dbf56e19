//! Role and permission types for access control.
//!
//! Roles are named lists of permission strings. Users acquire roles through
//! bindings; the resolved mapping is served by a [`RoleDirectory`].

use crate::error::LookupError;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named role and the permissions it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    role_name: String,
    #[serde(default)]
    permissions: Vec<String>,
}

impl RoleRecord {
    #[must_use]
    pub fn new(role_name: impl Into<String>, permissions: Vec<String>) -> Self {
        Self {
            role_name: role_name.into(),
            permissions,
        }
    }

    #[must_use]
    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// Returns the permissions in declaration order.
    #[must_use]
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }
}

/// An edge from a user resource to a role resource, both by resource name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBinding {
    user_ref: String,
    role_ref: String,
}

impl RoleBinding {
    #[must_use]
    pub fn user_ref(&self) -> &str {
        &self.user_ref
    }

    #[must_use]
    pub fn role_ref(&self) -> &str {
        &self.role_ref
    }
}

/// The role list serialized into a session at issuance.
///
/// Encoded as `{"roles":[{"roleName":..,"permissions":[..]}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSnapshot {
    #[serde(default)]
    pub roles: Vec<RoleRecord>,
}

impl RoleSnapshot {
    #[must_use]
    pub fn new(roles: Vec<RoleRecord>) -> Self {
        Self { roles }
    }

    /// Flattens the list into role name → permissions. A later role with the
    /// same name replaces an earlier one.
    #[must_use]
    pub fn permissions_by_role(&self) -> BTreeMap<String, Vec<String>> {
        self.roles
            .iter()
            .map(|role| (role.role_name.clone(), role.permissions.clone()))
            .collect()
    }
}

/// Resolves a user's roles from the current RBAC snapshot.
pub trait RoleDirectory: Send + Sync {
    /// Returns the user's roles. A known user with no bindings yields an
    /// empty list; an unknown user yields [`LookupError::NotFound`].
    fn user_roles(&self, email: &str) -> Result<Vec<RoleRecord>, Report<LookupError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_record_wire_format() {
        let role = RoleRecord::new("admin", vec!["read".to_string(), "write".to_string()]);
        let json = serde_json::to_value(&role).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"roleName": "admin", "permissions": ["read", "write"]})
        );
    }

    #[test]
    fn role_without_permissions_decodes_empty() {
        let role: RoleRecord = serde_json::from_str(r#"{"roleName":"viewer"}"#).expect("decode");
        assert!(role.permissions().is_empty());
    }

    #[test]
    fn binding_decodes_refs() {
        let binding: RoleBinding =
            serde_json::from_str(r#"{"userRef":"alice","roleRef":"admin"}"#).expect("decode");
        assert_eq!(binding.user_ref(), "alice");
        assert_eq!(binding.role_ref(), "admin");
    }

    #[test]
    fn snapshot_flattens_to_map() {
        let snapshot = RoleSnapshot::new(vec![
            RoleRecord::new("admin", vec!["read".to_string(), "write".to_string()]),
            RoleRecord::new("viewer", vec!["read".to_string()]),
        ]);

        let map = snapshot.permissions_by_role();
        assert_eq!(map.len(), 2);
        assert_eq!(map["admin"], vec!["read", "write"]);
        assert_eq!(map["viewer"], vec!["read"]);
    }

    #[test]
    fn snapshot_encodes_roles_envelope() {
        let snapshot = RoleSnapshot::new(vec![RoleRecord::new("admin", vec![])]);
        let encoded = serde_json::to_string(&snapshot).expect("serialize");
        assert_eq!(encoded, r#"{"roles":[{"roleName":"admin","permissions":[]}]}"#);
    }
}
