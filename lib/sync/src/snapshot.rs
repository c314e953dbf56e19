//! Immutable RBAC snapshot.
//!
//! A snapshot is built once per sync pass and never modified afterwards;
//! readers hold an `Arc` to whichever generation was current when they
//! loaded it.

use backbone_access::{PasswordProtectedUser, RoleRecord, UserRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One published generation of identity data.
#[derive(Debug, Clone)]
pub struct RbacSnapshot {
    generation: u64,
    published_at: DateTime<Utc>,
    users_by_email: HashMap<String, UserRecord>,
    roles_by_name: HashMap<String, RoleRecord>,
    roles_by_user: HashMap<String, Vec<RoleRecord>>,
    /// Email → password-bearing view, for users that declare a secret.
    credentials: HashMap<String, PasswordProtectedUser>,
}

impl RbacSnapshot {
    /// The generation served before the first sync completes.
    #[must_use]
    pub fn empty() -> Self {
        SnapshotBuilder::default().build(0)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    #[must_use]
    pub fn user(&self, email: &str) -> Option<&UserRecord> {
        self.users_by_email.get(email)
    }

    /// Returns the roles bound to a user, or `None` for an unknown user.
    #[must_use]
    pub fn user_roles(&self, email: &str) -> Option<&[RoleRecord]> {
        self.roles_by_user.get(email).map(Vec::as_slice)
    }

    #[must_use]
    pub fn credentials(&self, email: &str) -> Option<&PasswordProtectedUser> {
        self.credentials.get(email)
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users_by_email.len()
    }

    #[must_use]
    pub fn role_count(&self) -> usize {
        self.roles_by_name.len()
    }
}

/// Accumulates one sync pass worth of data.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    users_by_email: HashMap<String, UserRecord>,
    roles_by_name: HashMap<String, RoleRecord>,
    roles_by_user: HashMap<String, Vec<RoleRecord>>,
    credentials: HashMap<String, PasswordProtectedUser>,
}

impl SnapshotBuilder {
    /// Adds a user and seeds it with an empty role list.
    pub fn add_user(&mut self, user: UserRecord, secret_ref: Option<String>) {
        let email = user.email().to_string();
        if let Some(secret_ref) = secret_ref {
            self.credentials.insert(
                email.clone(),
                PasswordProtectedUser::new(user.clone(), secret_ref),
            );
        } else {
            self.credentials.remove(&email);
        }
        self.roles_by_user.entry(email.clone()).or_default();
        self.users_by_email.insert(email, user);
    }

    pub fn add_role(&mut self, role: RoleRecord) {
        self.roles_by_name.insert(role.role_name().to_string(), role);
    }

    /// Grants a role to a user. Binding the same role twice has no effect.
    pub fn bind(&mut self, email: &str, role: RoleRecord) {
        let roles = self.roles_by_user.entry(email.to_string()).or_default();
        if !roles.iter().any(|r| r.role_name() == role.role_name()) {
            roles.push(role);
        }
    }

    #[must_use]
    pub fn build(self, generation: u64) -> RbacSnapshot {
        RbacSnapshot {
            generation,
            published_at: Utc::now(),
            users_by_email: self.users_by_email,
            roles_by_name: self.roles_by_name,
            roles_by_user: self.roles_by_user,
            credentials: self.credentials,
        }
    }
}
