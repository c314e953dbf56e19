//! Authenticated identity derived from a validated session.

use crate::error::SessionError;
use crate::role::RoleSnapshot;
use crate::session::SessionContext;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity and role permissions of the caller, derived per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    username: String,
    /// Role name → permissions.
    roles: BTreeMap<String, Vec<String>>,
    /// Unix milliseconds. Zero when the session carried no expiry.
    expiration: i64,
}

impl AuthContext {
    /// Builds the context from the attributes session validation attached.
    ///
    /// Fails when the username is missing or the role snapshot does not decode.
    pub fn from_session(session: &SessionContext) -> Result<Self, Report<SessionError>> {
        let username = session
            .username
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SessionError::CannotExtract {
                reason: "unable to get username from session".to_string(),
            })?;

        let roles_json = session.roles.as_deref().unwrap_or_default();
        let snapshot: RoleSnapshot =
            serde_json::from_str(roles_json).map_err(|_| SessionError::CannotExtract {
                reason: "unable to get roles from session".to_string(),
            })?;

        Ok(Self {
            username: username.to_string(),
            roles: snapshot.permissions_by_role(),
            expiration: session.expires_at.unwrap_or_default(),
        })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn roles(&self) -> &BTreeMap<String, Vec<String>> {
        &self.roles
    }

    #[must_use]
    pub fn expiration(&self) -> i64 {
        self.expiration
    }

    #[must_use]
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expiration < now_millis
    }
}
