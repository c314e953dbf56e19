//! Locally issued broker tokens.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::role::{RoleRecord, RoleSnapshot};

/// Name of the cookie the issued token is also set in.
pub const TOKEN_COOKIE: &str = "backbone_token";

/// Lifetime of an issued token.
pub const TOKEN_TTL_HOURS: i64 = 12;

/// Claims of a backbone-issued ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalClaims {
    pub iss: String,
    /// The user's email.
    pub sub: String,
    pub aud: String,
    /// Role name → permissions.
    pub roles: BTreeMap<String, Vec<String>>,
    pub iat: i64,
    pub exp: i64,
}

impl LocalClaims {
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        audience: impl Into<String>,
        roles: Vec<RoleRecord>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            iss: issuer.into(),
            sub: subject.into(),
            aud: audience.into(),
            roles: RoleSnapshot::new(roles).permissions_by_role(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

/// Token response returned from the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub token_type: String,
    /// Seconds until expiry.
    pub expires_in: i64,
}

impl IssuedToken {
    #[must_use]
    pub fn bearer(token: String, expires_in: i64) -> Self {
        Self {
            token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}
