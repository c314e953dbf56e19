//! Session management for authenticated users.
//!
//! Sessions are issued on a successful password login and live entirely in
//! an encrypted cookie; there is no server-side session table. The cookie
//! carries the token, the username, the role snapshot taken at issuance and
//! the expiry in unix milliseconds.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, thread_rng};
use rootcause::Report;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::role::{RoleRecord, RoleSnapshot};

/// Name of the cookie carrying the session.
pub const SESSION_COOKIE: &str = "backbone_session";

/// How long an issued session stays valid.
pub const SESSION_TTL_HOURS: i64 = 12;

/// Returns 32 random bytes encoded as unpadded base64url.
#[must_use]
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    thread_rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// An issued session.
///
/// Sessions are never mutated after issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    username: String,
    roles: RoleSnapshot,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Issues a new session valid for [`SESSION_TTL_HOURS`].
    #[must_use]
    pub fn issue(username: impl Into<String>, roles: Vec<RoleRecord>) -> Self {
        Self::issue_at(username, roles, Utc::now(), Duration::hours(SESSION_TTL_HOURS))
    }

    /// Issues a session with an explicit start time and lifetime.
    #[must_use]
    pub fn issue_at(
        username: impl Into<String>,
        roles: Vec<RoleRecord>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            token: random_token(),
            username: username.into(),
            roles: RoleSnapshot::new(roles),
            expires_at: now + ttl,
        }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the roles captured when the session was issued.
    #[must_use]
    pub fn roles(&self) -> &RoleSnapshot {
        &self.roles
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Builds the cookie payload for this session.
    pub fn to_payload(&self) -> Result<SessionPayload, Report<SessionError>> {
        let roles = serde_json::to_string(&self.roles).map_err(|e| SessionError::CannotExtract {
            reason: e.to_string(),
        })?;

        Ok(SessionPayload {
            token: Some(self.token.clone()),
            username: Some(self.username.clone()),
            roles: Some(roles),
            exp: Some(serde_json::Value::from(self.expires_at.timestamp_millis())),
        })
    }
}

/// The decrypted contents of a session cookie.
///
/// Every field is optional so a partial or foreign cookie can be classified
/// into the right rejection instead of failing to decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// JSON encoded [`RoleSnapshot`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<String>,
    /// Expiry in unix milliseconds. Kept untyped so a non-numeric value can
    /// be told apart from a missing one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<serde_json::Value>,
}

impl SessionPayload {
    /// Decodes a cookie value.
    pub fn decode(value: &str) -> Result<Self, Report<SessionError>> {
        Ok(
            serde_json::from_str(value).map_err(|e| SessionError::CannotExtract {
                reason: e.to_string(),
            })?,
        )
    }

    /// Encodes the payload as a cookie value.
    pub fn encode(&self) -> Result<String, Report<SessionError>> {
        Ok(
            serde_json::to_string(self).map_err(|e| SessionError::CannotExtract {
                reason: e.to_string(),
            })?,
        )
    }

    /// Checks the payload the way every session-protected route does.
    ///
    /// No token means not logged in. An expiry that is present must be an
    /// integer and must not be in the past. A payload without an expiry is
    /// passed through.
    pub fn validate(self, now_millis: i64) -> Result<SessionContext, Report<SessionError>> {
        if self.token.is_none() {
            return Err(SessionError::NotLoggedIn.into());
        }

        let expires_at = match &self.exp {
            None => None,
            Some(value) => {
                let exp = value.as_i64().ok_or_else(|| SessionError::CannotExtract {
                    reason: format!("expiry is not an integer: {value}"),
                })?;
                if exp < now_millis {
                    return Err(SessionError::Expired.into());
                }
                Some(exp)
            }
        };

        Ok(SessionContext {
            username: self.username,
            roles: self.roles,
            expires_at,
        })
    }
}

/// The request-scoped attributes attached by session validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub username: Option<String>,
    pub roles: Option<String>,
    pub expires_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn admin() -> RoleRecord {
        RoleRecord::new("admin", vec!["read".to_string(), "write".to_string()])
    }

    #[test]
    fn random_tokens_are_unique_and_unpadded() {
        let a = random_token();
        let b = random_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(!a.contains('='));
    }

    #[test]
    fn issued_session_expires_after_twelve_hours() {
        let now = Utc::now();
        let session = Session::issue_at("a@x.com", vec![admin()], now, Duration::hours(12));

        assert_eq!(session.username(), "a@x.com");
        assert_eq!(session.expires_at() - now, Duration::hours(12));
        assert_eq!(session.roles().roles, vec![admin()]);
    }

    #[test]
    fn issued_payload_validates() {
        let session = Session::issue("a@x.com", vec![admin()]);
        let payload = session.to_payload().expect("payload");

        let encoded = payload.encode().expect("encode");
        let decoded = SessionPayload::decode(&encoded).expect("decode");
        let context = decoded
            .validate(Utc::now().timestamp_millis())
            .expect("valid");

        assert_eq!(context.username.as_deref(), Some("a@x.com"));
        assert_eq!(context.expires_at, Some(session.expires_at().timestamp_millis()));
        assert!(context.roles.expect("roles").contains("\"roleName\":\"admin\""));
    }

    #[test]
    fn missing_token_is_not_logged_in() {
        let payload = SessionPayload {
            username: Some("a@x.com".to_string()),
            ..SessionPayload::default()
        };

        let err = payload.validate(0).expect_err("should reject");
        assert_eq!(err.current_context(), &SessionError::NotLoggedIn);
    }

    #[test]
    fn past_expiry_is_expired() {
        let payload = SessionPayload {
            token: Some("t".to_string()),
            exp: Some(json!(1_000)),
            ..SessionPayload::default()
        };

        let err = payload.validate(2_000).expect_err("should reject");
        assert_eq!(err.current_context(), &SessionError::Expired);
    }

    #[test]
    fn non_numeric_expiry_cannot_be_extracted() {
        let payload = SessionPayload {
            token: Some("t".to_string()),
            exp: Some(json!("tomorrow")),
            ..SessionPayload::default()
        };

        let err = payload.validate(0).expect_err("should reject");
        assert!(matches!(
            err.current_context(),
            SessionError::CannotExtract { .. }
        ));
    }

    #[test]
    fn missing_expiry_passes_through() {
        let payload = SessionPayload {
            token: Some("t".to_string()),
            username: Some("a@x.com".to_string()),
            ..SessionPayload::default()
        };

        let context = payload.validate(i64::MAX).expect("valid");
        assert_eq!(context.expires_at, None);
    }

    #[test]
    fn garbage_cookie_cannot_be_extracted() {
        let err = SessionPayload::decode("not json").expect_err("should fail");
        assert!(matches!(
            err.current_context(),
            SessionError::CannotExtract { .. }
        ));
    }
}
