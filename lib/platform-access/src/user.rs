//! User identity types.
//!
//! A user is keyed by email. Users that can log in with a password carry a
//! reference to the secret holding it; that view is a separate type wrapping
//! the plain record.

use serde::{Deserialize, Serialize};

/// A user identity mirrored from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Identity key.
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

impl UserRecord {
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Returns the user's email, which is also their identity key.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    #[must_use]
    pub fn last_name(&self) -> &str {
        &self.last_name
    }
}

/// A user whose password lives in a named secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordProtectedUser {
    user: UserRecord,
    secret_ref: String,
}

impl PasswordProtectedUser {
    #[must_use]
    pub fn new(user: UserRecord, secret_ref: impl Into<String>) -> Self {
        Self {
            user,
            secret_ref: secret_ref.into(),
        }
    }

    #[must_use]
    pub fn user(&self) -> &UserRecord {
        &self.user
    }

    /// Returns the name of the secret holding this user's password.
    #[must_use]
    pub fn secret_ref(&self) -> &str {
        &self.secret_ref
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_without_names() {
        let user: UserRecord =
            serde_json::from_str(r#"{"email":"a@x.com","firstName":"Ada"}"#).expect("decode");
        assert_eq!(user.email(), "a@x.com");
        assert_eq!(user.first_name(), "Ada");
        assert_eq!(user.last_name(), "");
    }

    #[test]
    fn password_view_wraps_record() {
        let user = UserRecord::new("a@x.com", "Ada", "Lovelace");
        let protected = PasswordProtectedUser::new(user.clone(), "a-password");

        assert_eq!(protected.user(), &user);
        assert_eq!(protected.secret_ref(), "a-password");
    }
}
