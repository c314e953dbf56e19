//! Secret resolution.

use backbone_store::{ResourceKind, ResourceStore};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rootcause::Report;
use rootcause::prelude::ResultExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SecretError;

/// Key under which single-value secrets keep their value.
pub const PASSWORD_KEY: &str = "password";

/// Reads base64 encoded values out of secrets, with a bounded wait.
#[derive(Clone)]
pub struct SecretResolver {
    store: Arc<dyn ResourceStore>,
    timeout: Duration,
}

impl SecretResolver {
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Returns the decoded value of `key` in the named secret.
    pub async fn value(&self, name: &str, key: &str) -> Result<Vec<u8>, Report<SecretError>> {
        let lookup = self.store.get(ResourceKind::Secret, name);
        let secret = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(result) => result.context(SecretError::Unavailable {
                name: name.to_string(),
                reason: "store lookup failed".to_string(),
            })?,
            Err(_) => {
                return Err(SecretError::Timeout {
                    name: name.to_string(),
                }
                .into());
            }
        };

        // A secret without a data section simply has no keys.
        let data: BTreeMap<String, String> = match secret.body().get("data") {
            None => BTreeMap::new(),
            Some(_) => secret.data().context(SecretError::Unavailable {
                name: name.to_string(),
                reason: "malformed secret".to_string(),
            })?,
        };

        let encoded = data.get(key).ok_or_else(|| SecretError::MissingKey {
            name: name.to_string(),
            key: key.to_string(),
        })?;

        Ok(STANDARD.decode(encoded.trim()).map_err(|_| SecretError::Decode {
            name: name.to_string(),
            key: key.to_string(),
        })?)
    }

    /// Returns the decoded `password` value of a single-value secret.
    pub async fn password(&self, name: &str) -> Result<Vec<u8>, Report<SecretError>> {
        self.value(name, PASSWORD_KEY).await
    }

    /// Returns a value that must be UTF-8 text, such as a PEM key.
    pub async fn text(&self, name: &str, key: &str) -> Result<String, Report<SecretError>> {
        let bytes = self.value(name, key).await?;
        Ok(String::from_utf8(bytes).map_err(|_| SecretError::Decode {
            name: name.to_string(),
            key: key.to_string(),
        })?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use backbone_store::{MemoryStore, Resource};
    use serde_json::json;

    /// Builds a secret resource the way the cluster stores it.
    pub(crate) fn secret(name: &str, entries: &[(&str, &str)]) -> Resource {
        let data: serde_json::Map<String, serde_json::Value> = entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), json!(STANDARD.encode(value.as_bytes()))))
            .collect();
        Resource::new(ResourceKind::Secret, name, json!({ "data": data }))
    }

    fn resolver(store: Arc<MemoryStore>) -> SecretResolver {
        SecretResolver::new(store, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn decodes_password() {
        let store = Arc::new(MemoryStore::new());
        store.apply(secret("alice-pw", &[("password", "hunter2")]));

        let value = resolver(store).password("alice-pw").await.expect("resolve");
        assert_eq!(value, b"hunter2");
    }

    #[tokio::test]
    async fn missing_secret_is_unavailable() {
        let store = Arc::new(MemoryStore::new());

        let err = resolver(store).password("nope").await.expect_err("missing");
        assert!(matches!(
            err.current_context(),
            SecretError::Unavailable { name, .. } if name == "nope"
        ));
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let store = Arc::new(MemoryStore::new());
        store.apply(secret("keys", &[("public.key", "pem")]));

        let err = resolver(store)
            .text("keys", "private.key")
            .await
            .expect_err("missing key");
        assert_eq!(
            err.current_context(),
            &SecretError::MissingKey {
                name: "keys".to_string(),
                key: "private.key".to_string()
            }
        );
    }

    #[tokio::test]
    async fn secret_without_data_has_no_keys() {
        let store = Arc::new(MemoryStore::new());
        store.apply(Resource::new(ResourceKind::Secret, "empty", json!({"type": "Opaque"})));

        let err = resolver(store).password("empty").await.expect_err("no keys");
        assert!(matches!(err.current_context(), SecretError::MissingKey { .. }));
    }

    #[tokio::test]
    async fn invalid_base64_is_decode_error() {
        let store = Arc::new(MemoryStore::new());
        store.apply(Resource::new(
            ResourceKind::Secret,
            "broken",
            json!({"data": {"password": "%%%"}}),
        ));

        let err = resolver(store).password("broken").await.expect_err("bad base64");
        assert!(matches!(err.current_context(), SecretError::Decode { .. }));
    }
}
