//! Broker configuration and its resolution from the store.
//!
//! A [`ConfigSpec`] only names secrets. Resolution turns it into a
//! [`BrokerConfig`] holding the actual key material; an update is only ever
//! applied in resolved form, so handlers never see a half-resolved config.

use backbone_access::{ProviderConfig, SigningKeys, state::STATE_KEY_LEN};
use rootcause::Report;
use rootcause::prelude::ResultExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;
use crate::resources::{ConfigSpec, OidcSpec};
use crate::secret::SecretResolver;

/// Secret keys of the signing key pair.
pub const PRIVATE_KEY: &str = "private.key";
pub const PUBLIC_KEY: &str = "public.key";

/// Shortest sync interval honoured.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Which authentication front-end the broker serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Sessions,
    OidcBroker,
    OidcServer,
}

impl Mode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sessions => "SESSIONS",
            Self::OidcBroker => "OIDC_BROKER",
            Self::OidcServer => "OIDC_SERVER",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SESSIONS" => Ok(Self::Sessions),
            "OIDC_BROKER" => Ok(Self::OidcBroker),
            "OIDC_SERVER" => Ok(Self::OidcServer),
            other => Err(ConfigError::UnknownMode {
                mode: other.to_string(),
            }),
        }
    }
}

/// Resolved OIDC broker settings.
#[derive(Clone)]
pub struct OidcSettings {
    encryption_key: Vec<u8>,
    signing_keys: Arc<SigningKeys>,
    providers: Vec<ProviderConfig>,
}

impl OidcSettings {
    #[must_use]
    pub fn new(
        encryption_key: Vec<u8>,
        signing_keys: Arc<SigningKeys>,
        providers: Vec<ProviderConfig>,
    ) -> Self {
        Self {
            encryption_key,
            signing_keys,
            providers,
        }
    }

    /// Returns the 32-byte state encryption key.
    #[must_use]
    pub fn encryption_key(&self) -> &[u8] {
        &self.encryption_key
    }

    #[must_use]
    pub fn signing_keys(&self) -> &Arc<SigningKeys> {
        &self.signing_keys
    }

    #[must_use]
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }
}

impl fmt::Debug for OidcSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcSettings")
            .field("signing_keys", &self.signing_keys)
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

/// A fully resolved configuration generation.
#[derive(Clone)]
pub struct BrokerConfig {
    mode: Mode,
    sync_interval: Option<Duration>,
    cookie_key: Option<Vec<u8>>,
    oidc: Option<OidcSettings>,
}

impl BrokerConfig {
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            sync_interval: None,
            cookie_key: None,
            oidc: None,
        }
    }

    /// Sets the sync interval, clamped to [`MIN_SYNC_INTERVAL`].
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval.max(MIN_SYNC_INTERVAL));
        self
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Vec<u8>) -> Self {
        self.cookie_key = Some(key);
        self
    }

    #[must_use]
    pub fn with_oidc(mut self, oidc: OidcSettings) -> Self {
        self.oidc = Some(oidc);
        self
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns the configured sync interval, if the resource set one.
    #[must_use]
    pub fn sync_interval(&self) -> Option<Duration> {
        self.sync_interval
    }

    /// Returns the session cookie key. Present in `SESSIONS` mode.
    #[must_use]
    pub fn cookie_key(&self) -> Option<&[u8]> {
        self.cookie_key.as_deref()
    }

    /// Returns the broker settings. Present in `OIDC_BROKER` mode.
    #[must_use]
    pub fn oidc(&self) -> Option<&OidcSettings> {
        self.oidc.as_ref()
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("mode", &self.mode)
            .field("sync_interval", &self.sync_interval)
            .field("cookie_key", &self.cookie_key.as_ref().map(|_| "<redacted>"))
            .field("oidc", &self.oidc)
            .finish()
    }
}

/// Resolves every secret the spec's mode needs.
///
/// `process_mode` is the mode the process was started in; a spec that names
/// a different mode is rejected, one that names none inherits it.
pub async fn resolve(
    spec: ConfigSpec,
    secrets: &SecretResolver,
    process_mode: Mode,
) -> Result<BrokerConfig, Report<ConfigError>> {
    let mode = match spec.mode.as_deref() {
        None => process_mode,
        Some(name) => name.parse::<Mode>()?,
    };
    if mode != process_mode {
        return Err(ConfigError::ModeMismatch {
            expected: process_mode.to_string(),
            found: mode.to_string(),
        }
        .into());
    }

    let mut config = BrokerConfig::new(mode);
    if let Some(seconds) = spec.sync_interval_seconds {
        config = config.with_sync_interval(Duration::from_secs(seconds));
    }

    match mode {
        Mode::Sessions => {
            let key_ref = spec
                .cookie_store_key_ref
                .as_deref()
                .ok_or(ConfigError::MissingField {
                    field: "cookieStoreKeyRef",
                })?;
            let key = secrets.password(key_ref).await.context(ConfigError::Secret {
                field: "cookieStoreKeyRef",
            })?;
            if key.is_empty() {
                return Err(ConfigError::Secret {
                    field: "cookieStoreKeyRef",
                }
                .into());
            }
            config = config.with_cookie_key(key);
        }
        Mode::OidcBroker => {
            let oidc = spec.oidc.ok_or(ConfigError::MissingField { field: "oidc" })?;
            config = config.with_oidc(resolve_oidc(oidc, secrets).await?);
        }
        Mode::OidcServer => {}
    }

    debug!(?config, "resolved configuration");
    Ok(config)
}

async fn resolve_oidc(
    spec: OidcSpec,
    secrets: &SecretResolver,
) -> Result<OidcSettings, Report<ConfigError>> {
    let encryption_ref = spec
        .encryption_key_ref
        .as_deref()
        .ok_or(ConfigError::MissingField {
            field: "oidc.encryptionKeyRef",
        })?;
    let encryption_key = secrets
        .password(encryption_ref)
        .await
        .context(ConfigError::Secret {
            field: "oidc.encryptionKeyRef",
        })?;
    if encryption_key.len() != STATE_KEY_LEN {
        return Err(ConfigError::EncryptionKeyLength {
            len: encryption_key.len(),
        }
        .into());
    }

    let keys_ref = spec
        .jwt_signing_keys_ref
        .as_deref()
        .ok_or(ConfigError::MissingField {
            field: "oidc.jwtSigningKeysRef",
        })?;
    let private_pem = secrets
        .text(keys_ref, PRIVATE_KEY)
        .await
        .context(ConfigError::Secret {
            field: "oidc.jwtSigningKeysRef",
        })?;
    let public_pem = secrets
        .text(keys_ref, PUBLIC_KEY)
        .await
        .context(ConfigError::Secret {
            field: "oidc.jwtSigningKeysRef",
        })?;
    let signing_keys =
        SigningKeys::from_pem(&private_pem, &public_pem).context(ConfigError::SigningKeys)?;

    let mut providers = Vec::with_capacity(spec.providers.len());
    for provider in spec.providers {
        let client_secret = secrets
            .password(&provider.client_secret_ref)
            .await
            .context(ConfigError::Secret {
                field: "oidc.providers.clientSecretRef",
            })?;
        let client_secret = String::from_utf8(client_secret).map_err(|_| ConfigError::Secret {
            field: "oidc.providers.clientSecretRef",
        })?;

        providers.push(ProviderConfig::new(
            provider.provider_name,
            provider.provider_type,
            provider.provider_url,
            provider.client_id,
            client_secret,
        ));
    }

    Ok(OidcSettings::new(
        encryption_key,
        Arc::new(signing_keys),
        providers,
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::secret::tests::secret;
    use backbone_store::MemoryStore;
    use serde_json::json;

    pub(crate) const PRIVATE_PEM: &str = include_str!("../../platform-access/testdata/signing.key");
    pub(crate) const PUBLIC_PEM: &str = include_str!("../../platform-access/testdata/signing.pub");
    pub(crate) const ENCRYPTION_KEY: &str = "0123456789abcdef0123456789abcdef";

    /// Seeds every secret a broker configuration refers to.
    pub(crate) fn seed_broker_secrets(store: &MemoryStore) {
        store.apply(secret("enc", &[("password", ENCRYPTION_KEY)]));
        store.apply(secret(
            "keys",
            &[(PRIVATE_KEY, PRIVATE_PEM), (PUBLIC_KEY, PUBLIC_PEM)],
        ));
        store.apply(secret("google-secret", &[("password", "shh")]));
        store.apply(secret("cookie", &[("password", "cookie-key")]));
    }

    pub(crate) fn broker_spec() -> serde_json::Value {
        json!({
            "mode": "OIDC_BROKER",
            "syncIntervalSeconds": 5,
            "oidc": {
                "encryptionKeyRef": "enc",
                "jwtSigningKeysRef": "keys",
                "providers": [{
                    "providerName": "google",
                    "providerType": "google",
                    "providerUrl": "https://accounts.google.com",
                    "clientId": "id",
                    "clientSecretRef": "google-secret"
                }]
            }
        })
    }

    fn spec(value: serde_json::Value) -> ConfigSpec {
        serde_json::from_value(value).expect("spec")
    }

    fn resolver() -> SecretResolver {
        let store = Arc::new(MemoryStore::new());
        seed_broker_secrets(&store);
        SecretResolver::new(store, Duration::from_secs(1))
    }

    #[test]
    fn mode_parses_known_names() {
        assert_eq!("SESSIONS".parse::<Mode>(), Ok(Mode::Sessions));
        assert_eq!("OIDC_BROKER".parse::<Mode>(), Ok(Mode::OidcBroker));
        assert_eq!("OIDC_SERVER".parse::<Mode>(), Ok(Mode::OidcServer));
        assert!("sessions".parse::<Mode>().is_err());
    }

    #[tokio::test]
    async fn resolves_broker_config() {
        let config = resolve(spec(broker_spec()), &resolver(), Mode::OidcBroker)
            .await
            .expect("resolve");

        assert_eq!(config.mode(), Mode::OidcBroker);
        assert_eq!(config.sync_interval(), Some(Duration::from_secs(5)));
        let oidc = config.oidc().expect("oidc");
        assert_eq!(oidc.encryption_key(), ENCRYPTION_KEY.as_bytes());
        assert_eq!(oidc.providers()[0].client_secret(), "shh");
        assert!(config.cookie_key().is_none());
    }

    #[tokio::test]
    async fn resolves_sessions_config() {
        let value = json!({"mode": "SESSIONS", "cookieStoreKeyRef": "cookie"});
        let config = resolve(spec(value), &resolver(), Mode::Sessions)
            .await
            .expect("resolve");

        assert_eq!(config.cookie_key(), Some(&b"cookie-key"[..]));
        assert!(config.oidc().is_none());
    }

    #[tokio::test]
    async fn missing_mode_inherits_process_mode() {
        let config = resolve(spec(json!({})), &resolver(), Mode::OidcServer)
            .await
            .expect("resolve");
        assert_eq!(config.mode(), Mode::OidcServer);
    }

    #[tokio::test]
    async fn interval_is_clamped() {
        let value = json!({"mode": "OIDC_SERVER", "syncIntervalSeconds": 0});
        let config = resolve(spec(value), &resolver(), Mode::OidcServer)
            .await
            .expect("resolve");
        assert_eq!(config.sync_interval(), Some(MIN_SYNC_INTERVAL));
    }

    #[tokio::test]
    async fn unknown_mode_is_rejected() {
        let err = resolve(spec(json!({"mode": "LDAP"})), &resolver(), Mode::Sessions)
            .await
            .expect_err("reject");
        assert!(matches!(err.current_context(), ConfigError::UnknownMode { .. }));
    }

    #[tokio::test]
    async fn mode_mismatch_is_rejected() {
        let err = resolve(spec(broker_spec()), &resolver(), Mode::Sessions)
            .await
            .expect_err("reject");
        assert!(matches!(err.current_context(), ConfigError::ModeMismatch { .. }));
    }

    #[tokio::test]
    async fn one_unresolvable_provider_rejects_everything() {
        let mut value = broker_spec();
        value["oidc"]["providers"][0]["clientSecretRef"] = json!("missing");

        let err = resolve(spec(value), &resolver(), Mode::OidcBroker)
            .await
            .expect_err("reject");
        assert_eq!(
            err.current_context(),
            &ConfigError::Secret {
                field: "oidc.providers.clientSecretRef"
            }
        );
    }

    #[tokio::test]
    async fn short_encryption_key_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        seed_broker_secrets(&store);
        store.apply(secret("enc", &[("password", "too-short")]));
        let secrets = SecretResolver::new(store, Duration::from_secs(1));

        let err = resolve(spec(broker_spec()), &secrets, Mode::OidcBroker)
            .await
            .expect_err("reject");
        assert_eq!(
            err.current_context(),
            &ConfigError::EncryptionKeyLength { len: 9 }
        );
    }

    #[tokio::test]
    async fn sessions_without_cookie_ref_is_rejected() {
        let err = resolve(spec(json!({"mode": "SESSIONS"})), &resolver(), Mode::Sessions)
            .await
            .expect_err("reject");
        assert_eq!(
            err.current_context(),
            &ConfigError::MissingField {
                field: "cookieStoreKeyRef"
            }
        );
    }

    #[test]
    fn debug_redacts_cookie_key() {
        let config = BrokerConfig::new(Mode::Sessions).with_cookie_key(b"secret-cookie".to_vec());
        let debug = format!("{config:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("115"));
    }
}
