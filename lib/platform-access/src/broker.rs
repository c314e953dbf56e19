//! OIDC authorization broker.
//!
//! The broker sits between a client and an upstream identity provider:
//!
//! 1. [`OidcBroker::begin_login`] seals a CSRF value, nonce and PKCE verifier
//!    into encrypted state and returns the provider's authorization URL. The
//!    raw CSRF value goes back to the caller to be pinned in a cookie.
//! 2. [`OidcBroker::complete_login`] opens the returned state, checks it
//!    against the cookie, lets the provider exchange and verify the code,
//!    maps the identity to local roles and signs a local token.
//!
//! Every failure is reported as exactly one [`BrokerError`] variant.

use chrono::{Duration, Utc};
use rootcause::Report;
use rootcause::prelude::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

use crate::error::BrokerError;
use crate::jwks::Jwks;
use crate::keys::SigningKeys;
use crate::provider::{AuthorizationRequest, IdentityProvider};
use crate::role::RoleDirectory;
use crate::session::random_token;
use crate::state::{decrypt_state, encrypt_state};
use crate::token::{IssuedToken, LocalClaims, TOKEN_TTL_HOURS};

/// Audience of locally issued tokens.
pub const TOKEN_AUDIENCE: &str = "backbone";

/// The values sealed into the `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginState {
    csrf: String,
    nonce: String,
    pkce_verifier: String,
    provider: String,
}

/// Where to send the user agent, and the CSRF value to pin in a cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub authorization_url: String,
    pub csrf: String,
}

/// Drives the login protocol for a set of registered providers.
pub struct OidcBroker {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
    encryption_key: Vec<u8>,
    keys: Arc<SigningKeys>,
    roles: Arc<dyn RoleDirectory>,
    issuer: String,
}

impl OidcBroker {
    #[must_use]
    pub fn new(
        encryption_key: Vec<u8>,
        keys: Arc<SigningKeys>,
        roles: Arc<dyn RoleDirectory>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            providers: HashMap::new(),
            encryption_key,
            keys,
            roles,
            issuer: issuer.into(),
        }
    }

    /// Registers a provider under its own name, replacing any previous one.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    /// Looks up a registered provider.
    pub fn provider(&self, name: &str) -> Result<&Arc<dyn IdentityProvider>, Report<BrokerError>> {
        Ok(self
            .providers
            .get(name)
            .ok_or_else(|| BrokerError::ProviderNotFound {
                provider: name.to_string(),
            })?)
    }

    /// Returns the key set verifiers use for issued tokens.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        self.keys.jwks()
    }

    /// Starts a login against the named provider.
    #[instrument(skip(self))]
    pub async fn begin_login(&self, provider_name: &str) -> Result<LoginRedirect, Report<BrokerError>> {
        let provider = self.provider(provider_name)?;

        let login = LoginState {
            csrf: random_token(),
            nonce: random_token(),
            pkce_verifier: random_token(),
            provider: provider_name.to_string(),
        };

        let plaintext = serde_json::to_string(&login).map_err(|_| BrokerError::EncryptState)?;
        let state = encrypt_state(&plaintext, &self.encryption_key)
            .context(BrokerError::EncryptState)?;

        let request = AuthorizationRequest {
            state,
            nonce: login.nonce,
            pkce_verifier: login.pkce_verifier,
        };

        let authorization_url = match provider.authorization_url(&request).await {
            Ok(url) => url,
            Err(report) => {
                let outcome = BrokerError::from(report.current_context());
                warn!(error = %report, "failed to build authorization url");
                return Err(report).context(outcome);
            }
        };

        Ok(LoginRedirect {
            authorization_url,
            csrf: login.csrf,
        })
    }

    /// Completes a login from the provider callback.
    ///
    /// `csrf_cookie` is the value pinned by [`OidcBroker::begin_login`], if
    /// the client sent it back.
    #[instrument(skip(self, code, state, csrf_cookie))]
    pub async fn complete_login(
        &self,
        provider_name: &str,
        code: &str,
        state: &str,
        csrf_cookie: Option<&str>,
    ) -> Result<IssuedToken, Report<BrokerError>> {
        let provider = self.provider(provider_name)?;

        let csrf_cookie = csrf_cookie.ok_or(BrokerError::ExtractStateFromCookie)?;

        let plaintext = decrypt_state(state, &self.encryption_key).context(BrokerError::DecryptState)?;
        let login: LoginState =
            serde_json::from_str(&plaintext).map_err(|_| BrokerError::DecryptState)?;

        let csrf_matches: bool = login.csrf.as_bytes().ct_eq(csrf_cookie.as_bytes()).into();
        if !csrf_matches || login.provider != provider_name {
            warn!("state from cookie does not match returned state");
            return Err(BrokerError::StateMismatch.into());
        }

        let identity = match provider
            .exchange(code, &login.pkce_verifier, &login.nonce)
            .await
        {
            Ok(identity) => identity,
            Err(report) => {
                let outcome = BrokerError::from(report.current_context());
                warn!(error = %report, "provider exchange failed");
                return Err(report).context(outcome);
            }
        };

        let roles = self
            .roles
            .user_roles(&identity.email)
            .context(BrokerError::UserRoles {
                email: identity.email.clone(),
            })?;

        let ttl = Duration::hours(TOKEN_TTL_HOURS);
        let claims = LocalClaims::new(
            self.issuer.clone(),
            identity.email.clone(),
            TOKEN_AUDIENCE,
            roles,
            Utc::now(),
            ttl,
        );
        let token = self.keys.sign(&claims).context(BrokerError::TokenSign)?;

        info!(email = %identity.email, "issued local token");
        Ok(IssuedToken::bearer(token, ttl.num_seconds()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LookupError, ProviderError};
    use crate::provider::VerifiedIdentity;
    use crate::role::RoleRecord;
    use async_trait::async_trait;
    use jsonwebtoken::{Algorithm, DecodingKey, Validation};
    use std::sync::Mutex;

    const PRIVATE_PEM: &str = include_str!("../testdata/signing.key");
    const PUBLIC_PEM: &str = include_str!("../testdata/signing.pub");
    const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    struct FakeProvider {
        name: String,
        outcome: Result<VerifiedIdentity, ProviderError>,
        requests: Mutex<Vec<AuthorizationRequest>>,
        exchanges: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeProvider {
        fn returning(email: &str) -> Self {
            Self::with_outcome(Ok(VerifiedIdentity {
                subject: "sub-1".to_string(),
                email: email.to_string(),
            }))
        }

        fn with_outcome(outcome: Result<VerifiedIdentity, ProviderError>) -> Self {
            Self {
                name: "fake".to_string(),
                outcome,
                requests: Mutex::new(Vec::new()),
                exchanges: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn authorization_url(
            &self,
            request: &AuthorizationRequest,
        ) -> Result<String, Report<ProviderError>> {
            self.requests.lock().expect("lock").push(request.clone());
            Ok(format!("https://idp.example.com/auth?state={}", request.state))
        }

        async fn exchange(
            &self,
            code: &str,
            pkce_verifier: &str,
            nonce: &str,
        ) -> Result<VerifiedIdentity, Report<ProviderError>> {
            self.exchanges.lock().expect("lock").push((
                code.to_string(),
                pkce_verifier.to_string(),
                nonce.to_string(),
            ));
            self.outcome.clone().map_err(Report::from)
        }
    }

    struct FakeDirectory(HashMap<String, Vec<RoleRecord>>);

    impl RoleDirectory for FakeDirectory {
        fn user_roles(&self, email: &str) -> Result<Vec<RoleRecord>, Report<LookupError>> {
            Ok(self.0.get(email).cloned().ok_or_else(|| LookupError::NotFound {
                email: email.to_string(),
            })?)
        }
    }

    fn directory() -> Arc<dyn RoleDirectory> {
        Arc::new(FakeDirectory(HashMap::from([(
            "a@x.com".to_string(),
            vec![RoleRecord::new(
                "admin",
                vec!["read".to_string(), "write".to_string()],
            )],
        )])))
    }

    fn broker(provider: Arc<FakeProvider>) -> OidcBroker {
        let keys = SigningKeys::from_pem(PRIVATE_PEM, PUBLIC_PEM).expect("keys");
        OidcBroker::new(KEY.to_vec(), Arc::new(keys), directory(), "https://backbone.test")
            .with_provider(provider)
    }

    fn state_of(provider: &FakeProvider) -> String {
        provider.requests.lock().expect("lock")[0].state.clone()
    }

    #[tokio::test]
    async fn full_login_issues_verifiable_token() {
        let provider = Arc::new(FakeProvider::returning("a@x.com"));
        let broker = broker(Arc::clone(&provider));

        let redirect = broker.begin_login("fake").await.expect("begin");
        let state = state_of(&provider);
        assert!(redirect.authorization_url.contains(&state));

        let issued = broker
            .complete_login("fake", "the-code", &state, Some(&redirect.csrf))
            .await
            .expect("complete");
        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 12 * 3600);

        let request = provider.requests.lock().expect("lock")[0].clone();
        let exchange = provider.exchanges.lock().expect("lock")[0].clone();
        assert_eq!(
            exchange,
            ("the-code".to_string(), request.pkce_verifier, request.nonce)
        );

        let jwk = &broker.jwks().keys[0];
        let decoding = DecodingKey::from_rsa_components(&jwk.n, &jwk.e).expect("key");
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.set_issuer(&["https://backbone.test"]);
        let decoded =
            jsonwebtoken::decode::<LocalClaims>(&issued.token, &decoding, &validation).expect("verify");
        assert_eq!(decoded.claims.sub, "a@x.com");
        assert_eq!(decoded.claims.roles["admin"], vec!["read", "write"]);
        assert_eq!(decoded.header.kid.as_deref(), Some(jwk.kid.as_str()));
    }

    #[tokio::test]
    async fn state_is_opaque_to_provider() {
        let provider = Arc::new(FakeProvider::returning("a@x.com"));
        let broker = broker(Arc::clone(&provider));

        let redirect = broker.begin_login("fake").await.expect("begin");
        let state = state_of(&provider);
        assert!(!state.contains(&redirect.csrf));
        assert!(decrypt_state(&state, KEY).expect("decrypt").contains(&redirect.csrf));
    }

    #[tokio::test]
    async fn unknown_provider_is_not_found() {
        let broker = broker(Arc::new(FakeProvider::returning("a@x.com")));

        let err = broker.begin_login("nope").await.expect_err("should fail");
        assert!(matches!(
            err.current_context(),
            BrokerError::ProviderNotFound { provider } if provider == "nope"
        ));

        let err = broker
            .complete_login("nope", "code", "state", Some("csrf"))
            .await
            .expect_err("should fail");
        assert!(matches!(
            err.current_context(),
            BrokerError::ProviderNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn missing_cookie_is_reported() {
        let provider = Arc::new(FakeProvider::returning("a@x.com"));
        let broker = broker(Arc::clone(&provider));
        broker.begin_login("fake").await.expect("begin");

        let err = broker
            .complete_login("fake", "code", &state_of(&provider), None)
            .await
            .expect_err("should fail");
        assert_eq!(err.current_context(), &BrokerError::ExtractStateFromCookie);
    }

    #[tokio::test]
    async fn tampered_state_cannot_be_decrypted() {
        let broker = broker(Arc::new(FakeProvider::returning("a@x.com")));

        let err = broker
            .complete_login("fake", "code", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", Some("csrf"))
            .await
            .expect_err("should fail");
        assert_eq!(err.current_context(), &BrokerError::DecryptState);
    }

    #[tokio::test]
    async fn csrf_mismatch_is_rejected_before_exchange() {
        let provider = Arc::new(FakeProvider::returning("a@x.com"));
        let broker = broker(Arc::clone(&provider));
        broker.begin_login("fake").await.expect("begin");

        let err = broker
            .complete_login("fake", "code", &state_of(&provider), Some("forged"))
            .await
            .expect_err("should fail");
        assert_eq!(err.current_context(), &BrokerError::StateMismatch);
        assert!(provider.exchanges.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn state_from_another_provider_is_rejected() {
        let first = Arc::new(FakeProvider::returning("a@x.com"));
        let mut second = FakeProvider::returning("a@x.com");
        second.name = "other".to_string();

        let broker = broker(Arc::clone(&first)).with_provider(Arc::new(second));
        let redirect = broker.begin_login("fake").await.expect("begin");

        let err = broker
            .complete_login("other", "code", &state_of(&first), Some(&redirect.csrf))
            .await
            .expect_err("should fail");
        assert_eq!(err.current_context(), &BrokerError::StateMismatch);
    }

    #[tokio::test]
    async fn provider_failures_keep_their_outcome() {
        let provider = Arc::new(FakeProvider::with_outcome(Err(ProviderError::IdTokenMissing {
            provider: "fake".to_string(),
        })));
        let broker = broker(Arc::clone(&provider));
        let redirect = broker.begin_login("fake").await.expect("begin");

        let err = broker
            .complete_login("fake", "code", &state_of(&provider), Some(&redirect.csrf))
            .await
            .expect_err("should fail");
        assert_eq!(err.current_context(), &BrokerError::IdTokenMissing);
    }

    #[tokio::test]
    async fn unknown_local_user_fails_role_mapping() {
        let provider = Arc::new(FakeProvider::returning("stranger@x.com"));
        let broker = broker(Arc::clone(&provider));
        let redirect = broker.begin_login("fake").await.expect("begin");

        let err = broker
            .complete_login("fake", "code", &state_of(&provider), Some(&redirect.csrf))
            .await
            .expect_err("should fail");
        assert_eq!(
            err.current_context(),
            &BrokerError::UserRoles {
                email: "stranger@x.com".to_string()
            }
        );
    }
}
