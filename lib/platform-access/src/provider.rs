//! Upstream identity provider configuration and interface.
//!
//! The broker never talks OIDC directly; it drives an [`IdentityProvider`]
//! that knows how to build an authorization URL and turn an authorization
//! code into a verified identity.

use async_trait::async_trait;
use rootcause::Report;
use std::fmt;

use crate::error::ProviderError;

/// Configuration for one upstream identity provider, with its client
/// secret already resolved.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Registry key, also the `{provider}` path segment.
    name: String,
    /// Free-form provider type, for example "google" or "keycloak".
    provider_type: String,
    /// Issuer URL used for discovery.
    provider_url: String,
    client_id: String,
    client_secret: String,
    /// OAuth2 scopes to request.
    scopes: Vec<String>,
}

impl ProviderConfig {
    /// Creates a provider configuration requesting the default scopes.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        provider_type: impl Into<String>,
        provider_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider_type: provider_type.into(),
            provider_url: provider_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: default_scopes(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn provider_type(&self) -> &str {
        &self.provider_type
    }

    #[must_use]
    pub fn provider_url(&self) -> &str {
        &self.provider_url
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OAuth2 scopes to request. `openid` is always first.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ]
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("provider_type", &self.provider_type)
            .field("provider_url", &self.provider_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Parameters of one authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Opaque value the provider echoes back on the callback.
    pub state: String,
    /// Nonce the ID token must carry.
    pub nonce: String,
    /// PKCE code verifier; the provider receives its S256 challenge.
    pub pkce_verifier: String,
}

/// An identity asserted by a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: String,
}

/// An upstream OIDC provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the registry name of this provider.
    fn name(&self) -> &str;

    /// Builds the URL the user agent is redirected to.
    async fn authorization_url(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<String, Report<ProviderError>>;

    /// Exchanges an authorization code and verifies the returned ID token
    /// against the nonce.
    async fn exchange(
        &self,
        code: &str,
        pkce_verifier: &str,
        nonce: &str,
    ) -> Result<VerifiedIdentity, Report<ProviderError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig::new(
            "google",
            "google",
            "https://accounts.google.com",
            "client-id",
            "client-secret",
        )
    }

    #[test]
    fn new_config_has_default_scopes() {
        let config = config();

        assert_eq!(config.name(), "google");
        assert_eq!(config.provider_url(), "https://accounts.google.com");
        assert_eq!(config.client_id(), "client-id");
        assert_eq!(config.client_secret(), "client-secret");
        assert_eq!(config.scopes(), ["openid", "email", "profile"]);
    }

    #[test]
    fn debug_redacts_secret() {
        let debug = format!("{:?}", config());
        assert!(debug.contains("client-id"));
        assert!(!debug.contains("client-secret"));
    }
}
