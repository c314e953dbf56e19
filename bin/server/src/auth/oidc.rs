//! OIDC identity provider backed by the openidconnect crate.

use async_trait::async_trait;
use backbone_access::{
    AuthorizationRequest, IdentityProvider, ProviderConfig, ProviderError, VerifiedIdentity,
};
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
};
use rootcause::Report;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Default bound on each request to a provider.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// An upstream provider located through OIDC discovery.
///
/// Discovery runs on first use and its result is kept for the lifetime of
/// the provider, which is one configuration generation. Every request to
/// the provider, discovery and token exchange alike, is bounded by the
/// provider timeout.
pub struct OpenIdProvider {
    config: ProviderConfig,
    redirect_url: String,
    timeout: Duration,
    discovered: OnceCell<Discovered>,
}

struct Discovered {
    http_client: reqwest::Client,
    metadata: CoreProviderMetadata,
}

impl OpenIdProvider {
    pub fn new(config: ProviderConfig, redirect_url: String) -> Self {
        Self {
            config,
            redirect_url,
            timeout: PROVIDER_TIMEOUT,
            discovered: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn discovered(&self) -> Result<&Discovered, Report<ProviderError>> {
        self.discovered.get_or_try_init(|| self.discover()).await
    }

    async fn discover(&self) -> Result<Discovered, Report<ProviderError>> {
        let issuer_url = IssuerUrl::new(self.config.provider_url().to_string())
            .map_err(|e| self.discovery_error(format!("invalid provider URL: {e}")))?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .build()
            .map_err(|e| self.discovery_error(format!("failed to create HTTP client: {e}")))?;

        let metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| self.discovery_error(e.to_string()))?;

        tracing::info!(provider = %self.config.name(), "Discovered OIDC provider");
        Ok(Discovered {
            http_client,
            metadata,
        })
    }

    fn redirect_url(&self) -> Result<RedirectUrl, ProviderError> {
        RedirectUrl::new(self.redirect_url.clone())
            .map_err(|e| self.discovery_error(format!("invalid redirect URI: {e}")))
    }

    fn discovery_error(&self, reason: String) -> ProviderError {
        ProviderError::Discovery {
            provider: self.config.name().to_string(),
            reason,
        }
    }
}

#[async_trait]
impl IdentityProvider for OpenIdProvider {
    fn name(&self) -> &str {
        self.config.name()
    }

    async fn authorization_url(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<String, Report<ProviderError>> {
        let discovered = self.discovered().await?;
        let client = CoreClient::from_provider_metadata(
            discovered.metadata.clone(),
            ClientId::new(self.config.client_id().to_string()),
            Some(ClientSecret::new(self.config.client_secret().to_string())),
        )
        .set_redirect_uri(self.redirect_url()?);

        let pkce_challenge = PkceCodeChallenge::from_code_verifier_sha256(&PkceCodeVerifier::new(
            request.pkce_verifier.clone(),
        ));
        let state = request.state.clone();
        let nonce = request.nonce.clone();

        let mut auth_request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                move || CsrfToken::new(state),
                move || Nonce::new(nonce),
            )
            .set_pkce_challenge(pkce_challenge);
        for scope in self.config.scopes() {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, _, _) = auth_request.url();
        Ok(auth_url.to_string())
    }

    async fn exchange(
        &self,
        code: &str,
        pkce_verifier: &str,
        nonce: &str,
    ) -> Result<VerifiedIdentity, Report<ProviderError>> {
        let provider = self.config.name().to_string();
        let discovered = self.discovered().await?;
        let client = CoreClient::from_provider_metadata(
            discovered.metadata.clone(),
            ClientId::new(self.config.client_id().to_string()),
            Some(ClientSecret::new(self.config.client_secret().to_string())),
        )
        .set_redirect_uri(self.redirect_url()?);

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| ProviderError::TokenExchange {
                provider: provider.clone(),
                reason: format!("token endpoint error: {e}"),
            })?
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&discovered.http_client)
            .await
            .map_err(|e| ProviderError::TokenExchange {
                provider: provider.clone(),
                reason: e.to_string(),
            })?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| ProviderError::IdTokenMissing {
                provider: provider.clone(),
            })?;

        let claims = id_token
            .claims(&client.id_token_verifier(), &Nonce::new(nonce.to_string()))
            .map_err(|e| ProviderError::VerifyToken {
                provider: provider.clone(),
                reason: e.to_string(),
            })?;

        let email = claims
            .email()
            .map(|email| email.as_str().to_string())
            .ok_or_else(|| ProviderError::ExtractClaims {
                provider: provider.clone(),
                claim: "email".to_string(),
            })?;

        Ok(VerifiedIdentity {
            subject: claims.subject().to_string(),
            email,
        })
    }
}
