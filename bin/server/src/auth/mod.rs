//! HTTP authentication front-ends.
//!
//! - `sessions`: password login with an encrypted session cookie
//! - `broker`: OIDC login against upstream providers, issuing local tokens
//! - `middleware`: session validation and the [`Authenticated`] extractor
//!
//! Which of them is mounted depends on the process [`Mode`]. Both read key
//! material from the live configuration on every request, so a hot-swapped
//! configuration takes effect without a restart.

pub mod broker;
pub mod middleware;
pub mod oidc;
pub mod sessions;

pub use middleware::{Authenticated, require_session};
pub use oidc::OpenIdProvider;

use axum_extra::extract::cookie::Key;
use backbone_access::{IdentityProvider, OidcBroker, ProviderConfig, RoleDirectory};
use backbone_sync::{BrokerConfig, LiveConfig, Mode, ResourceSyncEngine};
use sha2::{Digest, Sha512};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Builds the provider client for one configured provider and its callback
/// URL.
pub type ProviderFactory =
    Arc<dyn Fn(&ProviderConfig, String) -> Arc<dyn IdentityProvider> + Send + Sync>;

/// Shared application state.
pub struct AppState {
    mode: Mode,
    engine: Arc<ResourceSyncEngine>,
    live: Arc<LiveConfig>,
    public_url: String,
    secure_cookies: bool,
    provider_factory: ProviderFactory,
    broker: Mutex<Option<CachedBroker>>,
}

/// A broker built from one configuration generation.
struct CachedBroker {
    config: Arc<BrokerConfig>,
    broker: Arc<OidcBroker>,
}

impl AppState {
    /// Creates the state with OIDC discovery-backed providers.
    pub fn new(
        mode: Mode,
        engine: Arc<ResourceSyncEngine>,
        live: Arc<LiveConfig>,
        public_url: impl Into<String>,
        secure_cookies: bool,
    ) -> Self {
        Self {
            mode,
            engine,
            live,
            public_url: public_url.into(),
            secure_cookies,
            provider_factory: Arc::new(discovery_provider),
            broker: Mutex::new(None),
        }
    }

    /// Replaces how provider clients are built.
    #[must_use]
    pub fn with_provider_factory(mut self, factory: ProviderFactory) -> Self {
        self.provider_factory = factory;
        self
    }

    /// Uses discovery-backed providers whose requests are bounded by
    /// `timeout`.
    #[must_use]
    pub fn with_provider_timeout(self, timeout: Duration) -> Self {
        self.with_provider_factory(Arc::new(
            move |config: &ProviderConfig, redirect_url: String| {
                let provider: Arc<dyn IdentityProvider> = Arc::new(
                    OpenIdProvider::new(config.clone(), redirect_url).with_timeout(timeout),
                );
                provider
            },
        ))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn engine(&self) -> &Arc<ResourceSyncEngine> {
        &self.engine
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    /// Returns the session cookie key derived from the live configuration.
    ///
    /// `None` until a configuration with a cookie key has been applied.
    pub fn session_key(&self) -> Option<Key> {
        let config = self.live.load()?;
        let secret = config.cookie_key()?;
        Some(Key::from(Sha512::digest(secret).as_slice()))
    }

    /// Returns the broker for the live configuration.
    ///
    /// The broker is rebuilt whenever the configuration generation changes.
    /// `None` until an OIDC broker configuration has been applied.
    pub fn broker(&self) -> Option<Arc<OidcBroker>> {
        let config = self.live.load()?;
        let settings = config.oidc()?;

        let mut cached = self
            .broker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(entry) = cached.as_ref() {
            if Arc::ptr_eq(&entry.config, &config) {
                return Some(Arc::clone(&entry.broker));
            }
        }

        let roles: Arc<dyn RoleDirectory> = self.engine.clone();
        let mut broker = OidcBroker::new(
            settings.encryption_key().to_vec(),
            Arc::clone(settings.signing_keys()),
            roles,
            self.public_url.clone(),
        );
        for provider in settings.providers() {
            let redirect_url = format!(
                "{}/auth/oidc/{}/callback",
                self.public_url,
                provider.name()
            );
            broker = broker.with_provider((self.provider_factory)(provider, redirect_url));
        }
        tracing::info!(
            providers = settings.providers().len(),
            "Built OIDC broker for configuration"
        );

        let broker = Arc::new(broker);
        *cached = Some(CachedBroker {
            config,
            broker: Arc::clone(&broker),
        });
        Some(broker)
    }
}

fn discovery_provider(config: &ProviderConfig, redirect_url: String) -> Arc<dyn IdentityProvider> {
    Arc::new(OpenIdProvider::new(config.clone(), redirect_url))
}
