//! Process configuration.
//!
//! Loaded via the `config` crate from environment variables. Everything
//! that can change at runtime lives in the `BackboneConfig` resource
//! instead; this only covers what the process needs to start.

use backbone_sync::Mode;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Which front-end to serve. Required; an unknown value is fatal.
    pub mode: Mode,

    /// Path to a kubeconfig. Unset means in-cluster configuration.
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace holding every backbone resource.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Name of the `BackboneConfig` resource to follow.
    #[serde(default = "default_config_name")]
    pub config_name: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Externally visible base URL, used as token issuer and to build
    /// provider callback URLs.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Sync interval used until the configuration resource sets one.
    #[serde(default = "default_sync_interval_seconds")]
    pub sync_interval_seconds: u64,

    /// Upper bound on any single store call.
    #[serde(default = "default_store_timeout_seconds")]
    pub store_timeout_seconds: u64,

    /// Upper bound on each request to an identity provider.
    #[serde(default = "default_provider_timeout_seconds")]
    pub provider_timeout_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_config_name() -> String {
    "backbone-config".to_string()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_sync_interval_seconds() -> u64 {
    30
}

fn default_store_timeout_seconds() -> u64 {
    10
}

fn default_provider_timeout_seconds() -> u64 {
    10
}

fn default_secure_cookies() -> bool {
    true
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `MODE` is missing or unknown, or a value does not
    /// parse.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(config::Environment::default())
    }

    fn load(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds.max(1))
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_seconds)
    }

    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_seconds.max(1))
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn public_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }
}
