//! Typed views of store resource specs.

use backbone_access::UserRecord;
use serde::Deserialize;

/// `BackboneUser.spec`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    #[serde(flatten)]
    pub user: UserRecord,
    #[serde(default)]
    pub secret_ref: Option<String>,
}

/// `BackboneConfig.spec`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSpec {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub sync_interval_seconds: Option<u64>,
    #[serde(default)]
    pub cookie_store_key_ref: Option<String>,
    #[serde(default)]
    pub oidc: Option<OidcSpec>,
}

/// `BackboneConfig.spec.oidc`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcSpec {
    #[serde(default)]
    pub encryption_key_ref: Option<String>,
    #[serde(default)]
    pub jwt_signing_keys_ref: Option<String>,
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
}

/// One entry of `BackboneConfig.spec.oidc.providers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    pub provider_name: String,
    #[serde(default)]
    pub provider_type: String,
    #[serde(alias = "authorizationUrl")]
    pub provider_url: String,
    pub client_id: String,
    pub client_secret_ref: String,
}
