//! Resource kinds understood by backbone.

use serde::{Deserialize, Serialize};
use std::fmt;

/// API group of the backbone custom resources.
pub const API_GROUP: &str = "iam-backbone.org";

/// API version of the backbone custom resources.
pub const API_VERSION: &str = "v1";

/// The typed resource kinds the store exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A user identity (`BackboneUser`).
    User,
    /// A named set of permissions (`BackboneRole`).
    Role,
    /// An edge from a user to a role (`BackboneRoleBinding`).
    RoleBinding,
    /// A core secret holding base64 encoded credentials.
    Secret,
    /// The singleton broker configuration (`BackboneConfig`).
    Config,
}

impl ResourceKind {
    /// Returns the API group the kind lives in. Secrets are in the core group.
    #[must_use]
    pub fn group(&self) -> &'static str {
        match self {
            Self::Secret => "",
            _ => API_GROUP,
        }
    }

    /// Returns the API version of the kind.
    #[must_use]
    pub fn version(&self) -> &'static str {
        match self {
            Self::Secret => "v1",
            _ => API_VERSION,
        }
    }

    /// Returns the kind name as registered with the store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "BackboneUser",
            Self::Role => "BackboneRole",
            Self::RoleBinding => "BackboneRoleBinding",
            Self::Secret => "Secret",
            Self::Config => "BackboneConfig",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
