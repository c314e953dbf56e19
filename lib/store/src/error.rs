//! Store error types.

use crate::kind::ResourceKind;
use std::fmt;

/// Errors from declarative store operations.
///
/// Variants carry only what the store layer knows; callers decide whether a
/// failure is fatal (startup) or contained (sync, watch, secret lookup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Could not construct a client for the store.
    Connection { details: String },
    /// The named resource does not exist.
    NotFound { kind: ResourceKind, name: String },
    /// A list, get or watch request failed upstream.
    RequestFailed { kind: ResourceKind, details: String },
    /// The resource exists but its body does not have the expected shape.
    Decode {
        kind: ResourceKind,
        name: String,
        details: String,
    },
    /// The change stream broke after being established.
    WatchInterrupted { kind: ResourceKind, details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection { details } => {
                write!(f, "failed to connect to resource store: {details}")
            }
            Self::NotFound { kind, name } => {
                write!(f, "{kind} '{name}' not found")
            }
            Self::RequestFailed { kind, details } => {
                write!(f, "store request for {kind} failed: {details}")
            }
            Self::Decode {
                kind,
                name,
                details,
            } => {
                write!(f, "cannot decode {kind} '{name}': {details}")
            }
            Self::WatchInterrupted { kind, details } => {
                write!(f, "watch on {kind} interrupted: {details}")
            }
        }
    }
}

impl std::error::Error for StoreError {}
