//! Declarative resource store for backbone.
//!
//! Users, roles, role bindings, secrets and the broker configuration are all
//! named records in an external store. This crate defines the read/watch
//! interface the rest of backbone depends on, plus two backends:
//!
//! - [`KubeStore`]: custom resources and secrets in a Kubernetes namespace
//! - [`MemoryStore`]: an in-process store for local runs and tests

pub mod cluster;
pub mod error;
pub mod kind;
pub mod memory;
pub mod resource;

pub use cluster::KubeStore;
pub use error::StoreError;
pub use kind::ResourceKind;
pub use memory::MemoryStore;
pub use resource::{Resource, WatchEvent};

use async_trait::async_trait;
use backbone_core::Result;
use futures::stream::BoxStream;

/// A stream of change events for one resource kind.
pub type WatchStream = BoxStream<'static, Result<WatchEvent, StoreError>>;

/// Read access to the declarative store.
///
/// Implementations must be shareable across tasks; the sync engine, the
/// config watcher and the secret resolver all hold the same store.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Lists every resource of a kind.
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, StoreError>;

    /// Fetches one resource by name.
    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Resource, StoreError>;

    /// Starts watching a kind. Existing resources are delivered first as
    /// [`WatchEvent::Applied`].
    ///
    /// Returns an error when the watch cannot be established at all; errors
    /// after that arrive inside the stream.
    async fn watch(&self, kind: ResourceKind) -> Result<WatchStream, StoreError>;
}
