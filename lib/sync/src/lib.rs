//! RBAC synchronization and configuration watching for backbone.
//!
//! - [`ResourceSyncEngine`] mirrors users, roles and role bindings from a
//!   [`ResourceStore`](backbone_store::ResourceStore) into an immutable
//!   [`RbacSnapshot`] and answers identity lookups from it.
//! - [`ConfigWatcher`] follows the broker configuration resource, resolves
//!   every secret it references and publishes it through [`LiveConfig`].
//! - [`ReadinessBarrier`] lets startup wait for the first valid
//!   configuration.
//!
//! # Example
//!
//! ```
//! use backbone_store::{MemoryStore, Resource, ResourceKind};
//! use backbone_sync::ResourceSyncEngine;
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test_block(async {
//! let store = Arc::new(MemoryStore::new());
//! store.apply(Resource::with_spec(
//!     ResourceKind::User,
//!     "alice",
//!     json!({"email": "alice@example.com", "firstName": "Alice", "lastName": "Doe"}),
//! ));
//!
//! let engine = ResourceSyncEngine::new(store, Duration::from_secs(10));
//! engine.sync().await;
//! assert!(engine.get_user_roles("alice@example.com").unwrap().is_empty());
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread()
//! #         .enable_all()
//! #         .build()
//! #         .unwrap()
//! #         .block_on(f)
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod readiness;
pub mod resources;
pub mod secret;
pub mod snapshot;
pub mod watcher;

pub use config::{BrokerConfig, Mode, OidcSettings};
pub use engine::{DEFAULT_STORE_TIMEOUT, ResourceSyncEngine, SyncOutcome, SyncStats};
pub use error::{ConfigError, SecretError};
pub use readiness::ReadinessBarrier;
pub use resources::{ConfigSpec, OidcSpec, ProviderSpec, UserSpec};
pub use secret::SecretResolver;
pub use snapshot::RbacSnapshot;
pub use watcher::{ConfigWatcher, LiveConfig};
