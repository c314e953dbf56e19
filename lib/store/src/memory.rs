//! In-memory resource store.
//!
//! Used for local runs and throughout the test suites. Every mutation is
//! published on a broadcast channel so watchers see the same event shapes a
//! cluster-backed store produces.

use crate::error::StoreError;
use crate::kind::ResourceKind;
use crate::resource::{Resource, WatchEvent};
use crate::{ResourceStore, WatchStream};
use async_trait::async_trait;
use futures::StreamExt;
use rootcause::Report;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

const EVENT_CAPACITY: usize = 256;

type Key = (ResourceKind, String);

/// A resource store held entirely in process memory.
#[derive(Debug)]
pub struct MemoryStore {
    resources: RwLock<HashMap<Key, Resource>>,
    events: broadcast::Sender<WatchEvent>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            resources: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Creates or replaces a resource and notifies watchers.
    pub fn apply(&self, resource: Resource) {
        let key = (resource.kind(), resource.name().to_string());
        {
            let mut resources = self
                .resources
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            resources.insert(key, resource.clone());
        }
        debug!(kind = %resource.kind(), name = resource.name(), "resource applied");
        // No receivers simply means nobody is watching yet.
        let _ = self.events.send(WatchEvent::Applied(resource));
    }

    /// Removes a resource and notifies watchers. Returns whether it existed.
    pub fn delete(&self, kind: ResourceKind, name: &str) -> bool {
        let removed = {
            let mut resources = self
                .resources
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            resources.remove(&(kind, name.to_string()))
        };

        match removed {
            Some(resource) => {
                debug!(%kind, name, "resource deleted");
                let _ = self.events.send(WatchEvent::Deleted(resource));
                true
            }
            None => false,
        }
    }

    fn snapshot(&self, kind: ResourceKind) -> Vec<Resource> {
        let resources = self
            .resources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut items: Vec<Resource> = resources
            .values()
            .filter(|resource| resource.kind() == kind)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name().cmp(b.name()));
        items
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, Report<StoreError>> {
        Ok(self.snapshot(kind))
    }

    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Resource, Report<StoreError>> {
        let resources = self
            .resources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let resource = resources
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                name: name.to_string(),
            })?;
        Ok(resource)
    }

    async fn watch(&self, kind: ResourceKind) -> Result<WatchStream, Report<StoreError>> {
        // Subscribe before reading the current state so no change falls in between.
        let receiver = self.events.subscribe();
        let existing = self.snapshot(kind);

        let initial = futures::stream::iter(existing.into_iter().map(|r| Ok(WatchEvent::Applied(r))));
        let changes = BroadcastStream::new(receiver).filter_map(move |item| {
            let mapped = match item {
                Ok(event) if event.resource().kind() == kind => Some(Ok(event)),
                Ok(_) => None,
                Err(e) => Some(Err(Report::from(StoreError::WatchInterrupted {
                    kind,
                    details: e.to_string(),
                }))),
            };
            futures::future::ready(mapped)
        });

        Ok(initial.chain(changes).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(name: &str) -> Resource {
        Resource::with_spec(ResourceKind::User, name, json!({"email": name}))
    }

    #[tokio::test]
    async fn list_filters_by_kind() {
        let store = MemoryStore::new();
        store.apply(user("alice@example.com"));
        store.apply(Resource::with_spec(
            ResourceKind::Role,
            "admin",
            json!({"roleName": "admin", "permissions": []}),
        ));

        let users = store.list(ResourceKind::User).await.expect("list");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name(), "alice@example.com");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = MemoryStore::new();

        let err = store
            .get(ResourceKind::Secret, "nope")
            .await
            .expect_err("should be missing");
        assert!(matches!(err.current_context(), StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn apply_replaces_existing() {
        let store = MemoryStore::new();
        store.apply(user("alice@example.com"));
        store.apply(
            Resource::with_spec(ResourceKind::User, "alice@example.com", json!({"email": "x"}))
                .with_label("v", "2"),
        );

        let fetched = store
            .get(ResourceKind::User, "alice@example.com")
            .await
            .expect("get");
        assert_eq!(fetched.label("v"), Some("2"));
        assert_eq!(store.list(ResourceKind::User).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn watch_replays_existing_then_streams_changes() {
        let store = MemoryStore::new();
        store.apply(user("alice@example.com"));

        let mut stream = store.watch(ResourceKind::User).await.expect("watch");

        let first = stream.next().await.expect("event").expect("ok");
        assert!(matches!(first, WatchEvent::Applied(ref r) if r.name() == "alice@example.com"));

        store.apply(Resource::with_spec(
            ResourceKind::Role,
            "ignored",
            json!({"roleName": "ignored", "permissions": []}),
        ));
        store.apply(user("bob@example.com"));
        assert!(store.delete(ResourceKind::User, "alice@example.com"));

        let second = stream.next().await.expect("event").expect("ok");
        assert!(matches!(second, WatchEvent::Applied(ref r) if r.name() == "bob@example.com"));

        let third = stream.next().await.expect("event").expect("ok");
        assert!(matches!(third, WatchEvent::Deleted(ref r) if r.name() == "alice@example.com"));
    }

    #[tokio::test]
    async fn delete_missing_returns_false() {
        let store = MemoryStore::new();
        assert!(!store.delete(ResourceKind::User, "ghost"));
    }
}
