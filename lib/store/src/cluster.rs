//! Kubernetes-backed resource store.
//!
//! Custom resources and secrets are read through dynamic APIs so the store
//! does not need generated types for the backbone CRDs.

use crate::error::StoreError;
use crate::kind::ResourceKind;
use crate::resource::{Resource, WatchEvent};
use crate::{ResourceStore, WatchStream};
use async_trait::async_trait;
use futures::StreamExt;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::Client;
use rootcause::Report;
use std::path::Path;
use tracing::{debug, info};

/// A resource store reading from one namespace of a Kubernetes cluster.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    namespace: String,
}

impl KubeStore {
    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Connects using the given kubeconfig file, or the in-cluster service
    /// account when no path is given.
    pub async fn connect(
        kubeconfig: Option<&Path>,
        namespace: impl Into<String>,
    ) -> Result<Self, Report<StoreError>> {
        let config = match kubeconfig {
            Some(path) => {
                info!(path = %path.display(), "using kubeconfig");
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| StoreError::Connection {
                    details: e.to_string(),
                })?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| StoreError::Connection {
                        details: e.to_string(),
                    })?
            }
            None => {
                info!("using in-cluster configuration");
                kube::Config::incluster().map_err(|e| StoreError::Connection {
                    details: e.to_string(),
                })?
            }
        };

        let client = Client::try_from(config).map_err(|e| StoreError::Connection {
            details: e.to_string(),
        })?;

        Ok(Self::new(client, namespace))
    }

    fn api(&self, kind: ResourceKind) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(kind.group(), kind.version(), kind.as_str());
        let resource = ApiResource::from_gvk(&gvk);
        Api::namespaced_with(self.client.clone(), &self.namespace, &resource)
    }
}

fn to_resource(kind: ResourceKind, object: DynamicObject) -> Resource {
    let name = object.metadata.name.unwrap_or_default();
    let labels = object.metadata.labels.unwrap_or_default();
    Resource::new(kind, name, object.data).with_labels(labels)
}

fn request_failed(kind: ResourceKind, error: &kube::Error) -> StoreError {
    StoreError::RequestFailed {
        kind,
        details: error.to_string(),
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, Report<StoreError>> {
        let objects = self
            .api(kind)
            .list(&ListParams::default())
            .await
            .map_err(|e| request_failed(kind, &e))?;

        debug!(%kind, count = objects.items.len(), "listed resources");
        Ok(objects
            .items
            .into_iter()
            .map(|object| to_resource(kind, object))
            .collect())
    }

    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Resource, Report<StoreError>> {
        let object = self
            .api(kind)
            .get_opt(name)
            .await
            .map_err(|e| request_failed(kind, &e))?
            .ok_or_else(|| StoreError::NotFound {
                kind,
                name: name.to_string(),
            })?;

        Ok(to_resource(kind, object))
    }

    async fn watch(&self, kind: ResourceKind) -> Result<WatchStream, Report<StoreError>> {
        let api = self.api(kind);

        // The watcher connects lazily; probe once so an unreachable or
        // forbidden API is reported to the caller instead of retried forever.
        api.list(&ListParams::default().limit(1))
            .await
            .map_err(|e| request_failed(kind, &e))?;

        let stream = watcher::watcher(api, watcher::Config::default())
            .default_backoff()
            .filter_map(move |event| {
                let mapped = match event {
                    Ok(Event::Apply(object) | Event::InitApply(object)) => {
                        Some(Ok(WatchEvent::Applied(to_resource(kind, object))))
                    }
                    Ok(Event::Delete(object)) => {
                        Some(Ok(WatchEvent::Deleted(to_resource(kind, object))))
                    }
                    Ok(Event::Init | Event::InitDone) => None,
                    Err(e) => Some(Err(Report::from(StoreError::WatchInterrupted {
                        kind,
                        details: e.to_string(),
                    }))),
                };
                futures::future::ready(mapped)
            });

        Ok(stream.boxed())
    }
}
