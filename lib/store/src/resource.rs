//! Resource records and change events.

use crate::error::StoreError;
use crate::kind::ResourceKind;
use rootcause::Report;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// A named record read from the declarative store.
///
/// The body is the raw object minus its metadata: custom resources keep their
/// fields under `spec`, secrets under `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    kind: ResourceKind,
    name: String,
    labels: BTreeMap<String, String>,
    body: serde_json::Value,
}

impl Resource {
    /// Creates a resource from its raw body.
    #[must_use]
    pub fn new(kind: ResourceKind, name: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            kind,
            name: name.into(),
            labels: BTreeMap::new(),
            body,
        }
    }

    /// Creates a custom resource whose body is `{"spec": spec}`.
    #[must_use]
    pub fn with_spec(kind: ResourceKind, name: impl Into<String>, spec: serde_json::Value) -> Self {
        Self::new(kind, name, serde_json::json!({ "spec": spec }))
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Replaces all labels.
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Returns the value of a label, if set.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn body(&self) -> &serde_json::Value {
        &self.body
    }

    /// Decodes the `spec` section into a typed value.
    pub fn spec<T: DeserializeOwned>(&self) -> Result<T, Report<StoreError>> {
        self.decode_section("spec")
    }

    /// Decodes the `data` section into a typed value.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, Report<StoreError>> {
        self.decode_section("data")
    }

    fn decode_section<T: DeserializeOwned>(&self, section: &str) -> Result<T, Report<StoreError>> {
        let value = self.body.get(section).cloned().ok_or_else(|| StoreError::Decode {
            kind: self.kind,
            name: self.name.clone(),
            details: format!("missing `{section}` section"),
        })?;

        Ok(serde_json::from_value(value).map_err(|e| StoreError::Decode {
            kind: self.kind,
            name: self.name.clone(),
            details: e.to_string(),
        })?)
    }
}

/// A change observed on a watched kind.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// The resource was created or updated. Existing resources are also
    /// reported this way when a watch starts.
    Applied(Resource),
    /// The resource was removed.
    Deleted(Resource),
}

impl WatchEvent {
    /// Returns the resource the event refers to.
    #[must_use]
    pub fn resource(&self) -> &Resource {
        match self {
            Self::Applied(resource) | Self::Deleted(resource) => resource,
        }
    }
}
