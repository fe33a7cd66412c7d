// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Seams between the controllers and the backing store.
//!
//! [`ResourceStore`] is the read/write client, [`ObjectIndex`] the
//! eventually-consistent read-through index fed by the change-notification
//! stream. Optional store features are exposed as capability traits that a
//! real client implements and a fake simply leaves out.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::backoff::RateLimiter;
use crate::error::Result;
use crate::types::key::ResourceKey;

/// Filter applied to list calls
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListSelector {
    /// Restrict to one parent scope; `None` lists across all of them
    pub namespace: Option<String>,
    /// Every label must match exactly
    pub labels: BTreeMap<String, String>,
}

impl ListSelector {
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Render the labels as a Kubernetes label selector string
    pub fn label_selector(&self) -> Option<String> {
        if self.labels.is_empty() {
            return None;
        }
        Some(
            self.labels
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    pub fn matches(&self, namespace: Option<&str>, labels: &BTreeMap<String, String>) -> bool {
        if let Some(ns) = &self.namespace {
            if namespace != Some(ns.as_str()) {
                return false;
            }
        }
        self.labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

/// Read/write client for one kind
#[async_trait]
pub trait ResourceStore<K>: Send + Sync {
    /// Fetch the latest version; a missing object yields a not-found error
    async fn get(&self, key: &ResourceKey) -> Result<K>;

    async fn list(&self, selector: &ListSelector) -> Result<Vec<K>>;

    async fn create(&self, obj: &K) -> Result<K>;

    /// Replace the whole object, guarded by its resource version
    async fn update(&self, obj: &K) -> Result<K>;

    /// Replace only the status, guarded by its resource version
    async fn update_status(&self, obj: &K) -> Result<K>;

    /// Delete, optionally only if the stored object still carries `uid`
    async fn delete(&self, key: &ResourceKey, uid: Option<&str>) -> Result<()>;

    /// Dedicated finalize sub-resource, when the store exposes one
    fn finalize_api(&self) -> Option<&dyn FinalizeApi<K>> {
        None
    }

    /// Requeue backoff tuned for this store, when it provides one
    fn rate_limiter_provider(&self) -> Option<&dyn RateLimiterProvider> {
        None
    }
}

/// Writes the spec finalizer list through a dedicated sub-resource
#[async_trait]
pub trait FinalizeApi<K>: Send + Sync {
    async fn finalize(&self, obj: &K) -> Result<K>;
}

/// Supplies the requeue backoff the controller should use for a store
pub trait RateLimiterProvider: Send + Sync {
    fn rate_limiter(&self) -> RateLimiter;
}

/// Eventually-consistent local view of one kind
#[async_trait]
pub trait ObjectIndex<K>: Send + Sync {
    fn get(&self, key: &ResourceKey) -> Option<Arc<K>>;

    fn list(&self, selector: &ListSelector) -> Vec<Arc<K>>;

    /// Resolves once the initial list has been loaded
    async fn wait_until_ready(&self) -> Result<()>;
}
