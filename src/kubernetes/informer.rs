// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Read-through index over the reflector store a kube-runtime controller keeps.

use async_trait::async_trait;
use kube::ResourceExt;
use kube_runtime::reflector::{ObjectRef, Store};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::kubernetes::client::KubeObject;
use crate::store::{ListSelector, ObjectIndex};
use crate::types::key::ResourceKey;

/// Local index of one kind. It fills only while the owning controller runs.
#[derive(Clone)]
pub struct KubeIndex<K: KubeObject> {
    store: Store<K>,
}

impl<K: KubeObject> KubeIndex<K> {
    pub fn new(store: Store<K>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<K: KubeObject> ObjectIndex<K> for KubeIndex<K> {
    fn get(&self, key: &ResourceKey) -> Option<Arc<K>> {
        let mut object_ref = ObjectRef::new(&key.name);
        if let Some(ns) = &key.namespace {
            object_ref = object_ref.within(ns);
        }
        self.store.get(&object_ref)
    }

    fn list(&self, selector: &ListSelector) -> Vec<Arc<K>> {
        self.store
            .state()
            .into_iter()
            .filter(|obj| selector.matches(obj.namespace().as_deref(), obj.labels()))
            .collect()
    }

    async fn wait_until_ready(&self) -> Result<()> {
        self.store
            .wait_until_ready()
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))
    }
}
