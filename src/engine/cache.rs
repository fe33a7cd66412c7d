// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Last-reconciled snapshots keyed by resource key.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::types::key::ResourceKey;

/// Snapshot of the last successfully processed generation of an object
#[derive(Clone, Debug)]
pub struct CachedEntry<K> {
    pub state: K,
}

pub struct ResourceCache<K> {
    entries: Mutex<HashMap<ResourceKey, CachedEntry<K>>>,
}

impl<K: Clone> Default for ResourceCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone> ResourceCache<K> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ResourceKey, CachedEntry<K>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &ResourceKey) -> Option<CachedEntry<K>> {
        self.entries().get(key).cloned()
    }

    pub fn set(&self, key: ResourceKey, state: K) {
        self.entries().insert(key, CachedEntry { state });
    }

    pub fn delete(&self, key: &ResourceKey) -> Option<CachedEntry<K>> {
        self.entries().remove(key)
    }

    pub fn exists(&self, key: &ResourceKey) -> bool {
        self.entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
