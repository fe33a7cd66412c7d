// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Finalizer protocol for objects carrying a deletion timestamp.
//!
//! Live objects get this controller's token in both finalizer lists before
//! anything else happens to them, so the API server holds a deleted object
//! until the content is gone.
//!
//! Every call re-derives its next step from a freshly fetched object, so it
//! can be repeated until it succeeds:
//!
//! 1. mark the object `Terminating`
//! 2. while this controller's token is present, run every content deletion
//!    step, collecting errors, and strip the token only after a clean run
//! 3. once no tokens remain, optionally delete the object

use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::engine::retry::{retry_on_conflict, WriteKind};
use crate::error::{Error, Result};
use crate::store::ResourceStore;
use crate::types::key::ResourceKey;
use crate::types::phase::{Phase, PhaseEvent};
use crate::types::resource::ManagedResource;

/// One dependent-content deletion step. Must be idempotent.
#[async_trait]
pub trait ContentDeleter<K>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn delete(&self, obj: &K) -> Result<()>;
}

pub struct Finalizer<K> {
    store: Arc<dyn ResourceStore<K>>,
    token: String,
    delete_when_done: bool,
    steps: Vec<Arc<dyn ContentDeleter<K>>>,
}

impl<K: ManagedResource> Finalizer<K> {
    pub fn new(
        store: Arc<dyn ResourceStore<K>>,
        token: impl Into<String>,
        delete_when_done: bool,
        steps: Vec<Arc<dyn ContentDeleter<K>>>,
    ) -> Self {
        Self {
            store,
            token: token.into(),
            delete_when_done,
            steps,
        }
    }

    /// Add the token to whichever finalizer list lacks it
    pub async fn ensure_token(&self, obj: K) -> Result<K> {
        let in_spec = obj.spec_finalizers().iter().any(|f| f == &self.token);
        let in_metadata = obj.finalizers().iter().any(|f| f == &self.token);
        if in_spec && in_metadata {
            return Ok(obj);
        }

        let mut next = obj;
        if !in_spec {
            next.spec_finalizers_mut().push(self.token.clone());
        }
        if !in_metadata {
            next.finalizers_mut().push(self.token.clone());
        }
        debug!(token = %self.token, "Adding finalizer");
        self.store.update(&next).await
    }

    #[instrument(skip(self), fields(kind = K::KIND, key = %key))]
    pub async fn delete(&self, key: &ResourceKey) -> Result<()> {
        match self.run(key).await {
            Err(e) if e.is_not_found() => {
                debug!("Object disappeared during finalization");
                Ok(())
            }
            other => other,
        }
    }

    async fn run(&self, key: &ResourceKey) -> Result<()> {
        let obj = self.store.get(key).await?;
        if !obj.is_deleting() {
            return Ok(());
        }

        let obj = self.mark_terminating(obj).await?;
        if !obj.is_deleting() {
            info!("Deletion timestamp was cleared, aborting finalization");
            return Ok(());
        }

        let obj = if obj.holds_finalizer(&self.token) {
            self.delete_content(&obj).await?;
            self.remove_token(obj).await?
        } else {
            obj
        };

        if obj.finalized() {
            return self.delete_object(&obj).await;
        }
        debug!("Own finalizer removed, waiting on other finalizers");
        Ok(())
    }

    async fn mark_terminating(&self, obj: K) -> Result<K> {
        retry_on_conflict(self.store.as_ref(), obj, WriteKind::UpdateStatus, |current| {
            if !current.is_deleting() || current.phase() == Phase::Terminating {
                return Ok(None);
            }
            let mut next = current.clone();
            next.phase_state_mut()
                .apply(PhaseEvent::DeletionRequested, None, None)?;
            Ok(Some(next))
        })
        .await
    }

    /// Run every step even when an earlier one fails
    async fn delete_content(&self, obj: &K) -> Result<()> {
        let mut errors = Vec::new();
        for step in &self.steps {
            if let Err(e) = step.delete(obj).await {
                warn!(step = step.name(), error = %e, "Content deletion step failed");
                match e {
                    Error::Aggregate(inner) => errors.extend(inner),
                    other => errors.push(other),
                }
            }
        }
        Error::aggregate(errors)
    }

    async fn remove_token(&self, obj: K) -> Result<K> {
        let token = self.token.as_str();
        retry_on_conflict(self.store.as_ref(), obj, WriteKind::Finalize, |current| {
            if !current.holds_finalizer(token) {
                return Ok(None);
            }
            let mut next = current.clone();
            next.spec_finalizers_mut().retain(|f| f != token);
            next.finalizers_mut().retain(|f| f != token);
            Ok(Some(next))
        })
        .await
    }

    async fn delete_object(&self, obj: &K) -> Result<()> {
        if !self.delete_when_done {
            return Ok(());
        }
        info!(name = %obj.name_any(), "Finalized, deleting object");
        match self.store.delete(&obj.key(), obj.uid_str()).await {
            Ok(()) => Ok(()),
            // The UID precondition failed: the object we finalized is already gone
            Err(e) if e.is_conflict() => {
                info!("Object was replaced before final delete, nothing left to remove");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
