// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Level-triggered controller shared by every managed kind.
//!
//! A kube-runtime controller turns watch events into reconciles of one key
//! at a time. Each reconcile re-derives the next action from the object's
//! own fields:
//!
//! - gone from the index: drop local bookkeeping
//! - deletion timestamp set: drop local bookkeeping, run the finalizer
//! - legacy schema: persist the normalized object and stop
//! - live: claim the finalizer token first
//! - Pending: initial synchronization, then Available or Failed
//! - Failed: full resynchronization against the cached baseline
//! - Available: ensure a health loop, re-synchronize against the cached baseline

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::StreamExt;
use kube_runtime::controller::{Action, Config as RuntimeConfig, Error as RuntimeError};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::watcher;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::engine::backoff::{Backoff, RateLimiter};
use crate::engine::cache::ResourceCache;
use crate::engine::finalizer::{ContentDeleter, Finalizer};
use crate::engine::health::{self, HealthRegistry, Registration, RepeatingTask, StopReason};
use crate::error::{Error, Result};
use crate::store::{ObjectIndex, ResourceStore};
use crate::types::key::ResourceKey;
use crate::types::phase::{Phase, PhaseEvent};
use crate::types::resource::ManagedResource;

/// Kind-specific behavior plugged into the generic controller
#[async_trait]
pub trait KindHandler<K: ManagedResource>: Send + Sync + 'static {
    /// Reason recorded when synchronization fails
    const SYNC_FAILED_REASON: &'static str = "SyncFailed";

    /// Rewrite legacy schema values; `Some` means the object must be persisted first
    fn normalize(&self, _obj: &K) -> Option<K> {
        None
    }

    /// Bring collaborators in line with `obj`, diffing against `previous`.
    /// A `Failed` object must be brought fully in line, not just diffed.
    async fn sync(&self, _obj: &K, _previous: Option<&K>) -> Result<()> {
        Ok(())
    }

    /// Baseline cached after a failed sync of `attempted`. It must still cover
    /// whatever `previous` had created, or the next pass cannot clean it up.
    fn failed_baseline(&self, attempted: &K, _previous: Option<&K>) -> K {
        attempted.clone()
    }

    /// Recompute derived status fields before the status is persisted
    fn refresh_status(&self, _obj: &mut K) {}

    /// Periodic verification of an Available object. Reports, never repairs.
    async fn check_health(&self, _obj: &K) -> Result<()> {
        Ok(())
    }

    /// Ordered content deletion steps run by the finalizer
    fn cascade(&self) -> Vec<Arc<dyn ContentDeleter<K>>>;
}

#[derive(Clone, Debug)]
pub struct ControllerSettings {
    /// Finalizer token owned by this controller
    pub finalizer_token: String,
    pub delete_when_done: bool,
    /// Grace delay between a notification and its reconcile
    pub enqueue_delay: Duration,
    pub health_interval: Duration,
    /// Used when the store does not provide its own rate limiter
    pub rate_limiter: RateLimiter,
}

impl ControllerSettings {
    pub fn new(finalizer_token: impl Into<String>) -> Self {
        Self {
            finalizer_token: finalizer_token.into(),
            delete_when_done: false,
            enqueue_delay: Duration::from_millis(500),
            health_interval: Duration::from_secs(60),
            rate_limiter: RateLimiter::default(),
        }
    }
}

struct Inner<K: ManagedResource, H> {
    store: Arc<dyn ResourceStore<K>>,
    index: Arc<dyn ObjectIndex<K>>,
    handler: H,
    backoff: Backoff,
    cache: ResourceCache<K>,
    health: HealthRegistry,
    finalizer: Finalizer<K>,
    settings: ControllerSettings,
    stop: watch::Sender<bool>,
}

pub struct Controller<K: ManagedResource, H> {
    inner: Arc<Inner<K, H>>,
}

impl<K: ManagedResource, H> Clone for Controller<K, H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, H> Controller<K, H>
where
    K: ManagedResource,
    H: KindHandler<K>,
{
    pub fn new(
        store: Arc<dyn ResourceStore<K>>,
        index: Arc<dyn ObjectIndex<K>>,
        handler: H,
        settings: ControllerSettings,
    ) -> Self {
        let limiter = store
            .rate_limiter_provider()
            .map(|provider| provider.rate_limiter())
            .unwrap_or_else(|| settings.rate_limiter.clone());
        let finalizer = Finalizer::new(
            store.clone(),
            settings.finalizer_token.clone(),
            settings.delete_when_done,
            handler.cascade(),
        );
        let (stop, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                store,
                index,
                handler,
                backoff: Backoff::new(limiter),
                cache: ResourceCache::new(),
                health: HealthRegistry::new(),
                finalizer,
                settings,
                stop,
            }),
        }
    }

    /// Drive `runtime` with up to `workers` concurrent reconciles until `stop`
    /// flips. In-flight reconciles finish first, then every health loop ends.
    pub async fn run(
        self,
        runtime: kube_runtime::Controller<K>,
        workers: usize,
        stop: watch::Receiver<bool>,
    ) {
        let (trigger, shutdown) = oneshot::channel::<()>();
        let mut signal = stop;
        tokio::spawn(async move {
            // A dropped sender stops the controller too
            let _ = signal.wait_for(|stopped| *stopped).await;
            let _ = trigger.send(());
        });

        let config = RuntimeConfig::default()
            .concurrency(u16::try_from(workers).unwrap_or(u16::MAX))
            .debounce(self.inner.settings.enqueue_delay);
        info!(kind = K::KIND, workers, "Starting controller");

        let observer = self.clone();
        runtime
            .with_config(config)
            .graceful_shutdown_on(async move {
                let _ = shutdown.await;
            })
            .run(reconcile::<K, H>, error_policy::<K, H>, Arc::new(self.clone()))
            .for_each(move |result| {
                observer.observe(result);
                futures::future::ready(())
            })
            .await;

        info!(kind = K::KIND, "Controller stopped, ending health verification");
        self.inner.stop.send_replace(true);
    }

    fn observe(
        &self,
        result: std::result::Result<(ObjectRef<K>, Action), RuntimeError<Error, watcher::Error>>,
    ) {
        match result {
            Ok((object, _)) => debug!(kind = K::KIND, %object, "Reconciled"),
            // Queued for a key the index no longer holds
            Err(RuntimeError::ObjectNotFound(object)) => {
                let key = match object.namespace {
                    Some(ns) => ResourceKey::namespaced(ns, object.name),
                    None => ResourceKey::cluster(object.name),
                };
                debug!(kind = K::KIND, key = %key, "Object no longer exists");
                self.inner.backoff.forget(&key);
                self.local_cleanup(&key);
            }
            // Already logged by the error policy
            Err(RuntimeError::ReconcilerFailed(_, _)) => {}
            Err(e) => warn!(kind = K::KIND, error = %e, "Controller error"),
        }
    }

    /// Reconcile one key
    #[instrument(skip(self), fields(kind = K::KIND, key = %key))]
    pub async fn sync_item(&self, key: &ResourceKey) -> Result<()> {
        let Some(obj) = self.inner.index.get(key) else {
            debug!("Object no longer exists");
            self.local_cleanup(key);
            return Ok(());
        };
        let obj = (*obj).clone();

        if obj.is_deleting() {
            self.local_cleanup(key);
            return self.inner.finalizer.delete(key).await;
        }

        if let Some(normalized) = self.inner.handler.normalize(&obj) {
            info!("Rewriting legacy schema values");
            self.inner.store.update(&normalized).await?;
            return Ok(());
        }

        match obj.phase() {
            Phase::Pending | Phase::Available | Phase::Failed => {
                let obj = self.inner.finalizer.ensure_token(obj).await?;
                self.process_update(key, obj).await
            }
            Phase::Terminating => {
                debug!("Terminating without deletion timestamp, waiting for the store");
                Ok(())
            }
        }
    }

    /// Forget everything this controller tracks for `key`
    fn local_cleanup(&self, key: &ResourceKey) {
        self.inner.cache.delete(key);
        self.inner.health.remove(key);
    }

    async fn process_update(&self, key: &ResourceKey, obj: K) -> Result<()> {
        let mut previous = self.inner.cache.get(key).map(|entry| entry.state);
        if let Some(cached) = &previous {
            if cached.uid_str() != obj.uid_str() {
                info!(
                    old_uid = cached.uid_str().unwrap_or_default(),
                    new_uid = obj.uid_str().unwrap_or_default(),
                    "Object was replaced, clearing state of the previous generation"
                );
                self.local_cleanup(key);
                previous = None;
            }
        }

        let result = self.handle_phase(key, &obj, previous.as_ref()).await?;
        self.inner.cache.set(key.clone(), result);
        Ok(())
    }

    async fn handle_phase(&self, key: &ResourceKey, obj: &K, previous: Option<&K>) -> Result<K> {
        let phase = obj.phase();
        let baseline = match phase {
            Phase::Available => {
                self.ensure_health_loop(key);
                previous
            }
            Phase::Failed => {
                self.inner.health.remove(key);
                previous
            }
            _ => {
                self.inner.health.remove(key);
                None
            }
        };

        let mut desired = obj.clone();
        let synced = match self.inner.handler.sync(obj, baseline).await {
            Ok(()) => {
                desired
                    .phase_state_mut()
                    .apply(PhaseEvent::Synced, None, None)?;
                true
            }
            Err(e) => {
                warn!(error = %e, %phase, "Synchronization failed");
                desired.phase_state_mut().apply(
                    PhaseEvent::SyncFailed,
                    Some(H::SYNC_FAILED_REASON.to_string()),
                    Some(e.to_string()),
                )?;
                false
            }
        };
        self.inner.handler.refresh_status(&mut desired);

        let stored = self.update_status(obj, desired).await?;
        if synced {
            Ok(stored)
        } else {
            Ok(self.inner.handler.failed_baseline(&stored, baseline))
        }
    }

    /// Persist `desired` if its status differs from `current`.
    ///
    /// Conflicts are returned rather than retried: the key goes back through
    /// the rate limiter and the next attempt starts from the fresh object.
    pub async fn update_status(&self, current: &K, desired: K) -> Result<K> {
        if current.status() == desired.status() {
            return Ok(desired);
        }
        debug!(phase = %desired.phase(), "Updating status");
        self.inner.store.update_status(&desired).await
    }

    fn ensure_health_loop(&self, key: &ResourceKey) {
        let Some(registration) = self.inner.health.try_register(key) else {
            return;
        };
        debug!("Starting health verification");

        let controller = self.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let task = RepeatingTask::new(
                controller.inner.settings.health_interval,
                controller.inner.stop.subscribe(),
            );
            let reason = task
                .run(|| controller.health_tick(&key, registration))
                .await;
            controller.inner.health.release(&key, registration);
            debug!(kind = K::KIND, key = %key, ?reason, "Health verification stopped");
        });
    }

    async fn health_tick(&self, key: &ResourceKey, registration: Registration) -> ControlFlow<StopReason> {
        let registered = self.inner.health.is_current(key, registration);
        let current = if registered {
            match self.inner.store.get(key).await {
                Ok(obj) => Some(obj),
                Err(e) if e.is_not_found() => None,
                Err(e) => {
                    warn!(kind = K::KIND, key = %key, error = %e, "Health refetch failed");
                    return ControlFlow::Continue(());
                }
            }
        } else {
            None
        };

        if let Some(reason) = health::stop_reason(registered, current.as_ref().map(|o| o.phase())) {
            return ControlFlow::Break(reason);
        }

        if let Some(obj) = current {
            if let Err(e) = self.inner.handler.check_health(&obj).await {
                warn!(kind = K::KIND, key = %key, error = %e, "Health check failed");
            }
        }
        ControlFlow::Continue(())
    }

    pub fn is_cached(&self, key: &ResourceKey) -> bool {
        self.inner.cache.exists(key)
    }

    pub fn cached(&self, key: &ResourceKey) -> Option<K> {
        self.inner.cache.get(key).map(|entry| entry.state)
    }

    pub fn is_health_checked(&self, key: &ResourceKey) -> bool {
        self.inner.health.exists(key)
    }
}

async fn reconcile<K, H>(obj: Arc<K>, ctx: Arc<Controller<K, H>>) -> Result<Action>
where
    K: ManagedResource,
    H: KindHandler<K>,
{
    let key = obj.key();
    ctx.inner.index.wait_until_ready().await?;
    ctx.sync_item(&key).await?;
    ctx.inner.backoff.forget(&key);
    Ok(Action::await_change())
}

/// Requeue a failed key with its own exponential delay, never sooner than the grace delay
fn error_policy<K, H>(obj: Arc<K>, error: &Error, ctx: Arc<Controller<K, H>>) -> Action
where
    K: ManagedResource,
    H: KindHandler<K>,
{
    let key = obj.key();
    let delay = ctx
        .inner
        .backoff
        .next_delay(&key)
        .max(ctx.inner.settings.enqueue_delay);
    warn!(kind = K::KIND, key = %key, error = %error, ?delay, "Reconcile failed, requeueing");
    Action::requeue(delay)
}
