// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Background health verification bookkeeping.
//!
//! The registry hands out one registration per key. Each registration carries
//! a generation so a loop whose key was removed and re-registered by a newer
//! loop notices that it is no longer the owner and exits.

use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

use crate::types::key::ResourceKey;
use crate::types::phase::Phase;

/// Proof of ownership of a key's verification loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registration(u64);

#[derive(Default)]
struct Registry {
    keys: HashMap<ResourceKey, u64>,
    next: u64,
}

#[derive(Default)]
pub struct HealthRegistry {
    inner: Mutex<Registry>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `key`, unless a loop already owns it
    pub fn try_register(&self, key: &ResourceKey) -> Option<Registration> {
        let mut registry = self.registry();
        if registry.keys.contains_key(key) {
            return None;
        }
        registry.next += 1;
        let generation = registry.next;
        registry.keys.insert(key.clone(), generation);
        Some(Registration(generation))
    }

    pub fn is_current(&self, key: &ResourceKey, registration: Registration) -> bool {
        self.registry().keys.get(key) == Some(&registration.0)
    }

    pub fn exists(&self, key: &ResourceKey) -> bool {
        self.registry().keys.contains_key(key)
    }

    /// Drop whatever registration `key` has
    pub fn remove(&self, key: &ResourceKey) -> bool {
        self.registry().keys.remove(key).is_some()
    }

    /// Drop the registration only if it is still the one given
    pub fn release(&self, key: &ResourceKey, registration: Registration) {
        let mut registry = self.registry();
        if registry.keys.get(key) == Some(&registration.0) {
            registry.keys.remove(key);
        }
    }
}

/// Why a verification loop ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The key was removed from the registry by another path
    Unregistered,
    /// The object no longer exists
    NotFound,
    /// The object moved to a phase driven by another path
    PhaseOwnedElsewhere(Phase),
    /// The controller is shutting down
    Shutdown,
}

pub fn unregistered(registered: bool) -> Option<StopReason> {
    (!registered).then_some(StopReason::Unregistered)
}

pub fn not_found(phase: Option<Phase>) -> Option<StopReason> {
    phase.is_none().then_some(StopReason::NotFound)
}

pub fn wrong_phase(phase: Option<Phase>) -> Option<StopReason> {
    match phase {
        Some(p @ (Phase::Pending | Phase::Terminating)) => Some(StopReason::PhaseOwnedElsewhere(p)),
        _ => None,
    }
}

/// Evaluate the stop predicates in order; `phase` is `None` when the refetch found nothing
pub fn stop_reason(registered: bool, phase: Option<Phase>) -> Option<StopReason> {
    unregistered(registered)
        .or_else(|| not_found(phase))
        .or_else(|| wrong_phase(phase))
}

/// Runs a tick immediately and then on every interval until the tick breaks
/// or the stop signal is observed at an interval boundary.
pub struct RepeatingTask {
    interval: Duration,
    stop: watch::Receiver<bool>,
}

impl RepeatingTask {
    pub fn new(interval: Duration, stop: watch::Receiver<bool>) -> Self {
        Self { interval, stop }
    }

    pub async fn run<F, Fut>(self, mut tick: F) -> StopReason
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ControlFlow<StopReason>>,
    {
        loop {
            if *self.stop.borrow() {
                return StopReason::Shutdown;
            }
            if let ControlFlow::Break(reason) = tick().await {
                return reason;
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
