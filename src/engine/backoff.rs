// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-key exponential requeue delays for failed reconciles.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::types::key::ResourceKey;

/// Exponential backoff: `base * 2^failures`, capped at `max`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimiter {
    pub base: Duration,
    pub max: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5),
            max: Duration::from_secs(1000),
        }
    }
}

impl RateLimiter {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }
}

/// Consecutive failure counts per key
pub struct Backoff {
    limiter: RateLimiter,
    failures: Mutex<HashMap<ResourceKey, u32>>,
}

impl Backoff {
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            limiter,
            failures: Mutex::new(HashMap::new()),
        }
    }

    fn failures(&self) -> MutexGuard<'_, HashMap<ResourceKey, u32>> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a failure of `key` and return how long to wait before retrying it
    pub fn next_delay(&self, key: &ResourceKey) -> Duration {
        let mut failures = self.failures();
        let count = failures.entry(key.clone()).or_insert(0);
        let delay = self.limiter.delay_for(*count);
        *count = count.saturating_add(1);
        delay
    }

    /// Reset `key` after a successful reconcile
    pub fn forget(&self, key: &ResourceKey) {
        self.failures().remove(key);
    }

    pub fn num_requeues(&self, key: &ResourceKey) -> u32 {
        self.failures().get(key).copied().unwrap_or(0)
    }
}
