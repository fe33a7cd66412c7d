// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Concurrent reconciles per controlled kind
    pub workers: usize,
    /// Grace delay between a change notification and its reconcile
    pub enqueue_delay: Duration,
    /// Interval of the per-resource health verification loop
    pub health_interval: Duration,
    /// Delete the object once all finalizer tokens are gone
    pub delete_when_done: bool,
    /// Root directory of the chart package blob store
    pub storage_root: PathBuf,
    /// First retry delay of the per-key rate limiter
    pub rate_limit_base: Duration,
    /// Upper bound of the per-key rate limiter
    pub rate_limit_max: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 2,
            enqueue_delay: Duration::from_millis(500),
            health_interval: Duration::from_secs(60),
            delete_when_done: false,
            storage_root: PathBuf::from("/var/lib/charts"),
            rate_limit_base: Duration::from_millis(5),
            rate_limit_max: Duration::from_secs(1000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let storage_root = env::var("STORAGE_ROOT")
            .context("STORAGE_ROOT environment variable not set")?
            .into();

        Ok(Config {
            workers: parse_var("WORKERS", defaults.workers)?,
            enqueue_delay: Duration::from_millis(parse_var(
                "ENQUEUE_DELAY_MS",
                defaults.enqueue_delay.as_millis() as u64,
            )?),
            health_interval: Duration::from_secs(parse_var(
                "HEALTH_INTERVAL_SECS",
                defaults.health_interval.as_secs(),
            )?),
            delete_when_done: parse_var("DELETE_WHEN_DONE", defaults.delete_when_done)?,
            storage_root,
            rate_limit_base: Duration::from_millis(parse_var(
                "RATE_LIMIT_BASE_MS",
                defaults.rate_limit_base.as_millis() as u64,
            )?),
            rate_limit_max: Duration::from_secs(parse_var(
                "RATE_LIMIT_MAX_SECS",
                defaults.rate_limit_max.as_secs(),
            )?),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value '{}' for {}", raw, name)),
        Err(_) => Ok(default),
    }
}
