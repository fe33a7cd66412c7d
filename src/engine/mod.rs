// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Generic reconciliation engine shared by the ChartGroup and Chart controllers.

pub mod backoff;
pub mod cache;
pub mod controller;
pub mod finalizer;
pub mod health;
pub mod retry;

pub use backoff::{Backoff, RateLimiter};
pub use cache::ResourceCache;
pub use controller::{Controller, ControllerSettings, KindHandler};
pub use finalizer::{ContentDeleter, Finalizer};
pub use health::HealthRegistry;
