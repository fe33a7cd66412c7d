// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes-backed stores, reflector indexes, and CRD discovery.

pub mod client;
pub mod crd;
pub mod informer;

pub use client::{KubeObject, KubeStore};
pub use crd::wait_for_crds;
pub use informer::KubeIndex;
