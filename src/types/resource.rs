// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::{Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

use crate::types::key::ResourceKey;
use crate::types::phase::{HasPhase, Phase, PhaseState};

/// A kind driven by the generic controller.
///
/// Finalizer tokens are recorded twice: in the spec list, which decides when
/// the content is fully torn down, and in `metadata.finalizers`, which keeps
/// the API server from removing the object before that.
pub trait ManagedResource:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: &'static str;

    type Status: HasPhase + Clone + Debug + Default + PartialEq + Send + Sync;

    fn status(&self) -> Option<&Self::Status>;
    fn status_mut(&mut self) -> &mut Option<Self::Status>;
    fn spec_finalizers(&self) -> &[String];
    fn spec_finalizers_mut(&mut self) -> &mut Vec<String>;

    fn key(&self) -> ResourceKey {
        ResourceKey::of(self)
    }

    fn phase(&self) -> Phase {
        self.status()
            .map(|s| s.phase_state().phase)
            .unwrap_or_default()
    }

    fn phase_state_mut(&mut self) -> &mut PhaseState {
        self.status_mut()
            .get_or_insert_with(Default::default)
            .phase_state_mut()
    }

    fn uid_str(&self) -> Option<&str> {
        self.meta().uid.as_deref()
    }

    fn is_deleting(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    /// Whether `token` is still present in either finalizer list
    fn holds_finalizer(&self, token: &str) -> bool {
        self.spec_finalizers().iter().any(|f| f == token)
            || self.finalizers().iter().any(|f| f == token)
    }

    /// No finalizer tokens remain: every controller finished its cleanup
    fn finalized(&self) -> bool {
        self.spec_finalizers().is_empty()
    }
}
