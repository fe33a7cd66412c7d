// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle phase shared by every controlled kind.
//!
//! ```text
//! Pending ──Synced──▶ Available ──SyncFailed──▶ Failed
//!    │                   ▲  │                     │
//!    └──SyncFailed──▶ Failed ◀───────Synced───────┘
//!
//! any ──DeletionRequested──▶ Terminating (absorbing)
//! ```

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Phase of a ChartGroup or Chart
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Accepted, waiting for the controller to synchronize it
    #[default]
    Pending,
    /// Synchronized and under health verification
    Available,
    /// Synchronization failed; recovered on the next change
    Failed,
    /// Scheduled for removal, content is being torn down
    Terminating,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Pending => "Pending",
            Phase::Available => "Available",
            Phase::Failed => "Failed",
            Phase::Terminating => "Terminating",
        };
        f.write_str(s)
    }
}

/// What the controller observed that should move the phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Synchronization with collaborators succeeded
    Synced,
    /// Synchronization with collaborators failed
    SyncFailed,
    /// The store marked the object for deletion
    DeletionRequested,
}

impl Phase {
    /// Transition table. Terminating only accepts further deletion requests.
    pub fn transition(self, event: PhaseEvent) -> Result<Phase> {
        match (self, event) {
            (_, PhaseEvent::DeletionRequested) => Ok(Phase::Terminating),
            (Phase::Terminating, event) => Err(Error::IllegalTransition { from: self, event }),
            (_, PhaseEvent::Synced) => Ok(Phase::Available),
            (_, PhaseEvent::SyncFailed) => Ok(Phase::Failed),
        }
    }
}

/// Phase bookkeeping embedded in every status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseState {
    #[serde(default)]
    pub phase: Phase,

    /// Machine readable cause of the current phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human readable detail of the current phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl PhaseState {
    /// Apply an event, recording reason and message.
    ///
    /// The transition time only moves when the phase actually changes, so
    /// re-applying the same event leaves the state deep-equal.
    pub fn apply(
        &mut self,
        event: PhaseEvent,
        reason: Option<String>,
        message: Option<String>,
    ) -> Result<()> {
        let next = self.phase.transition(event)?;
        if next != self.phase {
            self.last_transition_time = Some(Utc::now());
        }
        self.phase = next;
        self.reason = reason;
        self.message = message;
        Ok(())
    }
}

/// Status types that carry a [`PhaseState`]
pub trait HasPhase {
    fn phase_state(&self) -> &PhaseState;
    fn phase_state_mut(&mut self) -> &mut PhaseState;
}
