// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

use crate::types::phase::{Phase, PhaseEvent};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: String },

    #[error("{kind} {key} was modified concurrently")]
    Conflict { kind: String, key: String },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: String, key: String },

    #[error("{kind} {key} changed identity during retry: expected uid {expected}, found {actual}")]
    IdentityChanged {
        kind: String,
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Illegal phase transition from {from} on {event:?}")]
    IllegalTransition { from: Phase, event: PhaseEvent },

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Local index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Invalid resource key: {0}")]
    InvalidKey(String),

    #[error("{}", format_aggregate(.0))]
    Aggregate(Vec<Error>),
}

fn format_aggregate(errors: &[Error]) -> String {
    match errors {
        [single] => single.to_string(),
        _ => format!(
            "[{}]",
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

impl Error {
    fn api_code(&self) -> Option<(u16, &str)> {
        match self {
            Error::Kube(kube::Error::Api(resp)) => Some((resp.code, resp.reason.as_str())),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. }) || matches!(self.api_code(), Some((404, _)))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
            || matches!(self.api_code(), Some((409, reason)) if reason != "AlreadyExists")
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
            || matches!(self.api_code(), Some((409, "AlreadyExists")))
    }

    /// Collapse a list of errors into `Ok` when empty, or one aggregate error otherwise.
    pub fn aggregate(errors: Vec<Error>) -> Result<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Aggregate(errors))
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
