// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Backends holding chart package bytes.
//!
//! The controllers only ever delete content, so the traits expose nothing
//! else. A missing object is reported as [`StorageError::NotFound`] so cascade
//! steps can treat it as already removed.

pub mod local;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::Error;

pub use local::LocalObjectStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object {0} not found")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::Storage(e.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Blob store addressed by slash separated paths
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn delete_object(&self, path: &str) -> StorageResult<()>;
}

/// Third-party chart registry that owns package storage itself
#[async_trait]
pub trait ChartRegistry: Send + Sync {
    async fn delete_chart(&self, project: &str, name: &str) -> StorageResult<()>;
}

/// Path of a packaged chart version: `{tenant}/{group}/{name}-{version}`
pub fn package_path(tenant: &str, group: &str, name: &str, version: &str) -> String {
    format!("{}/{}/{}-{}", tenant, group, name, version)
}

/// Path of the provenance file uploaded next to a package
pub fn provenance_path(tenant: &str, group: &str, name: &str, version: &str) -> String {
    format!("{}.prov", package_path(tenant, group, name, version))
}
