// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Chart handler: keeps the version count current and removes package
//! content from storage when a chart is deleted.

use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::{ContentDeleter, KindHandler};
use crate::error::{Error, Result};
use crate::reconcilers::compat;
use crate::storage::{self, ChartRegistry, ObjectStorage, StorageError};
use crate::store::ResourceStore;
use crate::types::chart::Chart;
use crate::types::chart_group::ChartGroup;
use crate::types::key::ResourceKey;

pub struct ChartHandler {
    groups: Arc<dyn ResourceStore<ChartGroup>>,
    storage: Arc<dyn ObjectStorage>,
    registry: Option<Arc<dyn ChartRegistry>>,
}

impl ChartHandler {
    pub fn new(groups: Arc<dyn ResourceStore<ChartGroup>>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            groups,
            storage,
            registry: None,
        }
    }

    /// Delete packages through an external chart registry instead of object storage
    pub fn with_registry(mut self, registry: Arc<dyn ChartRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }
}

#[async_trait]
impl KindHandler<Chart> for ChartHandler {
    fn normalize(&self, chart: &Chart) -> Option<Chart> {
        compat::normalize_chart(chart)
    }

    fn refresh_status(&self, chart: &mut Chart) {
        if let Some(status) = chart.status.as_mut() {
            status.version_count = status.versions.len() as u32;
        }
    }

    /// Orphaned charts are reported, the group's finalizer removes them
    async fn check_health(&self, chart: &Chart) -> Result<()> {
        let group = chart.group_name();
        match self.groups.get(&ResourceKey::cluster(&group)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                warn!(chart = %chart.name_any(), %group, "Chart belongs to a missing chart group");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn cascade(&self) -> Vec<Arc<dyn ContentDeleter<Chart>>> {
        vec![Arc::new(DeletePackages {
            storage: self.storage.clone(),
            registry: self.registry.clone(),
        })]
    }
}

struct DeletePackages {
    storage: Arc<dyn ObjectStorage>,
    registry: Option<Arc<dyn ChartRegistry>>,
}

impl DeletePackages {
    async fn delete_blob(&self, path: &str) -> Result<()> {
        match self.storage.delete_object(path).await {
            Ok(()) => {
                debug!(path, "Deleted chart blob");
                Ok(())
            }
            Err(StorageError::NotFound(_)) => {
                debug!(path, "Chart blob already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ContentDeleter<Chart> for DeletePackages {
    fn name(&self) -> &'static str {
        "packages"
    }

    async fn delete(&self, chart: &Chart) -> Result<()> {
        let name = chart.name_any();
        let group = chart.group_name();

        if let Some(registry) = &self.registry {
            return match registry.delete_chart(&group, &name).await {
                Ok(()) => {
                    info!(%group, chart = %name, "Deleted chart from registry");
                    Ok(())
                }
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        let tenant = &chart.spec.tenant_id;
        let mut errors = Vec::new();
        for version in chart.versions() {
            let package = storage::package_path(tenant, &group, &name, &version.version);
            if let Err(e) = self.delete_blob(&package).await {
                errors.push(e);
            }
            if version.provenance {
                let provenance = storage::provenance_path(tenant, &group, &name, &version.version);
                if let Err(e) = self.delete_blob(&provenance).await {
                    errors.push(e);
                }
            }
        }
        if errors.is_empty() {
            info!(%group, chart = %name, versions = chart.versions().len(), "Deleted chart packages");
        }
        Error::aggregate(errors)
    }
}
