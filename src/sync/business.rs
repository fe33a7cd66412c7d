// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Mirrors ChartGroup project membership into business chart group entries.

use kube::ResourceExt;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::store::ResourceStore;
use crate::types::business::BusinessChartGroup;
use crate::types::chart_group::ChartGroup;

/// Membership change between two reconciliations
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ProjectDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Set difference of two membership lists. Order and duplicates are ignored;
/// the result is sorted.
pub fn diff_projects(previous: &[String], current: &[String]) -> ProjectDiff {
    let previous: BTreeSet<&String> = previous.iter().collect();
    let current: BTreeSet<&String> = current.iter().collect();

    ProjectDiff {
        added: current.difference(&previous).map(|p| p.to_string()).collect(),
        removed: previous.difference(&current).map(|p| p.to_string()).collect(),
    }
}

/// Apply the membership change of `group` since `previous` to the business system.
///
/// Existing entries for added projects and missing entries for removed ones
/// are already converged. Every other failure is collected and returned as
/// one aggregate once all projects have been attempted.
#[instrument(skip(store, group, previous), fields(group = %group.name_any()))]
pub async fn sync_business_groups(
    store: &dyn ResourceStore<BusinessChartGroup>,
    group: &ChartGroup,
    previous: &[String],
) -> Result<()> {
    let diff = diff_projects(previous, &group.spec.projects);
    if diff.is_empty() {
        return Ok(());
    }
    info!(added = ?diff.added, removed = ?diff.removed, "Syncing business chart groups");
    apply_diff(store, group, &diff).await
}

/// Recreate the mirror of every project `group` lists and drop the ones only
/// `previous` lists. Used after a failed pass, when the diff alone cannot say
/// which mirrors made it.
#[instrument(skip(store, group, previous), fields(group = %group.name_any()))]
pub async fn resync_business_groups(
    store: &dyn ResourceStore<BusinessChartGroup>,
    group: &ChartGroup,
    previous: &[String],
) -> Result<()> {
    let diff = ProjectDiff {
        added: diff_projects(&[], &group.spec.projects).added,
        removed: diff_projects(previous, &group.spec.projects).removed,
    };
    info!(projects = ?diff.added, removed = ?diff.removed, "Resyncing business chart groups");
    apply_diff(store, group, &diff).await
}

async fn apply_diff(
    store: &dyn ResourceStore<BusinessChartGroup>,
    group: &ChartGroup,
    diff: &ProjectDiff,
) -> Result<()> {
    let mut errors = Vec::new();
    for project in &diff.added {
        if let Err(e) = create_mirror(store, group, project).await {
            errors.push(e);
        }
    }
    for project in &diff.removed {
        if let Err(e) = delete_mirror(store, &group.name_any(), project).await {
            errors.push(e);
        }
    }
    Error::aggregate(errors)
}

/// Remove the mirror of `group` from every project it lists
pub async fn delete_business_groups(
    store: &dyn ResourceStore<BusinessChartGroup>,
    group: &ChartGroup,
) -> Result<()> {
    let name = group.name_any();
    let mut errors = Vec::new();
    for project in &group.spec.projects {
        if let Err(e) = delete_mirror(store, &name, project).await {
            errors.push(e);
        }
    }
    Error::aggregate(errors)
}

/// Projects listed by `group` whose mirror entry is missing
pub async fn missing_mirrors(
    store: &dyn ResourceStore<BusinessChartGroup>,
    group: &ChartGroup,
) -> Result<Vec<String>> {
    let name = group.name_any();
    let mut missing = Vec::new();
    for project in &group.spec.projects {
        match store.get(&BusinessChartGroup::key_for(project, &name)).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => missing.push(project.clone()),
            Err(e) => return Err(e),
        }
    }
    Ok(missing)
}

async fn create_mirror(
    store: &dyn ResourceStore<BusinessChartGroup>,
    group: &ChartGroup,
    project: &str,
) -> Result<()> {
    match store.create(&BusinessChartGroup::mirror_of(group, project)).await {
        Ok(_) => {
            info!(project, "Created business chart group");
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            debug!(project, "Business chart group already exists");
            Ok(())
        }
        Err(e) => {
            warn!(project, error = %e, "Failed to create business chart group");
            Err(e)
        }
    }
}

async fn delete_mirror(
    store: &dyn ResourceStore<BusinessChartGroup>,
    group: &str,
    project: &str,
) -> Result<()> {
    match store
        .delete(&BusinessChartGroup::key_for(project, group), None)
        .await
    {
        Ok(()) => {
            info!(project, "Deleted business chart group");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!(project, "Business chart group already gone");
            Ok(())
        }
        Err(e) => {
            warn!(project, error = %e, "Failed to delete business chart group");
            Err(e)
        }
    }
}
