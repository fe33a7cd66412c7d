// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ChartGroup handler: mirrors project membership into the business system
//! and tears down charts and mirrors on deletion.

use async_trait::async_trait;
use kube::ResourceExt;
use kube_runtime::reflector::ObjectRef;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::reasons;
use crate::engine::{ContentDeleter, KindHandler};
use crate::error::{Error, Result};
use crate::reconcilers::compat;
use crate::store::{ListSelector, ObjectIndex, ResourceStore};
use crate::sync;
use crate::types::business::BusinessChartGroup;
use crate::types::chart::Chart;
use crate::types::chart_group::ChartGroup;
use crate::types::key::ResourceKey;
use crate::types::phase::Phase;
use crate::types::resource::ManagedResource;

/// The group owning `chart`: charts live in the namespace named after their group.
/// Lets chart changes refresh the group's `chartCount`.
pub fn group_of(chart: Chart) -> Option<ObjectRef<ChartGroup>> {
    chart.namespace().map(|group| ObjectRef::new(&group))
}

pub struct ChartGroupHandler {
    business: Arc<dyn ResourceStore<BusinessChartGroup>>,
    charts: Arc<dyn ResourceStore<Chart>>,
    chart_index: Arc<dyn ObjectIndex<Chart>>,
}

impl ChartGroupHandler {
    pub fn new(
        business: Arc<dyn ResourceStore<BusinessChartGroup>>,
        charts: Arc<dyn ResourceStore<Chart>>,
        chart_index: Arc<dyn ObjectIndex<Chart>>,
    ) -> Self {
        Self {
            business,
            charts,
            chart_index,
        }
    }
}

#[async_trait]
impl KindHandler<ChartGroup> for ChartGroupHandler {
    const SYNC_FAILED_REASON: &'static str = reasons::SYNC_FAILED;

    fn normalize(&self, group: &ChartGroup) -> Option<ChartGroup> {
        compat::normalize_group(group)
    }

    async fn sync(&self, group: &ChartGroup, previous: Option<&ChartGroup>) -> Result<()> {
        let previous = previous
            .map(|p| p.spec.projects.as_slice())
            .unwrap_or_default();
        if group.phase() == Phase::Failed {
            return sync::resync_business_groups(self.business.as_ref(), group, previous).await;
        }
        sync::sync_business_groups(self.business.as_ref(), group, previous).await
    }

    /// Keep the projects of both passes: either may still have a mirror
    fn failed_baseline(&self, attempted: &ChartGroup, previous: Option<&ChartGroup>) -> ChartGroup {
        let mut baseline = attempted.clone();
        for project in previous.iter().flat_map(|p| &p.spec.projects) {
            if !baseline.spec.projects.contains(project) {
                baseline.spec.projects.push(project.clone());
            }
        }
        baseline
    }

    fn refresh_status(&self, group: &mut ChartGroup) {
        let count = self
            .chart_index
            .list(&ListSelector::in_namespace(group.name_any()))
            .len();
        if let Some(status) = group.status.as_mut() {
            status.chart_count = count as u32;
        }
    }

    /// Missing mirrors are reported only: they may have been removed on purpose
    async fn check_health(&self, group: &ChartGroup) -> Result<()> {
        let missing = sync::missing_mirrors(self.business.as_ref(), group).await?;
        if !missing.is_empty() {
            warn!(
                group = %group.name_any(),
                projects = ?missing,
                "Business chart groups missing for projects"
            );
        }
        Ok(())
    }

    fn cascade(&self) -> Vec<Arc<dyn ContentDeleter<ChartGroup>>> {
        vec![
            Arc::new(DeleteBusinessGroups {
                store: self.business.clone(),
            }),
            Arc::new(DeleteCharts {
                store: self.charts.clone(),
            }),
        ]
    }
}

struct DeleteBusinessGroups {
    store: Arc<dyn ResourceStore<BusinessChartGroup>>,
}

#[async_trait]
impl ContentDeleter<ChartGroup> for DeleteBusinessGroups {
    fn name(&self) -> &'static str {
        "business-chart-groups"
    }

    async fn delete(&self, group: &ChartGroup) -> Result<()> {
        sync::delete_business_groups(self.store.as_ref(), group).await
    }
}

/// Deletes every chart in the group; each chart runs its own finalizer
struct DeleteCharts {
    store: Arc<dyn ResourceStore<Chart>>,
}

#[async_trait]
impl ContentDeleter<ChartGroup> for DeleteCharts {
    fn name(&self) -> &'static str {
        "charts"
    }

    async fn delete(&self, group: &ChartGroup) -> Result<()> {
        let name = group.name_any();
        let charts = self.store.list(&ListSelector::in_namespace(&name)).await?;

        let mut errors = Vec::new();
        for chart in charts {
            if chart.metadata.deletion_timestamp.is_some() {
                continue;
            }
            let key = ResourceKey::namespaced(&name, chart.name_any());
            match self.store.delete(&key, None).await {
                Ok(()) => info!(chart = %key, "Deleted chart of removed group"),
                Err(e) if e.is_not_found() => debug!(chart = %key, "Chart already gone"),
                Err(e) => errors.push(e),
            }
        }
        Error::aggregate(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Controller, ControllerSettings};
    use crate::test_utils::{make_chart, make_group, FakeStore, Fault, Op};
    use crate::types::chart_group::{GroupType, Visibility};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use std::time::Duration;

    const TOKEN: &str = "charts.geeko.me/chartgroup-controller";

    struct Fixture {
        groups: Arc<FakeStore<ChartGroup>>,
        business: Arc<FakeStore<BusinessChartGroup>>,
        charts: Arc<FakeStore<Chart>>,
        controller: Controller<ChartGroup, ChartGroupHandler>,
    }

    fn fixture() -> Fixture {
        let groups = Arc::new(FakeStore::new());
        let business = Arc::new(FakeStore::new());
        let charts = Arc::new(FakeStore::new());
        let mut settings = ControllerSettings::new(TOKEN);
        settings.enqueue_delay = Duration::ZERO;
        settings.delete_when_done = true;

        let controller = Controller::new(
            groups.clone(),
            groups.clone(),
            ChartGroupHandler::new(business.clone(), charts.clone(), charts.clone()),
            settings,
        );
        Fixture {
            groups,
            business,
            charts,
            controller,
        }
    }

    fn key() -> ResourceKey {
        ResourceKey::cluster("library")
    }

    fn set_projects(store: &FakeStore<ChartGroup>, projects: &[&str]) {
        let mut group = store.object(&key()).unwrap();
        group.spec.projects = projects.iter().map(|p| p.to_string()).collect();
        store.insert(group);
    }

    #[tokio::test]
    async fn test_new_group_creates_mirror_and_becomes_available() {
        let f = fixture();
        let mut group = make_group("library", "uid-1");
        group.spec.projects = vec!["p1".to_string()];
        f.groups.insert(group);

        f.controller.sync_item(&key()).await.unwrap();

        assert!(f
            .business
            .object(&BusinessChartGroup::key_for("p1", "library"))
            .is_some());
        assert_eq!(f.groups.object(&key()).unwrap().phase(), Phase::Available);
    }

    #[tokio::test]
    async fn test_membership_edit_moves_mirror() {
        let f = fixture();
        let mut group = make_group("library", "uid-1");
        group.spec.projects = vec!["p1".to_string()];
        f.groups.insert(group);
        f.controller.sync_item(&key()).await.unwrap();
        // The status write re-triggers a reconcile of the Available group
        f.controller.sync_item(&key()).await.unwrap();

        set_projects(&f.groups, &["p2"]);
        f.controller.sync_item(&key()).await.unwrap();

        assert!(f
            .business
            .object(&BusinessChartGroup::key_for("p1", "library"))
            .is_none());
        assert!(f
            .business
            .object(&BusinessChartGroup::key_for("p2", "library"))
            .is_some());
        assert_eq!(f.groups.object(&key()).unwrap().phase(), Phase::Available);
    }

    #[tokio::test]
    async fn test_business_failure_marks_group_failed() {
        let f = fixture();
        let mut group = make_group("library", "uid-1");
        group.spec.projects = vec!["p1".to_string()];
        f.groups.insert(group);
        f.business.inject(Op::Create, Fault::Unavailable);

        f.controller.sync_item(&key()).await.unwrap();

        let state = f.groups.object(&key()).unwrap().status.unwrap().state;
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.reason.as_deref(), Some(reasons::SYNC_FAILED));
    }

    #[tokio::test]
    async fn test_failed_group_does_not_orphan_mirrors() {
        let f = fixture();
        let mut group = make_group("library", "uid-1");
        group.spec.projects = vec!["p1".to_string()];
        f.groups.insert(group);
        f.controller.sync_item(&key()).await.unwrap();
        f.controller.sync_item(&key()).await.unwrap();

        set_projects(&f.groups, &["p1", "p2"]);
        f.business.inject(Op::Create, Fault::Unavailable);
        f.controller.sync_item(&key()).await.unwrap();
        assert_eq!(f.groups.object(&key()).unwrap().phase(), Phase::Failed);

        set_projects(&f.groups, &["p2"]);
        f.controller.sync_item(&key()).await.unwrap();

        assert!(f
            .business
            .object(&BusinessChartGroup::key_for("p1", "library"))
            .is_none());
        assert!(f
            .business
            .object(&BusinessChartGroup::key_for("p2", "library"))
            .is_some());
        assert_eq!(f.groups.object(&key()).unwrap().phase(), Phase::Available);
    }

    #[tokio::test]
    async fn test_failed_delete_is_retried_after_recovery() {
        let f = fixture();
        let mut group = make_group("library", "uid-1");
        group.spec.projects = vec!["p1".to_string(), "p2".to_string()];
        f.groups.insert(group);
        f.controller.sync_item(&key()).await.unwrap();
        f.controller.sync_item(&key()).await.unwrap();

        set_projects(&f.groups, &["p2"]);
        f.business.inject(Op::Delete, Fault::Unavailable);
        f.controller.sync_item(&key()).await.unwrap();
        assert_eq!(f.groups.object(&key()).unwrap().phase(), Phase::Failed);

        f.controller.sync_item(&key()).await.unwrap();

        assert!(f
            .business
            .object(&BusinessChartGroup::key_for("p1", "library"))
            .is_none());
        assert_eq!(f.groups.object(&key()).unwrap().phase(), Phase::Available);
    }

    #[test]
    fn test_chart_maps_to_its_group() {
        let owner = group_of(make_chart("library", "nginx", "uid-1")).unwrap();
        assert_eq!(owner, ObjectRef::new("library"));
    }

    #[tokio::test]
    async fn test_legacy_personal_group_is_rewritten_first() {
        let f = fixture();
        let mut group = make_group("alice", "uid-1");
        group.spec.group_type = GroupType::LegacyPersonal;
        group.spec.visibility = Visibility::Private;
        group.spec.projects = vec!["p1".to_string()];
        f.groups.insert(group);
        let key = ResourceKey::cluster("alice");

        f.controller.sync_item(&key).await.unwrap();

        let stored = f.groups.object(&key).unwrap();
        assert_eq!(stored.spec.group_type, GroupType::SelfBuilt);
        assert_eq!(stored.spec.visibility, Visibility::User);
        assert_eq!(stored.spec.users, vec!["alice".to_string()]);
        assert_eq!(stored.spec.creator.as_deref(), Some("alice"));
        // Normalization is persisted on its own; the phase moves on the next pass
        assert_eq!(stored.phase(), Phase::Pending);
        assert_eq!(f.groups.count(Op::Update), 1);
        assert_eq!(f.groups.count(Op::UpdateStatus), 0);
        assert!(f.business.objects().is_empty());
    }

    #[tokio::test]
    async fn test_chart_count_follows_index() {
        let f = fixture();
        f.groups.insert(make_group("library", "uid-1"));
        f.charts.insert(make_chart("library", "nginx", "uid-2"));
        f.charts.insert(make_chart("library", "redis", "uid-3"));
        f.charts.insert(make_chart("other", "nginx", "uid-4"));

        f.controller.sync_item(&key()).await.unwrap();

        let status = f.groups.object(&key()).unwrap().status.unwrap();
        assert_eq!(status.chart_count, 2);
    }

    #[tokio::test]
    async fn test_deleted_group_cascades_to_mirrors_and_charts() {
        let f = fixture();
        let mut group = make_group("library", "uid-1");
        group.spec.projects = vec!["p1".to_string(), "p2".to_string()];
        group.spec.finalizers = vec![TOKEN.to_string()];
        group.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        f.business.insert(BusinessChartGroup::mirror_of(&group, "p1"));
        f.groups.insert(group);
        f.charts.insert(make_chart("library", "nginx", "uid-2"));
        f.charts.insert(make_chart("other", "nginx", "uid-3"));

        f.controller.sync_item(&key()).await.unwrap();

        assert!(f.business.objects().is_empty());
        assert!(f
            .charts
            .object(&ResourceKey::namespaced("library", "nginx"))
            .is_none());
        assert!(f
            .charts
            .object(&ResourceKey::namespaced("other", "nginx"))
            .is_some());
        assert_eq!(f.groups.deleted_uids(), vec![Some("uid-1".to_string())]);
    }

    #[tokio::test]
    async fn test_failed_chart_delete_keeps_group_finalizer() {
        let f = fixture();
        let mut group = make_group("library", "uid-1");
        group.spec.finalizers = vec![TOKEN.to_string()];
        group.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        f.groups.insert(group);
        f.charts.insert(make_chart("library", "nginx", "uid-2"));
        f.charts.inject(Op::Delete, Fault::Unavailable);

        assert!(f.controller.sync_item(&key()).await.is_err());

        let stored = f.groups.object(&key()).unwrap();
        assert_eq!(stored.phase(), Phase::Terminating);
        assert_eq!(stored.spec.finalizers, vec![TOKEN.to_string()]);

        // The retry re-runs the cascade and completes
        f.controller.sync_item(&key()).await.unwrap();
        assert!(f.groups.object(&key()).is_none());
    }

    #[tokio::test]
    async fn test_health_check_reports_without_repairing() {
        let f = fixture();
        let business = f.business.clone();
        let handler = ChartGroupHandler::new(business.clone(), f.charts.clone(), f.charts.clone());
        let mut group = make_group("library", "uid-1");
        group.spec.projects = vec!["p1".to_string()];

        handler.check_health(&group).await.unwrap();

        assert_eq!(business.count(Op::Create), 0);
        assert_eq!(business.count(Op::Get), 1);
    }
}
