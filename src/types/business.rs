// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! BusinessChartGroup CRD: the project-management system's view of a chart
//! group. One entry exists per (project, group) pair; the entry lives in the
//! project's namespace and carries the group's name.

use kube::{api::ObjectMeta, CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::OPERATOR_NAME;
use crate::types::chart_group::ChartGroup;
use crate::types::key::ResourceKey;

/// Label linking a mirror entry back to its ChartGroup
pub const GROUP_LABEL: &str = "charts.geeko.me/group";

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(
    group = "charts.geeko.me",
    version = "v1alpha1",
    kind = "BusinessChartGroup",
    plural = "businesschartgroups",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct BusinessChartGroupSpec {
    pub group: String,
    pub project: String,
    #[serde(default)]
    pub tenant_id: String,
}

impl BusinessChartGroup {
    /// Key of the mirror entry for `group` in `project`
    pub fn key_for(project: &str, group: &str) -> ResourceKey {
        ResourceKey::namespaced(project, group)
    }

    /// Build the mirror entry of `group` for `project`
    pub fn mirror_of(group: &ChartGroup, project: &str) -> Self {
        let name = group.name_any();
        BusinessChartGroup {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(project.to_string()),
                labels: Some(BTreeMap::from([
                    (GROUP_LABEL.to_string(), name.clone()),
                    (
                        "app.kubernetes.io/managed-by".to_string(),
                        OPERATOR_NAME.to_string(),
                    ),
                ])),
                ..Default::default()
            },
            spec: BusinessChartGroupSpec {
                group: name,
                project: project.to_string(),
                tenant_id: group.spec.tenant_id.clone(),
            },
        }
    }
}
