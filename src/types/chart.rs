// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Chart CRD: a package inside a ChartGroup. The chart's namespace is the
//! name of the owning group.

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::chart_group::Visibility;
use crate::types::phase::{HasPhase, PhaseState};
use crate::types::resource::ManagedResource;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "charts.geeko.me",
    version = "v1alpha1",
    kind = "Chart",
    plural = "charts",
    namespaced,
    status = "ChartStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Versions","type":"integer","jsonPath":".status.versionCount"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    #[serde(default)]
    pub tenant_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

/// A published version of a chart
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartVersion {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// A provenance file was uploaded alongside the package
    #[serde(default)]
    pub provenance: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartStatus {
    #[serde(flatten)]
    pub state: PhaseState,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<ChartVersion>,

    #[serde(default)]
    pub version_count: u32,
}

impl HasPhase for ChartStatus {
    fn phase_state(&self) -> &PhaseState {
        &self.state
    }

    fn phase_state_mut(&mut self) -> &mut PhaseState {
        &mut self.state
    }
}

impl Chart {
    /// Name of the ChartGroup this chart belongs to
    pub fn group_name(&self) -> String {
        self.namespace().unwrap_or_default()
    }

    pub fn versions(&self) -> &[ChartVersion] {
        self.status
            .as_ref()
            .map(|s| s.versions.as_slice())
            .unwrap_or_default()
    }
}

impl ManagedResource for Chart {
    const KIND: &'static str = "Chart";

    type Status = ChartStatus;

    fn status(&self) -> Option<&ChartStatus> {
        self.status.as_ref()
    }

    fn status_mut(&mut self) -> &mut Option<ChartStatus> {
        &mut self.status
    }

    fn spec_finalizers(&self) -> &[String] {
        &self.spec.finalizers
    }

    fn spec_finalizers_mut(&mut self) -> &mut Vec<String> {
        &mut self.spec.finalizers
    }
}
