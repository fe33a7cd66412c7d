// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ChartGroup CRD: a chart repository namespace owned by a tenant.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::phase::{HasPhase, PhaseState};
use crate::types::resource::ManagedResource;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "charts.geeko.me",
    version = "v1alpha1",
    kind = "ChartGroup",
    plural = "chartgroups",
    shortname = "cg",
    status = "ChartGroupStatus",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Charts","type":"integer","jsonPath":".status.chartCount"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ChartGroupSpec {
    #[serde(default)]
    pub tenant_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(rename = "type", default)]
    pub group_type: GroupType,

    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    /// Users granted access when visibility is `User`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,

    /// Projects whose business chart groups mirror this group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

/// Kind of chart group.
///
/// The lower-case variants are written by older API versions and are
/// rewritten by the controller before anything else happens.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum GroupType {
    /// Created by a user for their own charts
    #[default]
    SelfBuilt,
    /// Shared by every member of a tenant
    Tenant,
    /// Platform-provided charts
    System,
    #[serde(rename = "personal")]
    LegacyPersonal,
    #[serde(rename = "tenant")]
    LegacyTenant,
    #[serde(rename = "system")]
    LegacySystem,
}

impl GroupType {
    pub fn is_legacy(self) -> bool {
        matches!(
            self,
            GroupType::LegacyPersonal | GroupType::LegacyTenant | GroupType::LegacySystem
        )
    }

    /// Current value a legacy variant maps to
    pub fn current(self) -> GroupType {
        match self {
            GroupType::LegacyPersonal => GroupType::SelfBuilt,
            GroupType::LegacyTenant => GroupType::Tenant,
            GroupType::LegacySystem => GroupType::System,
            other => other,
        }
    }
}

/// Who can see a chart group or chart
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Public,
    Private,
    /// Visible to members of the owning tenant
    Tenant,
    /// Visible to the users listed in the spec
    User,
    #[serde(rename = "public")]
    LegacyPublic,
    #[serde(rename = "private")]
    LegacyPrivate,
}

impl Visibility {
    pub fn is_legacy(self) -> bool {
        matches!(self, Visibility::LegacyPublic | Visibility::LegacyPrivate)
    }

    pub fn current(self) -> Visibility {
        match self {
            Visibility::LegacyPublic => Visibility::Public,
            Visibility::LegacyPrivate => Visibility::Private,
            other => other,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartGroupStatus {
    #[serde(flatten)]
    pub state: PhaseState,

    #[serde(default)]
    pub chart_count: u32,
}

impl HasPhase for ChartGroupStatus {
    fn phase_state(&self) -> &PhaseState {
        &self.state
    }

    fn phase_state_mut(&mut self) -> &mut PhaseState {
        &mut self.state
    }
}

impl ManagedResource for ChartGroup {
    const KIND: &'static str = "ChartGroup";

    type Status = ChartGroupStatus;

    fn status(&self) -> Option<&ChartGroupStatus> {
        self.status.as_ref()
    }

    fn status_mut(&mut self) -> &mut Option<ChartGroupStatus> {
        &mut self.status
    }

    fn spec_finalizers(&self) -> &[String] {
        &self.spec.finalizers
    }

    fn spec_finalizers_mut(&mut self) -> &mut Vec<String> {
        &mut self.spec.finalizers
    }
}
