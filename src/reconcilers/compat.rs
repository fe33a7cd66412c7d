// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rewrites enum values written by older API versions.

use kube::ResourceExt;

use crate::types::chart::Chart;
use crate::types::chart_group::{ChartGroup, GroupType, Visibility};

/// Normalized copy of `group`, or `None` if it carries no legacy values.
///
/// A legacy personal group becomes a `SelfBuilt` group created by a user of
/// the same name. If it was private, it becomes visible to that user only.
pub fn normalize_group(group: &ChartGroup) -> Option<ChartGroup> {
    let spec = &group.spec;
    if !spec.group_type.is_legacy() && !spec.visibility.is_legacy() {
        return None;
    }

    let mut next = group.clone();
    if spec.group_type == GroupType::LegacyPersonal {
        let name = group.name_any();
        next.spec.creator = Some(name.clone());
        if spec.visibility.current() == Visibility::Private {
            next.spec.visibility = Visibility::User;
            next.spec.users = vec![name];
        }
    }
    next.spec.group_type = next.spec.group_type.current();
    next.spec.visibility = next.spec.visibility.current();
    Some(next)
}

pub fn normalize_chart(chart: &Chart) -> Option<Chart> {
    if !chart.spec.visibility.is_legacy() {
        return None;
    }
    let mut next = chart.clone();
    next.spec.visibility = next.spec.visibility.current();
    Some(next)
}
