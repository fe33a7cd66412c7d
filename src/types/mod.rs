// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource types managed by the chart controllers.

pub mod business;
pub mod chart;
pub mod chart_group;
pub mod key;
pub mod phase;
pub mod resource;

pub use business::BusinessChartGroup;
pub use chart::{Chart, ChartSpec, ChartStatus, ChartVersion};
pub use chart_group::{ChartGroup, ChartGroupSpec, ChartGroupStatus, GroupType, Visibility};
pub use key::ResourceKey;
pub use phase::{HasPhase, Phase, PhaseEvent, PhaseState};
pub use resource::ManagedResource;
