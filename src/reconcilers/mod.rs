// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kind handlers plugged into the generic controller.

pub mod chart;
pub mod chart_group;
pub mod compat;

pub use chart::ChartHandler;
pub use chart_group::{group_of, ChartGroupHandler};
