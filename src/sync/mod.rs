// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cross-system synchronization of chart group membership.

pub mod business;

pub use business::{
    delete_business_groups, diff_projects, missing_mirrors, resync_business_groups,
    sync_business_groups, ProjectDiff,
};
