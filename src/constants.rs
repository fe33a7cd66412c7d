// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// API group served by the chart registry CRDs
pub const API_GROUP: &str = "charts.geeko.me";

/// The operator name used as field manager on writes
pub const OPERATOR_NAME: &str = "chart-controller";

/// Finalizer tokens owned by this operator, one per controlled kind
pub mod finalizers {
    /// Blocks removal of a ChartGroup until its charts and business mirrors are gone
    pub const CHART_GROUP: &str = "charts.geeko.me/chartgroup-controller";
    /// Blocks removal of a Chart until its package blobs are gone
    pub const CHART: &str = "charts.geeko.me/chart-controller";
}

/// Status reasons written by the controllers
pub mod reasons {
    pub const SYNC_FAILED: &str = "SyncBusinessGroupFailed";
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
