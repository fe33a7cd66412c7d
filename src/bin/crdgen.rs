// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use chart_controller::types::{BusinessChartGroup, Chart, ChartGroup};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        serde_yaml::to_string(&ChartGroup::crd())?,
        serde_yaml::to_string(&Chart::crd())?,
        serde_yaml::to_string(&BusinessChartGroup::crd())?,
    ];
    println!("{}", crds.join("---\n"));
    Ok(())
}
