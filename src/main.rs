// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::{Api, Client};
use kube_runtime::watcher;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chart_controller::config::Config;
use chart_controller::constants::finalizers;
use chart_controller::engine::{Controller, ControllerSettings, RateLimiter};
use chart_controller::kubernetes::{wait_for_crds, KubeIndex, KubeStore};
use chart_controller::reconcilers::{group_of, ChartGroupHandler, ChartHandler};
use chart_controller::storage::local::LocalObjectStorage;
use chart_controller::types::{BusinessChartGroup, Chart, ChartGroup};

fn settings(config: &Config, token: &str) -> ControllerSettings {
    ControllerSettings {
        finalizer_token: token.to_string(),
        delete_when_done: config.delete_when_done,
        enqueue_delay: config.enqueue_delay,
        health_interval: config.health_interval,
        rate_limiter: RateLimiter::new(config.rate_limit_base, config.rate_limit_max),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting chart controller");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: workers={}, storage_root={}",
        config.workers,
        config.storage_root.display()
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for chart CRDs to become available...");
    wait_for_crds(&client).await?;

    let limiter = RateLimiter::new(config.rate_limit_base, config.rate_limit_max);
    let groups = Arc::new(
        KubeStore::<ChartGroup>::cluster(client.clone()).with_rate_limiter(limiter.clone()),
    );
    let charts = Arc::new(
        KubeStore::<Chart>::namespaced(client.clone()).with_rate_limiter(limiter.clone()),
    );
    let business = Arc::new(
        KubeStore::<BusinessChartGroup>::namespaced(client.clone()).with_rate_limiter(limiter),
    );

    // Chart changes also requeue the owning group so its chartCount stays current
    let group_runtime = kube_runtime::Controller::new(
        Api::<ChartGroup>::all(client.clone()),
        watcher::Config::default(),
    )
    .watches(
        Api::<Chart>::all(client.clone()),
        watcher::Config::default(),
        group_of,
    );
    let chart_runtime =
        kube_runtime::Controller::new(Api::<Chart>::all(client), watcher::Config::default());
    let group_index = Arc::new(KubeIndex::new(group_runtime.store()));
    let chart_index = Arc::new(KubeIndex::new(chart_runtime.store()));

    let group_controller = Controller::new(
        groups.clone(),
        group_index,
        ChartGroupHandler::new(business, charts.clone(), chart_index.clone()),
        settings(&config, finalizers::CHART_GROUP),
    );
    let storage = Arc::new(LocalObjectStorage::new(config.storage_root.clone()));
    let chart_controller = Controller::new(
        charts,
        chart_index,
        ChartHandler::new(groups, storage),
        settings(&config, finalizers::CHART),
    );

    let (stop_tx, stop) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            // Keep running until the controllers end on their own
            stop_tx.closed().await;
            return;
        }
        info!("Shutdown signal received");
        stop_tx.send_replace(true);
    });

    info!("Starting controllers...");

    tokio::join!(
        group_controller.run(group_runtime, config.workers, stop.clone()),
        chart_controller.run(chart_runtime, config.workers, stop)
    );

    info!("Chart controller stopped");
    Ok(())
}
