// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use clap::Parser;
use prometheus::Registry;
use std::process;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use eatr::config::Config;
use eatr::controller::{Controller, Reconciler};
use eatr::ecr::{EcrApi, EcrClient};
use eatr::kubernetes::{build_client, watch_namespaces, ApiServerClient, KubernetesApi};
use eatr::metrics::Metrics;
use eatr::server;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_filter()))
        .init();

    let grace_period = config.shutdown_grace_period;
    if let Err(err) = run(config).await {
        error!("Fatal: {:#}", err);
        process::exit(2);
    }

    info!(
        "Allowing {} to shut down",
        humantime::format_duration(grace_period)
    );
    tokio::time::sleep(grace_period).await;
    info!("Done");
}

async fn run(config: Config) -> Result<()> {
    config.validate()?;
    info!("Starting eatr");

    info!("Starting listener on port {}", config.port);
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("bind diagnostics listener on port {}", config.port))?;

    let client = build_client(&config.config_file_path)
        .await
        .context("create Kubernetes client")?;
    info!("Connected to Kubernetes cluster");

    let registry = Arc::new(Registry::new());
    let metrics = Metrics::register(&registry).context("register metrics")?;

    let stop = CancellationToken::new();

    let kube: Arc<dyn KubernetesApi> = Arc::new(ApiServerClient::new(client.clone()));
    let ecr: Arc<dyn EcrApi> = Arc::new(EcrClient::new());
    let events = watch_namespaces(client, config.informers_resync_interval, stop.clone());

    let reconciler = Reconciler::new(config, kube, ecr, metrics);
    let controller = Controller::new(reconciler, events);

    info!("Starting diagnostics server");
    let server_stop = stop.clone();
    tokio::spawn(async move {
        if let Err(err) = server::serve(listener, registry, server_stop).await {
            error!("Diagnostics server failed: {}", err);
        }
    });

    info!("Starting controller");
    let controller_task = tokio::spawn(controller.run(stop.clone()));

    wait_for_signal().await?;
    info!("Received termination signal, shutting down");
    stop.cancel();

    let _ = controller_task.await;
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    let mut term = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    let mut int = signal(SignalKind::interrupt()).context("install SIGINT handler")?;

    tokio::select! {
        _ = term.recv() => {}
        _ = int.recv() => {}
    }
    Ok(())
}
