// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Diagnostics HTTP endpoint: Prometheus metrics and CPU profiles.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const MAX_PROFILE_SECONDS: u64 = 120;

/// Serve `/metrics` and `/debug/pprof/*` until `stop` is cancelled.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<Registry>,
    stop: CancellationToken,
) -> std::io::Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/debug/pprof", get(pprof_index_handler))
        .route("/debug/pprof/", get(pprof_index_handler))
        .route("/debug/pprof/profile", get(pprof_profile_handler))
        .with_state(registry);

    if let Ok(addr) = listener.local_addr() {
        info!("Diagnostics server listening on {}", addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .await
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    match render_metrics(&registry) {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(err) => {
            error!("Failed to encode metrics: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("encode metrics: {err}").into_bytes(),
            )
        }
    }
}

fn render_metrics(registry: &Registry) -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}

async fn pprof_index_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        "profile endpoints:\n/debug/pprof/profile?seconds=N (CPU flamegraph, default 30s)\n",
    )
}

#[derive(Deserialize)]
struct ProfileParams {
    #[serde(default = "default_profile_seconds")]
    seconds: u64,
}

fn default_profile_seconds() -> u64 {
    30
}

async fn pprof_profile_handler(Query(params): Query<ProfileParams>) -> impl IntoResponse {
    let duration = Duration::from_secs(params.seconds.min(MAX_PROFILE_SECONDS));
    match cpu_profile(duration).await {
        Ok(svg) => (
            StatusCode::OK,
            [("content-type", "image/svg+xml")],
            svg,
        )
            .into_response(),
        Err(err) => {
            error!("CPU profile failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("profile failed: {err}").into_bytes(),
            )
                .into_response()
        }
    }
}

/// Sample the process for `duration` and render a flamegraph SVG.
async fn cpu_profile(duration: Duration) -> Result<Vec<u8>, pprof::Error> {
    let guard = pprof::ProfilerGuardBuilder::default()
        .frequency(99)
        .build()?;
    tokio::time::sleep(duration).await;

    let report = guard.report().build()?;
    let mut body = Vec::new();
    report.flamegraph(&mut body)?;
    Ok(body)
}
