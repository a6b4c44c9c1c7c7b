// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const COMMITS_TOTAL: &str = "cosign_commits_total";
pub const FLOW_FAILURES_TOTAL: &str = "cosign_flow_failures_total";
pub const QUARANTINES_TOTAL: &str = "cosign_quarantines_total";
pub const HOSPITAL_ADMISSIONS_TOTAL: &str = "cosign_hospital_admissions_total";
pub const COMMIT_DURATION_SECONDS: &str = "cosign_commit_duration_seconds";
pub const TRACKED_RECORDS_TOTAL: &str = "cosign_tracked_records_total";

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Logs
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cosign_node=debug,cosign_persistence=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Metrics (Prometheus)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::error!("Failed to install Prometheus recorder: {}", e),
    }

    metrics::describe_counter!(COMMITS_TOTAL, "Commit flows that reached finality");
    metrics::describe_counter!(FLOW_FAILURES_TOTAL, "Flows that ended in a terminal error");
    metrics::describe_counter!(QUARANTINES_TOTAL, "One-time injected faults raised by the tracker");
    metrics::describe_counter!(HOSPITAL_ADMISSIONS_TOTAL, "Flow re-runs from a checkpoint after a quarantine");
    metrics::describe_histogram!(COMMIT_DURATION_SECONDS, "Time from commit start to counterparty finality");
    metrics::describe_counter!(TRACKED_RECORDS_TOTAL, "Record versions appended to the track log");

    metrics::gauge!("cosign_node_up", 1.0);
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
