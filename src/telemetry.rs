// src/telemetry.rs
//! Metric names for collection runs and Prometheus recorder setup.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const REMOTE_ITEMS_TOTAL: &str = "collect_remote_items_total";
pub const KEPT_TOTAL: &str = "collect_kept_total";
pub const DROPPED_TOTAL: &str = "collect_dropped_total";
pub const SCOPE_ERRORS_TOTAL: &str = "collect_scope_errors_total";
pub const REMOTE_MS: &str = "collect_remote_ms";
pub const LAST_RUN_TS: &str = "collect_last_run_ts";

/// One-time metrics registration (so series show up on scrape).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(REMOTE_ITEMS_TOTAL, "Items returned by remote calls.");
        describe_counter!(KEPT_TOTAL, "Items returned to callers after filtering and ranking.");
        describe_counter!(
            DROPPED_TOTAL,
            "Items dropped client-side, labelled by reason."
        );
        describe_counter!(SCOPE_ERRORS_TOTAL, "Failed remote calls per scope.");
        describe_histogram!(REMOTE_MS, "Remote call latency in milliseconds.");
        describe_gauge!(LAST_RUN_TS, "Unix ts when a collection last finished.");
    });
}

/// Install a Prometheus recorder for this process and return its handle.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
    ensure_metrics_described();
    Ok(handle)
}
