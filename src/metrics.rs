// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and register the series names.
    pub fn init() -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        ensure_metrics_described();

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watch_cycles_total", "Completed watcher cycles.");
        describe_counter!("watch_cycle_errors_total", "Watcher cycles aborted by a feed failure.");
        describe_counter!("index_cycles_total", "Completed indexer cycles.");
        describe_counter!("index_cycle_errors_total", "Indexer cycles aborted by a feed failure.");
        describe_counter!(
            "cycle_ticks_skipped_total",
            "Timer fires skipped because the previous run was still in flight."
        );
        describe_counter!("transitions_detected_total", "Raw rising edges seen by the detector.");
        describe_counter!(
            "transitions_filtered_total",
            "Transitions dropped by the project-type predicate."
        );
        describe_counter!("verify_confirmed_total", "Transitions the pipeline confirmed.");
        describe_counter!("verify_rejected_total", "Transitions refuted as false positives.");
        describe_counter!("alerts_dispatched_total", "Alerts handed to the notifier mux.");
        describe_counter!("alert_dispatch_errors_total", "Failed alert dispatches.");
        describe_counter!("store_errors_total", "Resource store write/flush failures.");
        describe_gauge!("watch_last_run_ts", "Unix ts of the last completed watcher cycle.");
        describe_gauge!("index_last_run_ts", "Unix ts of the last completed indexer cycle.");
        describe_gauge!("store_resources", "Resources currently tracked in the store.");
    });
}
