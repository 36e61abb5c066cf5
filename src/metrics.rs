use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and register series descriptions.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        describe();
        Ok(Self { handle })
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

fn describe() {
    describe_counter!("relay_runs_total", "Pipeline runs by terminal outcome.");
    describe_counter!(
        "relay_attempts_total",
        "Collection attempts by source and outcome."
    );
    describe_counter!("relay_retries_total", "Fallback retries taken.");
    describe_counter!(
        "relay_route_fallback_total",
        "Routes resolved to the default source."
    );
    describe_counter!(
        "relay_collector_errors_total",
        "Collector fetch/parse errors."
    );
    describe_counter!(
        "relay_synthesis_errors_total",
        "Synthesis failures after a successful collection."
    );
    describe_histogram!("relay_collect_ms", "Collector fetch time in milliseconds.");
}
