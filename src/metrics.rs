use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Register HELP text for every series with the currently installed recorder.
fn describe_all() {
    describe_counter!(
        "preprocess_documents_total",
        "Documents entering the preprocessing pipeline."
    );
    describe_counter!(
        "preprocess_dropped_total",
        "Documents dropped by a pipeline step (label: step)."
    );
    describe_counter!(
        "inference_texts_total",
        "Texts classified (label: service)."
    );
    describe_counter!(
        "inference_failures_total",
        "Failed classifier calls (label: service)."
    );
    describe_histogram!(
        "inference_duration_ms",
        "Model-backed predict latency in milliseconds."
    );
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe all series on it.
    /// Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        describe_all();
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
