// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod document;
pub mod error;
pub mod metrics;
pub mod preprocess;
pub mod sentiment;
pub mod telemetry;

use axum::Router;
use tracing::warn;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::Settings;
pub use crate::document::Document;
pub use crate::error::{Error, Result};
pub use crate::preprocess::{default_pipeline, Payload, Pipeline};
pub use crate::sentiment::{SentimentOutput, SentimentService};

/// Full in-process app: configured sentiment service, API routes and `/metrics`.
///
/// A missing service is not fatal; the API answers 503 for prediction routes instead.
pub async fn app(settings: Settings) -> Router {
    // Recorder goes in before warmup so its predict call is counted.
    let metrics = match crate::metrics::Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = ?e, "prometheus recorder not installed; /metrics disabled");
            None
        }
    };

    let service = crate::sentiment::build_service(&settings.sentiment).await;
    if service.is_none() {
        warn!("starting without a sentiment service; /predict and /analyze will answer 503");
    }

    let router = create_router(AppState::new(settings, service));
    match metrics {
        Some(m) => router.merge(m.router()),
        None => router,
    }
}
