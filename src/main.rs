//! Sentiment backend: Shuttle entrypoint.
//! Loads settings, builds the configured sentiment service and serves the Axum router.

use sentiment_backend::{config::Settings, telemetry};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let router = sentiment_backend::app(Settings::load()).await;
    Ok(router.into())
}
