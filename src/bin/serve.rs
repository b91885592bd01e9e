//! Plain tokio entrypoint for local runs outside Shuttle: binds 0.0.0.0:$API_PORT.

use sentiment_backend::{config::Settings, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let settings = Settings::load();
    let port = settings.api_port;
    let app = sentiment_backend::app(settings).await;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
