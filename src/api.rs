use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::analyze::{analyze_payloads, AnalysisReport};
use crate::config::Settings;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::preprocess::{default_pipeline, Payload};
use crate::sentiment::{DynSentimentService, SentimentOutput};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// `None` when the configured service could not be built.
    pub service: Option<DynSentimentService>,
}

impl AppState {
    pub fn new(settings: Settings, service: Option<DynSentimentService>) -> Self {
        Self {
            settings: Arc::new(settings),
            service,
        }
    }

    fn service(&self) -> Result<&DynSentimentService> {
        self.service.as_ref().ok_or(Error::ServiceUnavailable)
    }

    fn check_rows(&self, n: usize) -> Result<()> {
        let max = self.settings.max_upload_rows;
        if n > max {
            return Err(Error::TooManyRows { max });
        }
        Ok(())
    }

    fn batch_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.settings.sentiment.batch_size)
            .max(1)
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.cors_allowed_origins);
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/analyze", post(analyze))
        .layer(cors)
        .with_state(state)
}

/// Reflect only the configured origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

#[derive(Serialize)]
struct HealthResp {
    status: &'static str,
    env: String,
    enabled_sources: Vec<String>,
    default_window_hours: u32,
    service: Option<&'static str>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResp> {
    Json(HealthResp {
        status: "ok",
        env: state.settings.app_env.clone(),
        enabled_sources: state.settings.enabled_sources.clone(),
        default_window_hours: state.settings.default_window_hours,
        service: state.service.as_ref().map(|s| s.name()),
    })
}

#[derive(Deserialize)]
struct PredictReq {
    texts: Vec<String>,
    #[serde(default)]
    batch_size: Option<usize>,
}

async fn predict(
    State(state): State<AppState>,
    Json(body): Json<PredictReq>,
) -> Result<Json<Vec<SentimentOutput>>> {
    let svc = state.service()?;
    state.check_rows(body.texts.len())?;
    let out = svc
        .predict(&body.texts, state.batch_size(body.batch_size))
        .await?;
    Ok(Json(out))
}

#[derive(Deserialize)]
struct AnalyzeReq {
    documents: Vec<Value>,
    /// Adapter tag (e.g. "upload") applied to every object in `documents`.
    #[serde(default)]
    adapter: Option<String>,
    #[serde(default)]
    batch_size: Option<usize>,
}

fn to_payloads(items: Vec<Value>, adapter: Option<&str>) -> Result<Vec<Payload>> {
    let Some(adapter) = adapter else {
        return Ok(items.into_iter().map(Payload::from).collect());
    };
    items
        .into_iter()
        .map(|v| match v {
            Value::Object(map) => Document::from_adapter(adapter, &map).map(Payload::from),
            other => Ok(Payload::Raw(other)),
        })
        .collect()
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeReq>,
) -> Result<Json<AnalysisReport>> {
    let svc = state.service()?;
    state.check_rows(body.documents.len())?;

    let payloads = to_payloads(body.documents, body.adapter.as_deref())?;
    // fresh pipeline per request: dedup is scoped to this batch
    let pipeline = default_pipeline(state.settings.sentiment.max_text_length);
    let report = analyze_payloads(
        pipeline,
        &**svc,
        payloads,
        state.batch_size(body.batch_size),
    )
    .await?;

    info!(
        kept = report.results.len(),
        dropped = report.dropped,
        service = svc.name(),
        "analyze batch done"
    );
    Ok(Json(report))
}
