// src/sentiment/mod.rs
//! Sentiment service abstraction: a `{warmup, predict}` capability with two variants
//! (deterministic mock, model-backed) chosen once from configuration.

pub mod labels;
pub mod mock;
pub mod model;
pub mod reconcile;
pub mod remote;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::SentimentConfig;
use crate::error::Result;

pub use labels::{map_label, Id2Label, Label, MappedLabel, LABELS};
pub use mock::MockSentimentService;
pub use model::{ClassifierLoader, Device, DeviceSpec, ModelSentimentService, TextClassifier};
pub use reconcile::{reconcile, RawScore, SentimentOutput};
pub use remote::{RemoteClassifier, RemoteLoader};

#[async_trait]
pub trait SentimentService: Send + Sync {
    /// Variant name for logs, metrics and `/health`.
    fn name(&self) -> &'static str;

    /// Best-effort priming. Failures are logged, never returned.
    async fn warmup(&self);

    /// Same length and order as `texts`; empty input returns empty output without
    /// touching the underlying model. `batch_size` is a hint, 0 is treated as 1.
    async fn predict(&self, texts: &[String], batch_size: usize) -> Result<Vec<SentimentOutput>>;
}

pub type DynSentimentService = Arc<dyn SentimentService>;

/// Which variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Mock,
    Model,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "model" => Ok(Backend::Model),
            other => Err(format!("unknown sentiment backend: {other}")),
        }
    }
}

/// Build and warm up the configured service.
/// `None` means the model variant could not be loaded (callers report "unavailable").
pub async fn build_service(cfg: &SentimentConfig) -> Option<DynSentimentService> {
    match cfg.backend {
        Backend::Mock => {
            let svc = MockSentimentService::new();
            svc.warmup().await;
            let svc: DynSentimentService = Arc::new(svc);
            Some(svc)
        }
        Backend::Model => match RemoteLoader::new(&cfg.endpoint, cfg.api_token.clone()) {
            Ok(loader) => build_model_service(cfg, &loader).await,
            Err(e) => {
                error!(error = ?e, "sentiment backend client could not be created; service unavailable");
                None
            }
        },
    }
}

/// Model variant with an explicit loader.
pub async fn build_model_service<L: ClassifierLoader>(
    cfg: &SentimentConfig,
    loader: &L,
) -> Option<DynSentimentService> {
    match ModelSentimentService::load(loader, &cfg.model_name, &cfg.device).await {
        Ok(svc) => {
            svc.warmup().await;
            info!(model = %cfg.model_name, device = %svc.device(), "sentiment service ready");
            let svc: DynSentimentService = Arc::new(svc);
            Some(svc)
        }
        Err(e) => {
            error!(error = ?e, model = %cfg.model_name, "sentiment model failed to load; service unavailable");
            None
        }
    }
}
