// src/sentiment/remote.rs
//! Text-classification inference server client (the shipped `ClassifierLoader`).
//!
//! Talks to a server exposing:
//! - `GET  /info`    → `{ "model_id": "...", "model_type": { "classifier": { "id2label": {...} } } }`
//! - `POST /predict` ← `{ "inputs": [..], "truncate": true }` → `[[{ "label", "score" }, ..], ..]`
//!
//! Device placement belongs to the server; the resolved device is only logged.

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::model::{ClassifierLoader, Device, TextClassifier};
use super::reconcile::RawScore;

const USER_AGENT: &str = "sentiment-backend/0.1";

pub struct RemoteLoader {
    http: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
}

impl RemoteLoader {
    pub fn new(endpoint: &str, api_token: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_token,
        })
    }
}

#[derive(Deserialize)]
struct InfoResp {
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    model_type: Option<Value>,
}

/// `model_type.classifier.id2label` as string pairs; non-string values are stringified.
fn id2label_from_info(model_type: Option<&Value>) -> Option<Vec<(String, String)>> {
    let table = model_type?
        .get("classifier")?
        .get("id2label")?
        .as_object()?;
    let pairs = table
        .iter()
        .map(|(k, v)| {
            let label = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), label)
        })
        .collect::<Vec<_>>();
    Some(pairs)
}

#[async_trait]
impl ClassifierLoader for RemoteLoader {
    type Classifier = RemoteClassifier;

    async fn load(&self, model_name: &str, device: Device) -> anyhow::Result<RemoteClassifier> {
        let url = format!("{}/info", self.endpoint);
        let mut req = self.http.get(&url);
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }
        let info: InfoResp = req
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .json()
            .await
            .context("decoding /info response")?;

        match info.model_id.as_deref() {
            Some(id) if id != model_name => {
                warn!(configured = model_name, served = id, "inference server serves a different model")
            }
            _ => {}
        }
        debug!(%device, "device placement is managed by the inference server");

        Ok(RemoteClassifier {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            api_token: self.api_token.clone(),
            id2label: id2label_from_info(info.model_type.as_ref()),
        })
    }

    fn accelerator_available(&self) -> bool {
        false
    }
}

pub struct RemoteClassifier {
    http: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
    id2label: Option<Vec<(String, String)>>,
}

#[derive(Serialize)]
struct PredictReq<'a> {
    inputs: &'a [String],
    truncate: bool,
}

#[async_trait]
impl TextClassifier for RemoteClassifier {
    async fn classify(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> anyhow::Result<Vec<Vec<RawScore>>> {
        let url = format!("{}/predict", self.endpoint);
        let mut out = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch_size.max(1)) {
            let mut req = self.http.post(&url).json(&PredictReq {
                inputs: chunk,
                truncate: true,
            });
            if let Some(token) = &self.api_token {
                req = req.bearer_auth(token);
            }
            let batch: Vec<Vec<RawScore>> = req
                .send()
                .await
                .with_context(|| format!("POST {url}"))?
                .error_for_status()
                .with_context(|| format!("POST {url}"))?
                .json()
                .await
                .context("decoding /predict response")?;
            if batch.len() != chunk.len() {
                return Err(anyhow!(
                    "expected {} results, got {}",
                    chunk.len(),
                    batch.len()
                ));
            }
            out.extend(batch);
        }
        Ok(out)
    }

    fn id2label(&self) -> Option<Vec<(String, String)>> {
        self.id2label.clone()
    }
}
