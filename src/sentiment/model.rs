// src/sentiment/model.rs
//! Model-backed sentiment service.
//!
//! The model itself is an external collaborator behind two small contracts:
//! `ClassifierLoader` (load a named model onto a device) and `TextClassifier`
//! (texts in, raw label/score lists out). Everything the classifier emits goes through
//! `map_label` + `reconcile` before it leaves this module.

use std::fmt;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::labels::Id2Label;
use super::reconcile::{reconcile, RawScore, SentimentOutput};
use super::SentimentService;
use crate::error::{Error, Result};

const WARMUP_TEXT: &str = "warmup text for the sentiment model";

/// Resolved execution device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Accelerator(u32),
}

impl Device {
    /// Conventional integer form: -1 for CPU, accelerator index otherwise.
    pub fn index(self) -> i64 {
        match self {
            Device::Cpu => -1,
            Device::Accelerator(n) => i64::from(n),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Accelerator(n) => write!(f, "cuda:{n}"),
        }
    }
}

/// Device side-input as configured, before auto-detection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawDevice")]
pub enum DeviceSpec {
    #[default]
    Auto,
    Cpu,
    /// Negative indices mean CPU.
    Index(i64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDevice {
    Int(i64),
    Text(String),
}

impl From<RawDevice> for DeviceSpec {
    fn from(raw: RawDevice) -> Self {
        match raw {
            RawDevice::Int(n) => DeviceSpec::Index(n),
            RawDevice::Text(s) => DeviceSpec::parse(&s),
        }
    }
}

impl DeviceSpec {
    /// `""`/`auto` → Auto, `cpu`/`-1` → CPU, `cuda` → 0, `cuda:N` → N (malformed → 0),
    /// numeric → that index, anything else → CPU.
    pub fn parse(raw: &str) -> Self {
        let d = raw.trim().to_lowercase();
        match d.as_str() {
            "" | "auto" => return DeviceSpec::Auto,
            "cpu" | "-1" => return DeviceSpec::Cpu,
            _ => {}
        }
        if d.starts_with("cuda") {
            let idx = d
                .split(':')
                .nth(1)
                .and_then(|p| p.trim().parse::<i64>().ok())
                .unwrap_or(0);
            return DeviceSpec::Index(idx);
        }
        d.parse::<i64>().map(DeviceSpec::Index).unwrap_or(DeviceSpec::Cpu)
    }

    pub fn resolve(&self, accelerator_available: impl FnOnce() -> bool) -> Device {
        match self {
            DeviceSpec::Auto => {
                if accelerator_available() {
                    Device::Accelerator(0)
                } else {
                    Device::Cpu
                }
            }
            DeviceSpec::Cpu => Device::Cpu,
            DeviceSpec::Index(n) if *n < 0 => Device::Cpu,
            DeviceSpec::Index(n) => Device::Accelerator(u32::try_from(*n).unwrap_or(0)),
        }
    }
}

/// Default accelerator check: `CUDA_VISIBLE_DEVICES` set to something other than empty/-1.
pub fn cuda_visible() -> bool {
    std::env::var("CUDA_VISIBLE_DEVICES")
        .map(|v| {
            let v = v.trim();
            !v.is_empty() && v != "-1"
        })
        .unwrap_or(false)
}

/// Raw text-classification capability.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// One raw label/score list per input text, same order.
    async fn classify(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> anyhow::Result<Vec<Vec<RawScore>>>;

    /// Raw index → label table from the model configuration, if it has one.
    fn id2label(&self) -> Option<Vec<(String, String)>> {
        None
    }
}

/// Loads a `TextClassifier` for a model name on a resolved device.
#[async_trait]
pub trait ClassifierLoader: Send + Sync {
    type Classifier: TextClassifier + 'static;

    async fn load(&self, model_name: &str, device: Device) -> anyhow::Result<Self::Classifier>;

    fn accelerator_available(&self) -> bool {
        cuda_visible()
    }
}

pub struct ModelSentimentService<C> {
    classifier: C,
    id2label: Id2Label,
    model_name: String,
    device: Device,
}

impl<C: TextClassifier> ModelSentimentService<C> {
    pub fn new(classifier: C, model_name: impl Into<String>, device: Device) -> Self {
        let id2label = classifier
            .id2label()
            .map(Id2Label::from_config)
            .unwrap_or_default();
        Self {
            classifier,
            id2label,
            model_name: model_name.into(),
            device,
        }
    }

    /// Resolve the device once, then load the classifier through `loader`.
    pub async fn load<L>(loader: &L, model_name: &str, device: &DeviceSpec) -> anyhow::Result<Self>
    where
        L: ClassifierLoader<Classifier = C>,
    {
        let device = device.resolve(|| loader.accelerator_available());
        info!(model = model_name, %device, "Loading sentiment model...");
        let classifier = loader
            .load(model_name, device)
            .await
            .with_context(|| format!("loading model '{model_name}' on {device}"))?;
        let svc = Self::new(classifier, model_name, device);
        info!(
            model = model_name,
            id2label = svc.id2label.len(),
            "Sentiment model ready"
        );
        Ok(svc)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn id2label(&self) -> &Id2Label {
        &self.id2label
    }
}

#[async_trait]
impl<C: TextClassifier> SentimentService for ModelSentimentService<C> {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn warmup(&self) {
        let sample = vec![WARMUP_TEXT.to_string()];
        match self.predict(&sample, 1).await {
            Ok(_) => info!(model = %self.model_name, "ModelSentimentService warmup completed"),
            Err(e) => warn!(model = %self.model_name, error = %e, "ModelSentimentService warmup failed"),
        }
    }

    async fn predict(&self, texts: &[String], batch_size: usize) -> Result<Vec<SentimentOutput>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();

        let raw = self
            .classifier
            .classify(texts, batch_size.max(1))
            .await
            .map_err(|e| {
                warn!(model = %self.model_name, error = ?e, "classifier call failed");
                counter!("inference_failures_total", "service" => self.name()).increment(1);
                Error::Inference
            })?;

        if raw.len() != texts.len() {
            warn!(
                model = %self.model_name,
                expected = texts.len(),
                got = raw.len(),
                "classifier returned a mismatched number of results"
            );
            counter!("inference_failures_total", "service" => self.name()).increment(1);
            return Err(Error::Inference);
        }

        let out = raw
            .iter()
            .map(|scores| reconcile(scores, Some(&self.id2label)))
            .collect();

        counter!("inference_texts_total", "service" => self.name()).increment(texts.len() as u64);
        histogram!("inference_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_spec_variants() {
        assert_eq!(DeviceSpec::parse("cpu"), DeviceSpec::Cpu);
        assert_eq!(DeviceSpec::parse("-1"), DeviceSpec::Cpu);
        assert_eq!(DeviceSpec::parse(" AUTO "), DeviceSpec::Auto);
        assert_eq!(DeviceSpec::parse(""), DeviceSpec::Auto);
        assert_eq!(DeviceSpec::parse("cuda"), DeviceSpec::Index(0));
        assert_eq!(DeviceSpec::parse("cuda:1"), DeviceSpec::Index(1));
        assert_eq!(DeviceSpec::parse("cuda:bad"), DeviceSpec::Index(0));
        assert_eq!(DeviceSpec::parse("0"), DeviceSpec::Index(0));
        assert_eq!(DeviceSpec::parse("notanumber"), DeviceSpec::Cpu);
    }

    #[test]
    fn resolve_checks_accelerator_only_for_auto() {
        assert_eq!(DeviceSpec::Auto.resolve(|| true), Device::Accelerator(0));
        assert_eq!(DeviceSpec::Auto.resolve(|| false), Device::Cpu);
        assert_eq!(
            DeviceSpec::Index(2).resolve(|| panic!("accelerator check must not run")),
            Device::Accelerator(2)
        );
        assert_eq!(DeviceSpec::Index(-5).resolve(|| true), Device::Cpu);
        assert_eq!(Device::Cpu.index(), -1);
        assert_eq!(Device::Accelerator(3).to_string(), "cuda:3");
    }

    #[test]
    fn device_spec_deserializes_from_int_or_text() {
        let a: DeviceSpec = serde_json::from_str("2").unwrap();
        let b: DeviceSpec = serde_json::from_str("\"cuda:3\"").unwrap();
        assert_eq!(a, DeviceSpec::Index(2));
        assert_eq!(b, DeviceSpec::Index(3));
    }
}
