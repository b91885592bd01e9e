// src/config.rs
//! Process settings (env-derived) and the small core config handed to the sentiment layer.
//!
//! `.env` is loaded by the entrypoints; nothing here reads files at import time.

use std::str::FromStr;
use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

use crate::sentiment::{model::DeviceSpec, Backend};

pub const ENV_SENTIMENT_CONFIG_PATH: &str = "SENTIMENT_CONFIG_PATH";

pub const DEFAULT_MODEL_NAME: &str = "yiyanghkust/finbert-tone";
pub const DEFAULT_MODEL_ENDPOINT: &str = "http://localhost:8080";
pub const DEFAULT_BATCH_SIZE: usize = 16;
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 5000;

/// Core configuration passed by value into service/pipeline constructors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    pub backend: Backend,
    pub model_name: String,
    pub device: DeviceSpec,
    /// Base URL of the text-classification inference server (model backend only).
    pub endpoint: String,
    pub api_token: Option<String>,
    pub batch_size: usize,
    pub max_text_length: usize,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Mock,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            device: DeviceSpec::Auto,
            endpoint: DEFAULT_MODEL_ENDPOINT.to_string(),
            api_token: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
        }
    }
}

impl SentimentConfig {
    /// Load from a TOML file; missing keys keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading sentiment config from {}", path.display()))?;
        let cfg: SentimentConfig = toml::from_str(&data)
            .with_context(|| format!("parsing sentiment config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    fn sanitized(mut self) -> Self {
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        if self.max_text_length == 0 {
            self.max_text_length = DEFAULT_MAX_TEXT_LENGTH;
        }
        self.api_token = self.api_token.filter(|t| !t.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_env: String,
    pub api_port: u16,
    pub cors_allowed_origins: Vec<String>,

    pub requested_sources: Vec<String>,

    pub default_window_hours: u32,
    pub max_upload_rows: usize,

    pub news_api_key: Option<String>,
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub reddit_user_agent: Option<String>,

    /// Derived by `compute_enabled_sources`.
    pub enabled_sources: Vec<String>,

    pub sentiment: SentimentConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Split a comma-separated list: trim, lowercase, drop empty entries.
pub fn split_csv(s: Option<&str>) -> Vec<String> {
    s.map(|s| {
        s.split(',')
            .map(|x| x.trim().to_lowercase())
            .filter(|x| !x.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        None => default,
        Some(v) => match v.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(key, value = %v, "invalid value in environment; using default");
                default
            }
        },
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Build from an arbitrary key lookup (tests inject a map; `from_env` uses the process env).
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut sentiment = match non_empty(get(ENV_SENTIMENT_CONFIG_PATH)) {
            Some(path) => SentimentConfig::load_from_file(&path).unwrap_or_else(|e| {
                warn!(error = ?e, "sentiment config file ignored");
                SentimentConfig::default()
            }),
            None => SentimentConfig::default(),
        };

        if let Some(b) = non_empty(get("SENTIMENT_BACKEND")) {
            match b.parse::<Backend>() {
                Ok(backend) => sentiment.backend = backend,
                Err(_) => warn!(value = %b, "unknown SENTIMENT_BACKEND; keeping {:?}", sentiment.backend),
            }
        }
        if let Some(m) = non_empty(get("MODEL_NAME")) {
            sentiment.model_name = m.trim().to_string();
        }
        if let Some(d) = get("MODEL_DEVICE") {
            sentiment.device = DeviceSpec::parse(&d);
        }
        if let Some(e) = non_empty(get("MODEL_ENDPOINT")) {
            sentiment.endpoint = e.trim().to_string();
        }
        if let Some(t) = non_empty(get("MODEL_API_TOKEN")) {
            sentiment.api_token = Some(t);
        }
        sentiment.batch_size = parse_or(get("BATCH_SIZE"), "BATCH_SIZE", sentiment.batch_size);
        sentiment.max_text_length =
            parse_or(get("MAX_TEXT_LENGTH"), "MAX_TEXT_LENGTH", sentiment.max_text_length);
        let sentiment = sentiment.sanitized();

        Self {
            app_env: non_empty(get("APP_ENV")).unwrap_or_else(|| "development".to_string()),
            api_port: parse_or(get("API_PORT"), "API_PORT", 8000),
            cors_allowed_origins: split_csv(Some(
                get("CORS_ALLOWED_ORIGINS")
                    .as_deref()
                    .unwrap_or("http://localhost:5173"),
            )),
            requested_sources: split_csv(Some(
                get("ENABLE_SOURCES").as_deref().unwrap_or("news,reddit"),
            )),
            default_window_hours: parse_or(get("DEFAULT_WINDOW_HOURS"), "DEFAULT_WINDOW_HOURS", 24),
            max_upload_rows: parse_or(get("MAX_UPLOAD_ROWS"), "MAX_UPLOAD_ROWS", 10_000),
            news_api_key: non_empty(get("NEWS_API_KEY")),
            reddit_client_id: non_empty(get("REDDIT_CLIENT_ID")),
            reddit_client_secret: non_empty(get("REDDIT_CLIENT_SECRET")),
            reddit_user_agent: non_empty(get("REDDIT_USER_AGENT")),
            enabled_sources: Vec::new(),
            sentiment,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Enable each requested source only when its credentials are present.
    pub fn compute_enabled_sources(&mut self) {
        let mut enabled = Vec::new();

        if self.requested_sources.iter().any(|s| s == "news") {
            if self.news_api_key.is_some() {
                enabled.push("news".to_string());
            } else {
                warn!("NEWS source requested but NEWS_API_KEY is missing. Disabling 'news'.");
            }
        }

        if self.requested_sources.iter().any(|s| s == "reddit") {
            if self.reddit_client_id.is_some()
                && self.reddit_client_secret.is_some()
                && self.reddit_user_agent.is_some()
            {
                enabled.push("reddit".to_string());
            } else {
                warn!("REDDIT source requested but credentials are missing. Disabling 'reddit'.");
            }
        }

        self.enabled_sources = enabled;
    }

    /// `from_env` + derived fields + one summary log line.
    pub fn load() -> Self {
        let mut s = Self::from_env();
        s.compute_enabled_sources();
        s.log_summary();
        s
    }

    pub fn log_summary(&self) {
        let sources = if self.enabled_sources.is_empty() {
            "(none)".to_string()
        } else {
            self.enabled_sources.join(",")
        };
        info!(
            "Config loaded | env={} | port={} | sources={} | window={}h | backend={:?}",
            self.app_env, self.api_port, sources, self.default_window_hours, self.sentiment.backend
        );
    }

    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }
}
