//! HTTP client for Rasa's `/model/parse` endpoint
//!
//! [`RasaClient`] is async; [`RasaIntentClassifier`] wraps it with a private
//! current-thread runtime so the coverage engine can call it synchronously.

use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use crate::config::RasaConfig;
use crate::error::{Error, Result};

use super::classifier::{IntentClassifier, IntentPrediction};

/// Request body for POST /model/parse
#[derive(Serialize)]
struct ParseRequest<'a> {
    text: &'a str,
}

/// Convert fractional seconds from config into a `Duration`.
pub fn secs_to_duration(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Config(format!("invalid timeout {}: {}", secs, e)))
}

/// Async client for a Rasa NLU server
pub struct RasaClient {
    http_client: reqwest::Client,
    parse_url: Url,
}

impl RasaClient {
    /// Create a client for the given `/model/parse` URL
    pub fn new(parse_url: &str, timeout: Duration) -> Result<Self> {
        let parse_url = Url::parse(parse_url)
            .map_err(|e| Error::Config(format!("invalid Rasa parse URL {:?}: {}", parse_url, e)))?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            parse_url,
        })
    }

    pub fn parse_url(&self) -> &str {
        self.parse_url.as_str()
    }

    /// Parse `text` and return the predicted intent
    pub async fn parse(&self, text: &str) -> Result<IntentPrediction> {
        let response = self
            .http_client
            .post(self.parse_url.clone())
            .json(&ParseRequest { text })
            .send()
            .await
            .map_err(|e| Error::Classifier(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Classifier(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::Classifier(format!("failed to parse response: {}", e)))?;

        Ok(prediction_from_payload(&payload))
    }

    /// Check that the server answers on its root endpoint
    pub async fn preflight(&self, timeout: Duration) -> Result<()> {
        let mut root = self.parse_url.clone();
        root.set_path("/");
        root.set_query(None);

        let response = self
            .http_client
            .get(root)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::Classifier(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Classifier(format!("preflight returned {}", status)))
        }
    }
}

/// Read `intent.name` and `intent.confidence` from a parse response.
///
/// Anything unexpected degrades to a fallback with no confidence.
pub fn prediction_from_payload(payload: &Value) -> IntentPrediction {
    let Some(intent) = payload.get("intent").filter(|v| v.is_object()) else {
        return IntentPrediction::fallback();
    };

    let name = intent
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string);

    let confidence = match intent.get("confidence") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    IntentPrediction::from_parts(name, confidence)
}

/// Blocking [`IntentClassifier`] backed by [`RasaClient`]
pub struct RasaIntentClassifier {
    inner: RasaClient,
    runtime: tokio::runtime::Runtime,
}

impl RasaIntentClassifier {
    pub fn new(parse_url: &str, timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Classifier(format!("failed to create runtime: {}", e)))?;

        Ok(Self {
            inner: RasaClient::new(parse_url, timeout)?,
            runtime,
        })
    }

    /// Build from the `[rasa]` config section
    pub fn from_config(config: &RasaConfig) -> Result<Self> {
        Self::new(&config.parse_url, secs_to_duration(config.timeout_secs)?)
    }

    pub fn parse_url(&self) -> &str {
        self.inner.parse_url()
    }

    /// Connectivity check (blocking)
    pub fn preflight(&self, timeout: Duration) -> Result<()> {
        self.runtime.block_on(self.inner.preflight(timeout))
    }
}

impl IntentClassifier for RasaIntentClassifier {
    fn classify(&self, text: &str) -> Result<IntentPrediction> {
        self.runtime.block_on(self.inner.parse(text))
    }
}
