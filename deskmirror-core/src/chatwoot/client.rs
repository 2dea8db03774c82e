//! HTTP client for the Chatwoot application API
//!
//! All endpoints live under `/api/v1/accounts/{account_id}` and authenticate
//! with the `api_access_token` header.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::config::ChatwootConfig;
use crate::error::{Error, Result};

/// Longest error body kept in a [`ConnectionStatus`]
const STATUS_ERROR_CHARS: usize = 200;

/// Result of probing the account endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub ok: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl ConnectionStatus {
    /// Status for a check that could not run at all
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            status_code: None,
            error: Some(error.into()),
        }
    }
}

/// Synchronous view of the helpdesk API used by the sync pipelines
pub trait HelpdeskApi {
    fn account_details(&self) -> Result<Value>;

    fn list_inboxes(&self) -> Result<Value>;

    fn list_conversations(&self, page: u32, per_page: Option<u32>) -> Result<Value>;

    fn list_conversation_messages(
        &self,
        conversation_id: i64,
        page: u32,
        per_page: Option<u32>,
    ) -> Result<Value>;

    /// Never fails; problems are reported in the status
    fn check_connection(&self) -> ConnectionStatus;
}

/// Async HTTP client for Chatwoot
pub struct ChatwootClient {
    http_client: reqwest::Client,
    account_url: String,
    max_retries: usize,
}

impl ChatwootClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: &ChatwootConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| Error::Config("chatwoot.base_url is required".to_string()))?
            .trim_end_matches('/');
        let account_id = config
            .account_id
            .as_deref()
            .ok_or_else(|| Error::Config("chatwoot.account_id is required".to_string()))?
            .trim();
        let token = config
            .api_token
            .as_deref()
            .ok_or_else(|| Error::Config("chatwoot.api_token is required".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            "api_access_token",
            HeaderValue::from_str(token)
                .map_err(|e| Error::Config(format!("invalid api_token: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            account_url: format!("{}/api/v1/accounts/{}", base_url, account_id),
            max_retries: config.max_retries,
        })
    }

    /// GET /api/v1/accounts/{id}
    pub async fn account_details(&self) -> Result<Value> {
        self.get_json_with_retry(&self.account_url, &[]).await
    }

    /// GET .../inboxes
    pub async fn list_inboxes(&self) -> Result<Value> {
        let url = format!("{}/inboxes", self.account_url);
        self.get_json_with_retry(&url, &[]).await
    }

    /// GET .../conversations for every status
    pub async fn list_conversations(&self, page: u32, per_page: Option<u32>) -> Result<Value> {
        let url = format!("{}/conversations", self.account_url);
        let mut query = vec![("page", page.to_string()), ("status", "all".to_string())];
        if let Some(per_page) = per_page.filter(|n| *n > 0) {
            query.push(("per_page", per_page.to_string()));
        }
        self.get_json_with_retry(&url, &query).await
    }

    /// GET .../conversations/{id}/messages
    pub async fn list_conversation_messages(
        &self,
        conversation_id: i64,
        page: u32,
        per_page: Option<u32>,
    ) -> Result<Value> {
        let url = format!(
            "{}/conversations/{}/messages",
            self.account_url, conversation_id
        );
        let mut query = vec![("page", page.to_string())];
        if let Some(per_page) = per_page.filter(|n| *n > 0) {
            query.push(("per_page", per_page.to_string()));
        }
        self.get_json_with_retry(&url, &query).await
    }

    /// Probe the account endpoint once, without retries
    pub async fn check_connection(&self) -> ConnectionStatus {
        match self.http_client.get(&self.account_url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    ConnectionStatus {
                        ok: true,
                        status_code: Some(status.as_u16()),
                        error: None,
                    }
                } else {
                    let body = response.text().await.unwrap_or_default();
                    ConnectionStatus {
                        ok: false,
                        status_code: Some(status.as_u16()),
                        error: Some(body.chars().take(STATUS_ERROR_CHARS).collect()),
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Chatwoot check failed");
                ConnectionStatus::failed(e.to_string())
            }
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Api(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(status_error(status, &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Api(format!("failed to parse response: {}", e)))
    }

    /// GET with retry logic
    ///
    /// Retries transient failures (5xx, 429, connection errors) with exponential backoff.
    async fn get_json_with_retry(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying {} (attempt {}/{}), waiting {:?}",
                    url,
                    attempt + 1,
                    self.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }

            match self.get_json(url, query).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if is_retryable_error(&e) {
                        tracing::warn!("Transient error calling Chatwoot: {}", e);
                        last_error = Some(e);
                        continue;
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Api("max retries exceeded".to_string())))
    }
}

fn status_error(status: StatusCode, body: &str) -> Error {
    Error::Api(format!("API error ({}): {}", status.as_u16(), body))
}

/// Check if an error is retryable (transient)
fn is_retryable_error(error: &Error) -> bool {
    let Error::Api(msg) = error else {
        return false;
    };
    if msg.starts_with("HTTP request failed") {
        return true;
    }
    msg.strip_prefix("API error (")
        .and_then(|rest| rest.split(')').next())
        .and_then(|code| code.parse::<u16>().ok())
        .is_some_and(|code| code >= 500 || code == 429)
}

/// Extract the record list from a Chatwoot list response.
///
/// Endpoints disagree on the envelope: `{"payload": [..]}`, `{"data": [..]}`
/// and `{"data": {"payload": [..]}}` all occur.
pub fn payload_list(response: &Value) -> Vec<Value> {
    if let Some(items) = response.get("payload").and_then(Value::as_array) {
        return items.clone();
    }
    match response.get("data") {
        Some(Value::Array(items)) => items.clone(),
        Some(data) => data
            .get("payload")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

/// Blocking [`HelpdeskApi`] backed by [`ChatwootClient`]
pub struct BlockingChatwootClient {
    inner: ChatwootClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingChatwootClient {
    pub fn new(config: &ChatwootConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Api(format!("failed to create runtime: {}", e)))?;

        Ok(Self {
            inner: ChatwootClient::new(config)?,
            runtime,
        })
    }
}

impl HelpdeskApi for BlockingChatwootClient {
    fn account_details(&self) -> Result<Value> {
        self.runtime.block_on(self.inner.account_details())
    }

    fn list_inboxes(&self) -> Result<Value> {
        self.runtime.block_on(self.inner.list_inboxes())
    }

    fn list_conversations(&self, page: u32, per_page: Option<u32>) -> Result<Value> {
        self.runtime
            .block_on(self.inner.list_conversations(page, per_page))
    }

    fn list_conversation_messages(
        &self,
        conversation_id: i64,
        page: u32,
        per_page: Option<u32>,
    ) -> Result<Value> {
        self.runtime.block_on(
            self.inner
                .list_conversation_messages(conversation_id, page, per_page),
        )
    }

    fn check_connection(&self) -> ConnectionStatus {
        self.runtime.block_on(self.inner.check_connection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(base_url: &str) -> ChatwootConfig {
        ChatwootConfig {
            base_url: Some(format!("{}/", base_url)),
            account_id: Some("3".to_string()),
            api_token: Some("secret-token".to_string()),
            max_retries: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_client_requires_valid_config() {
        assert!(ChatwootClient::new(&ChatwootConfig::default()).is_err());
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error(&Error::Api(
            "API error (503): unavailable".to_string()
        )));
        assert!(is_retryable_error(&Error::Api(
            "API error (429): slow down".to_string()
        )));
        assert!(is_retryable_error(&Error::Api(
            "HTTP request failed: timeout".to_string()
        )));
        assert!(!is_retryable_error(&Error::Api(
            "API error (404): not found".to_string()
        )));
        assert!(!is_retryable_error(&Error::Api(
            "API error (401): 500 tokens".to_string()
        )));
        assert!(!is_retryable_error(&Error::Config("x".to_string())));
    }

    #[test]
    fn test_payload_list_envelopes() {
        assert_eq!(payload_list(&json!({ "payload": [1, 2] })).len(), 2);
        assert_eq!(payload_list(&json!({ "data": [1] })).len(), 1);
        assert_eq!(
            payload_list(&json!({ "data": { "meta": {}, "payload": [1, 2, 3] } })).len(),
            3
        );
        assert!(payload_list(&json!({ "data": { "meta": {} } })).is_empty());
        assert!(payload_list(&json!({ "payload": "nope" })).is_empty());
        assert!(payload_list(&json!([])).is_empty());
    }

    #[tokio::test]
    async fn test_list_conversations_sends_token_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/3/conversations"))
            .and(header("api_access_token", "secret-token"))
            .and(query_param("page", "2"))
            .and(query_param("status", "all"))
            .and(query_param("per_page", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "payload": [{ "id": 1 }] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatwootClient::new(&config_for(&server.uri())).unwrap();
        let response = client.list_conversations(2, Some(25)).await.unwrap();

        assert_eq!(payload_list(&response), vec![json!({ "id": 1 })]);
    }

    #[tokio::test]
    async fn test_retries_transient_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/3/inboxes"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/3/inboxes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "payload": [] })))
            .mount(&server)
            .await;

        let client = ChatwootClient::new(&config_for(&server.uri())).unwrap();
        let response = client.list_inboxes().await.unwrap();

        assert_eq!(response, json!({ "payload": [] }));
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/3"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatwootClient::new(&config_for(&server.uri())).unwrap();
        let err = client.account_details().await.unwrap_err();

        assert!(matches!(err, Error::Api(ref msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn test_check_connection_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts/3"))
            .respond_with(ResponseTemplate::new(403).set_body_string("x".repeat(500)))
            .mount(&server)
            .await;

        let client = ChatwootClient::new(&config_for(&server.uri())).unwrap();
        let status = client.check_connection().await;

        assert!(!status.ok);
        assert_eq!(status.status_code, Some(403));
        assert_eq!(status.error.map(|e| e.len()), Some(STATUS_ERROR_CHARS));
    }

    #[tokio::test]
    async fn test_check_connection_unreachable() {
        let mut config = config_for("http://127.0.0.1:9");
        config.timeout_secs = 1;
        let client = ChatwootClient::new(&config).unwrap();

        let status = client.check_connection().await;

        assert!(!status.ok);
        assert_eq!(status.status_code, None);
        assert!(status.error.is_some());
    }
}
