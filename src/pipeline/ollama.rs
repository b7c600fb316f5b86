//! Query orchestrator — the single owner of the model round-trip.
//!
//! Request construction (defaults merged with caller overrides), the
//! per-attempt network timeout, bounded retry with linear backoff, error
//! classification and delegation to the normalizer all live here. Nothing
//! here caches or persists; that is layered above by the analysis entry
//! point and the complaint pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use super::normalize::{normalize, ModelReply, RawReply};
use super::retry::{RetryDecision, RetryPolicy};
use super::LlmError;
use crate::config::LlmConfig;

/// Fixed default generation parameters; caller overrides win on collision.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_REPEAT_PENALTY: f32 = 1.1;
pub const DEFAULT_FORMAT: &str = "json";

/// Caller-supplied overrides for one query.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub repeat_penalty: Option<f32>,
    pub format: Option<String>,
}

/// Wire request body for the model backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub repeat_penalty: f32,
    pub format: String,
}

impl GenerateRequest {
    pub fn new(model: &str, prompt: &str, options: &QueryOptions) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.to_string(),
            temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            repeat_penalty: options.repeat_penalty.unwrap_or(DEFAULT_REPEAT_PENALTY),
            format: options
                .format
                .clone()
                .unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
        }
    }
}

/// One raw model round-trip. The orchestrator drives retries on top of this.
#[allow(async_fn_in_trait)]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<Value, LlmError>;

    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

/// HTTP client for a local Ollama instance.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(&config.base_url, config.timeout_secs)
    }

    /// Default local instance with the stock generous timeout.
    pub fn default_local() -> Self {
        Self::from_config(&LlmConfig::default())
    }

    /// Advisory reachability probe. A negative answer never blocks a query
    /// attempt — the backend may come up between the probe and the call.
    pub async fn is_available(&self) -> bool {
        self.list_models().await.is_ok()
    }

    fn classify_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() {
            LlmError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            LlmError::Timeout(self.timeout_secs)
        } else {
            LlmError::Http(e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TaggedModel>,
}

#[derive(Deserialize)]
struct TaggedModel {
    name: String,
}

impl LlmClient for OllamaClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<Value, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

/// Drives the retry loop over an [`LlmClient`] and hands raw bodies to the
/// normalizer. Stateless between calls; retry state is scoped to one call.
pub struct QueryOrchestrator<C> {
    client: C,
    model: String,
    policy: RetryPolicy,
}

impl<C: LlmClient> QueryOrchestrator<C> {
    pub fn new(client: C, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn query(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<ModelReply, LlmError> {
        self.query_with_deadline(prompt, options, None).await
    }

    /// Query with an optional caller deadline bounding all attempts and
    /// backoff delays. On expiry the loop stops issuing attempts and
    /// surfaces [`LlmError::DeadlineExceeded`] instead of continuing.
    pub async fn query_with_deadline(
        &self,
        prompt: &str,
        options: &QueryOptions,
        deadline: Option<Instant>,
    ) -> Result<ModelReply, LlmError> {
        let request = GenerateRequest::new(&self.model, prompt, options);
        let mut failures: u32 = 0;

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(LlmError::DeadlineExceeded);
            }

            let call = self.client.generate(&request);
            let outcome = match deadline {
                Some(d) => match tokio::time::timeout_at(d, call).await {
                    Ok(result) => result,
                    Err(_) => return Err(LlmError::DeadlineExceeded),
                },
                None => call.await,
            };

            match outcome {
                Ok(body) => return normalize(RawReply::from_body(body)),
                Err(error) => {
                    failures += 1;
                    match self.policy.decide(failures, &error) {
                        RetryDecision::Retry(delay) => {
                            tracing::warn!(
                                attempt = failures,
                                delay_ms = delay.as_millis() as u64,
                                error = %error,
                                "model call failed, retrying"
                            );
                            if deadline.is_some_and(|d| Instant::now() + delay >= d) {
                                return Err(LlmError::DeadlineExceeded);
                            }
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::Fail => return Err(error),
                    }
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Mock client
// ═══════════════════════════════════════════════════════════

/// One scripted mock reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Ollama-style `{"response": text}` body.
    Text(String),
    /// Direct structured body.
    Json(Value),
    ConnectionRefused,
    TimedOut,
    Backend(u16, String),
}

impl ScriptedReply {
    fn to_result(&self) -> Result<Value, LlmError> {
        match self {
            Self::Text(text) => Ok(serde_json::json!({ "response": text })),
            Self::Json(value) => Ok(value.clone()),
            Self::ConnectionRefused => Err(LlmError::Connection("mock".into())),
            Self::TimedOut => Err(LlmError::Timeout(500)),
            Self::Backend(status, body) => Err(LlmError::Backend {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

/// Mock LLM client for testing — plays a script of replies, repeating the
/// last one once the script runs out, and records every request it saw.
#[derive(Clone)]
pub struct MockLlmClient {
    script: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<ScriptedReply>>>,
    repeat: ScriptedReply,
    requests: std::sync::Arc<std::sync::Mutex<Vec<GenerateRequest>>>,
    models: Vec<String>,
}

impl MockLlmClient {
    pub fn scripted(script: Vec<ScriptedReply>) -> Self {
        let repeat = script
            .last()
            .cloned()
            .unwrap_or(ScriptedReply::Text(String::new()));
        Self {
            script: std::sync::Arc::new(std::sync::Mutex::new(script.into())),
            repeat,
            requests: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
            models: vec!["llama3.1:8b".to_string()],
        }
    }

    /// Always answer with an Ollama-style text body.
    pub fn text(reply: &str) -> Self {
        Self::scripted(vec![ScriptedReply::Text(reply.to_string())])
    }

    /// Always answer with a direct structured body.
    pub fn json(value: Value) -> Self {
        Self::scripted(vec![ScriptedReply::Json(value)])
    }

    /// Number of generate calls observed.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// The most recent request body, if any call happened.
    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.requests.lock().ok()?.last().cloned()
    }
}

impl LlmClient for MockLlmClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<Value, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let reply = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| self.repeat.clone());
        reply.to_result()
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        Ok(self.models.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_merges_defaults() {
        let request = GenerateRequest::new("llama3.1:8b", "промпт", &QueryOptions::default());
        assert!((request.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, 4000);
        assert_eq!(request.format, "json");
    }

    #[test]
    fn caller_overrides_win_on_collision() {
        let options = QueryOptions {
            temperature: Some(0.1),
            max_tokens: Some(6000),
            ..QueryOptions::default()
        };
        let request = GenerateRequest::new("llama3.1:8b", "промпт", &options);
        assert!((request.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, 6000);
        assert!((request.repeat_penalty - 1.1).abs() < f32::EPSILON);
    }

    #[test]
    fn request_serializes_flat_wire_shape() {
        let request = GenerateRequest::new("llama3.1:8b", "промпт", &QueryOptions::default());
        let value = serde_json::to_value(&request).unwrap();
        for key in ["model", "prompt", "temperature", "max_tokens", "repeat_penalty", "format"] {
            assert!(value.get(key).is_some(), "missing wire key {key}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_are_retried_until_success() {
        let client = MockLlmClient::scripted(vec![
            ScriptedReply::ConnectionRefused,
            ScriptedReply::TimedOut,
            ScriptedReply::Text("{\"summary\": \"кратко\"}".into()),
        ]);
        let orchestrator = QueryOrchestrator::new(client.clone(), "llama3.1:8b");

        let reply = orchestrator
            .query("промпт", &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(client.calls(), 3);
        assert_eq!(reply, ModelReply::Structured(json!({"summary": "кратко"})));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_last_cause() {
        let client = MockLlmClient::scripted(vec![ScriptedReply::TimedOut]);
        let orchestrator = QueryOrchestrator::new(client.clone(), "llama3.1:8b");

        let error = orchestrator
            .query("промпт", &QueryOptions::default())
            .await
            .unwrap_err();

        // 1 initial attempt + 2 retries
        assert_eq!(client.calls(), 3);
        assert!(matches!(error, LlmError::Timeout(_)));
    }

    #[tokio::test]
    async fn decode_failure_is_not_retried() {
        let client = MockLlmClient::text("{ сломанный json }");
        let orchestrator = QueryOrchestrator::new(client.clone(), "llama3.1:8b");

        let error = orchestrator
            .query("промпт", &QueryOptions::default())
            .await
            .unwrap_err();

        assert_eq!(client.calls(), 1);
        assert!(matches!(error, LlmError::Decode(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn backend_error_wraps_backend_message() {
        let client = MockLlmClient::scripted(vec![ScriptedReply::Backend(
            500,
            "model not loaded".into(),
        )]);
        let orchestrator = QueryOrchestrator::new(client, "llama3.1:8b");

        let error = orchestrator
            .query("промпт", &QueryOptions::default())
            .await
            .unwrap_err();

        assert!(error.to_string().contains("model not loaded"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_the_retry_loop() {
        let client = MockLlmClient::scripted(vec![ScriptedReply::ConnectionRefused]);
        let orchestrator = QueryOrchestrator::new(client.clone(), "llama3.1:8b");
        let deadline = Instant::now() + std::time::Duration::from_millis(1500);

        let error = orchestrator
            .query_with_deadline("промпт", &QueryOptions::default(), Some(deadline))
            .await
            .unwrap_err();

        assert!(matches!(error, LlmError::DeadlineExceeded));
        // First retry (1s) fits inside the deadline, the second (2s) does not.
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn free_text_body_normalizes_to_free_text() {
        let client = MockLlmClient::text("Просто текст без структуры");
        let orchestrator = QueryOrchestrator::new(client, "llama3.1:8b");

        let reply = orchestrator
            .query("промпт", &QueryOptions::default())
            .await
            .unwrap();
        assert!(matches!(reply, ModelReply::FreeText(_)));
    }

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", 60);
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.timeout_secs, 60);
    }
}
