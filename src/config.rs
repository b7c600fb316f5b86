//! LLM backend configuration.
//!
//! Defaults target a local Ollama instance. Inference on a local model is
//! slow, so the per-attempt timeout is deliberately generous — it is a
//! ceiling, not an expectation.

/// Application-level constants
pub const APP_NAME: &str = "Zhaloba";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Default Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model used for analysis and complaint generation.
pub const DEFAULT_MODEL: &str = "llama3.1:8b";

/// Per-attempt network timeout, seconds. Local inference can legitimately
/// take minutes; the timeout is only a ceiling per attempt.
pub const REQUEST_TIMEOUT_SECS: u64 = 500;

/// Additional attempts after the first failure.
pub const MAX_RETRIES: u32 = 2;

/// Base delay between attempts; the n-th retry waits n × base.
pub const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Resolved configuration for the model backend.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: REQUEST_TIMEOUT_SECS,
            max_retries: MAX_RETRIES,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
        }
    }
}

impl LlmConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `OLLAMA_BASE_URL`, `OLLAMA_MODEL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        config
    }
}
