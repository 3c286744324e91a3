//! OpenRouter LLM client implementation
//!
//! Async HTTP client for OpenAI-compatible chat completions with model
//! fallback and rate-limit backoff. Retries live here, never in the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::{debug, error, info, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::completion::TextCompletion;
use super::types::{ChatRequest, ChatResponse, LlmResponse, Message};

/// OpenRouter API base URL
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Maximum number of retry attempts for rate-limited requests
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 1000;

const JSON_SYSTEM_PROMPT: &str = "You are a career analysis assistant. \
Always respond with valid JSON only, exactly matching the structure requested.";

/// Chat-completion client
#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    config: LlmConfig,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("default_model", &self.config.default_model)
            .finish()
    }
}

/// Builder for creating an LlmClient
#[derive(Default)]
pub struct LlmClientBuilder {
    config: Option<LlmConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl LlmClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL (defaults to the configured one, then OpenRouter)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<LlmClient> {
        let config = self.config.unwrap_or_default();
        let api_key = self
            .api_key
            .ok_or_else(|| Error::LLMError("API key is required".to_string()))?;

        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        let base_url = self
            .base_url
            .or_else(|| config.base_url.clone())
            .unwrap_or_else(|| OPENROUTER_BASE_URL.to_string());

        Ok(LlmClient {
            http_client,
            config,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl LlmClient {
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        LlmClientBuilder::new().config(config).api_key(api_key).build()
    }

    /// Build from configuration, reading the API key from the environment
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .map_err(|e| Error::ConfigError(e.to_string()))?
            .ok_or_else(|| {
                Error::LLMError(
                    "No API key set. Export JOBGRAPH_API_KEY or OPENROUTER_API_KEY".to_string(),
                )
            })?;
        Self::new(config.clone(), api_key)
    }

    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    pub fn fallback_models(&self) -> &[String] {
        &self.config.fallback_models
    }

    /// Make a JSON-mode chat completion request against one model
    pub async fn complete(
        &self,
        messages: Vec<Message>,
        model: Option<&str>,
    ) -> Result<LlmResponse> {
        let model = model.unwrap_or(&self.config.default_model);

        let request = ChatRequest::new(model, messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_json_output();

        self.execute_request(&request).await
    }

    /// Try the default model, then each fallback model while the failure is
    /// about the model (rate limit, unavailable) rather than the request
    pub async fn complete_with_fallback(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        let models =
            std::iter::once(&self.config.default_model).chain(&self.config.fallback_models);
        let mut last_error = None;

        for model in models {
            debug!(model = %model, "Requesting chat completion");
            match self.complete(messages.clone(), Some(model.as_str())).await {
                Ok(response) => {
                    info!(
                        model = %model,
                        tokens = response.tokens_used,
                        "Chat completion received"
                    );
                    return Ok(response);
                }
                Err(e) if switches_model(&e) => {
                    warn!(model = %model, error = %e, "Model failed, trying the next one");
                    last_error = Some(e);
                }
                Err(e) => {
                    error!(model = %model, error = %e, "Chat completion failed");
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::NoSuitableModel("no models configured".to_string())))
    }

    /// Send one request, sleeping and resending on 429 up to
    /// `MAX_RETRY_ATTEMPTS` times in total
    async fn execute_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let mut attempt = 1;
        loop {
            match self.send_request(request).await {
                Err(Error::RateLimited(retry_after)) if attempt < MAX_RETRY_ATTEMPTS => {
                    let wait = backoff_delay(attempt, retry_after);
                    warn!(attempt, wait_ms = wait.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("X-Title", "Jobgraph")
            .json(request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), retry_after, &body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("unreadable chat completion: {}", e)))?;

        LlmResponse::from_chat_response(chat_response)
            .ok_or_else(|| Error::LLMError("chat completion had no choices".to_string()))
    }
}

#[async_trait]
impl TextCompletion for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let messages = vec![Message::system(JSON_SYSTEM_PROMPT), Message::user(prompt)];
        let response = self.complete_with_fallback(messages).await?;
        Ok(response.content)
    }
}

fn error_for_status(status: u16, retry_after: Option<u64>, body: &str) -> Error {
    match status {
        401 | 403 => Error::LLMError("the API key was rejected".to_string()),
        402 => Error::LLMError("insufficient credits".to_string()),
        404 => Error::LLMError(format!("model unavailable: {}", body)),
        429 => Error::RateLimited(
            retry_after
                .or_else(|| retry_after_from_body(body))
                .unwrap_or(60),
        ),
        _ => Error::LLMError(format!("HTTP {}: {}", status, body)),
    }
}

/// Whether another model might succeed where this one failed
fn switches_model(error: &Error) -> bool {
    match error {
        Error::RateLimited(_) => true,
        Error::LLMError(msg) => {
            let msg = msg.to_lowercase();
            ["unavailable", "not available", "no available provider", "overloaded", "capacity"]
                .iter()
                .any(|p| msg.contains(p))
        }
        _ => false,
    }
}

/// Exponential from `BACKOFF_BASE_MS`, never shorter than the server's hint
fn backoff_delay(attempt: u32, retry_after_secs: u64) -> Duration {
    let exponential = BACKOFF_BASE_MS.saturating_mul(1 << (attempt.saturating_sub(1)).min(16));
    Duration::from_millis(exponential.max(retry_after_secs.saturating_mul(1000)))
}

fn retry_after_from_body(body: &str) -> Option<u64> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("retry_after")
        .or_else(|| json.get("error")?.get("retry_after"))
        .and_then(serde_json::Value::as_u64)
}
