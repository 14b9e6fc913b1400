//! AI backends: the one network dependency of the pipeline.
//!
//! Everything above this module talks to an [`AnalysisBackend`]: one call in,
//! raw reply text out, typed failures otherwise. Two implementations ship:
//!
//! * [`GatewayBackend`]: an OpenAI-compatible `chat/completions` endpoint
//!   (any AI gateway or proxy) reached with `reqwest`.
//! * [`ProviderBackend`]: an `edgequake-llm` provider (OpenAI, Gemini, …)
//!   created per call for the run's model.
//!
//! Tests inject their own implementation through
//! [`crate::config::PipelineConfigBuilder::backend`].
//!
//! ## No retries
//!
//! A 429 or 402 is surfaced to the user as-is. Retrying a rate-limited call
//! on a 50 000-word document only burns more quota, and the user can simply
//! run again.

use crate::config::PipelineConfig;
use crate::error::DocLexError;
use crate::pipeline::dispatch::AnalysisRequest;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A single backend call.
///
/// Model-facing backends send the prompts; a hosted analysis endpoint builds
/// its own prompts and receives `analysis` as the request body instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Concrete model identifier, e.g. `google/gemini-2.5-flash`.
    pub model: String,
    /// The run as described on the wire.
    pub analysis: AnalysisRequest,
}

/// Anything that can answer a [`BackendRequest`].
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Perform the call and return the reply text.
    ///
    /// Non-success answers map to [`DocLexError::BackendRateLimited`],
    /// [`DocLexError::BackendQuotaExceeded`] or [`DocLexError::BackendError`];
    /// a reply without content maps to [`DocLexError::EmptyResponse`].
    async fn complete(&self, request: &BackendRequest) -> Result<String, DocLexError>;
}

// ── Gateway ──────────────────────────────────────────────────────────────

/// OpenAI-compatible `chat/completions` endpoint.
pub struct GatewayBackend {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    timeout_secs: u64,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl fmt::Debug for GatewayBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayBackend")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GatewayBackend {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, DocLexError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DocLexError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            timeout_secs,
            temperature: None,
            max_tokens: None,
        })
    }

    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<usize>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn body(&self, request: &BackendRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(n) = self.max_tokens {
            body["max_tokens"] = json!(n);
        }
        body
    }
}

#[async_trait]
impl AnalysisBackend for GatewayBackend {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn complete(&self, request: &BackendRequest) -> Result<String, DocLexError> {
        debug!("POST {} (model {})", self.url, request.model);

        let mut builder = self.client.post(&self.url).json(&self.body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let timeout = |e: &reqwest::Error| e.is_timeout();
        let response = builder.send().await.map_err(|e| {
            if timeout(&e) {
                DocLexError::ApiTimeout {
                    secs: self.timeout_secs,
                }
            } else {
                DocLexError::BackendError {
                    status: None,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if timeout(&e) {
                DocLexError::ApiTimeout {
                    secs: self.timeout_secs,
                }
            } else {
                DocLexError::BackendError {
                    status: Some(status.as_u16()),
                    message: e.to_string(),
                }
            }
        })?;

        if !status.is_success() {
            warn!("Gateway answered {}: {}", status, preview(&text, 200));
            return Err(classify_status(status.as_u16(), &text));
        }

        extract_content(&text)
    }
}

// ── Hosted analysis endpoint ─────────────────────────────────────────────

/// A hosted analysis function that takes the [`AnalysisRequest`] body,
/// builds the prompts server-side and answers with the analysis JSON.
///
/// Non-success replies carry `{"error": "…"}`, which becomes the failure
/// detail.
pub struct EndpointBackend {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl fmt::Debug for EndpointBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointBackend")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl EndpointBackend {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, DocLexError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DocLexError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            timeout_secs,
        })
    }
}

#[async_trait]
impl AnalysisBackend for EndpointBackend {
    fn name(&self) -> &str {
        "endpoint"
    }

    async fn complete(&self, request: &BackendRequest) -> Result<String, DocLexError> {
        debug!(
            "POST {} ({} words, model {})",
            self.url, request.analysis.word_count, request.analysis.model
        );

        let mut builder = self.client.post(&self.url).json(&request.analysis);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let transport = |e: reqwest::Error, status: Option<u16>| {
            if e.is_timeout() {
                DocLexError::ApiTimeout {
                    secs: self.timeout_secs,
                }
            } else {
                DocLexError::BackendError {
                    status,
                    message: e.to_string(),
                }
            }
        };

        let response = builder.send().await.map_err(|e| transport(e, None))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport(e, Some(status.as_u16())))?;

        if !status.is_success() {
            warn!("Analysis endpoint answered {}: {}", status, preview(&text, 200));
            return Err(classify_status(status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            return Err(DocLexError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Map a non-success status and body onto a typed error.
///
/// The body's `{"error": "…"}` or `{"error": {"message": "…"}}` becomes the
/// failure detail when present.
pub fn classify_status(status: u16, body: &str) -> DocLexError {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        match v.get("error")? {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("message")?.as_str().map(str::to_string),
            _ => None,
        }
    });
    DocLexError::from_status(status, detail)
}

/// `choices[0].message.content` of a chat-completions reply.
pub fn extract_content(body: &str) -> Result<String, DocLexError> {
    let value: Value = serde_json::from_str(body).map_err(|e| DocLexError::BackendError {
        status: None,
        message: format!("invalid JSON from gateway: {}", e),
    })?;
    let content = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(DocLexError::EmptyResponse);
    }
    Ok(content.to_string())
}

fn preview(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── edgequake-llm provider ───────────────────────────────────────────────

/// Backend over an `edgequake-llm` provider.
///
/// The provider is created per call because the model is chosen per run.
/// The provider name is the configured one, or derived from the model's
/// prefix (`google/…` → `gemini`, `openai/…` → `openai`).
#[derive(Debug, Clone, Default)]
pub struct ProviderBackend {
    provider_name: Option<String>,
    timeout_secs: u64,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl ProviderBackend {
    pub fn new(provider_name: Option<String>, timeout_secs: u64) -> Self {
        Self {
            provider_name,
            timeout_secs,
            ..Default::default()
        }
    }

    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<usize>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn create_provider(&self, model: &str) -> Result<Arc<dyn LLMProvider>, DocLexError> {
        let (name, model_id) = provider_and_model(self.provider_name.as_deref(), model);
        debug!("Creating provider {} for model {}", name, model_id);
        ProviderFactory::create_llm_provider(&name, model_id).map_err(|e| {
            DocLexError::ProviderNotConfigured {
                backend: name.clone(),
                hint: format!(
                    "Set the API key for '{name}' (e.g. GEMINI_API_KEY or OPENAI_API_KEY) \
                     or use --gateway-url.\nError: {e}"
                ),
            }
        })
    }
}

/// Split `vendor/model` into an edgequake-llm provider name and model id.
pub fn provider_and_model<'a>(explicit: Option<&str>, model: &'a str) -> (String, &'a str) {
    let (vendor, model_id) = model.split_once('/').unwrap_or(("", model));
    let name = match explicit {
        Some(name) => name.to_string(),
        None => match vendor {
            "google" => "gemini".to_string(),
            "" => "openai".to_string(),
            other => other.to_string(),
        },
    };
    (name, model_id)
}

/// Classify a provider SDK error by its message.
pub fn classify_provider_error(message: String) -> DocLexError {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        DocLexError::BackendRateLimited {
            message: Some(message),
        }
    } else if lower.contains("402")
        || lower.contains("quota")
        || lower.contains("payment required")
        || lower.contains("insufficient")
    {
        DocLexError::BackendQuotaExceeded {
            message: Some(message),
        }
    } else {
        DocLexError::BackendError {
            status: None,
            message,
        }
    }
}

#[async_trait]
impl AnalysisBackend for ProviderBackend {
    fn name(&self) -> &str {
        self.provider_name.as_deref().unwrap_or("edgequake-llm")
    }

    async fn complete(&self, request: &BackendRequest) -> Result<String, DocLexError> {
        let provider = self.create_provider(&request.model)?;

        let messages = vec![
            ChatMessage::system(&request.system_prompt),
            ChatMessage::user_with_images(&request.user_prompt, vec![]),
        ];
        let options = CompletionOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..Default::default()
        };

        let call = provider.chat(&messages, Some(&options));
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| DocLexError::ApiTimeout {
                secs: self.timeout_secs,
            })?
            .map_err(|e| classify_provider_error(e.to_string()))?;

        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        if response.content.trim().is_empty() {
            return Err(DocLexError::EmptyResponse);
        }
        Ok(response.content)
    }
}

/// Pick the backend, from most-specific to least-specific.
///
/// 1. **Injected backend** (`config.backend`): used as-is. Tests and hosts
///    with their own transport go here.
/// 2. **Analysis URL** (`config.analysis_url`): a hosted analysis endpoint
///    that receives the [`AnalysisRequest`] body.
/// 3. **Gateway URL** (`config.gateway_url`): an OpenAI-compatible endpoint
///    called with the configured API key.
/// 4. **Named provider** (`config.provider_name`): an edgequake-llm provider
///    whose API key comes from the environment.
/// 5. **Environment**: `EDGEQUAKE_LLM_PROVIDER` when set, otherwise the
///    provider implied by each run's model prefix.
pub fn resolve_backend(config: &PipelineConfig) -> Result<Arc<dyn AnalysisBackend>, DocLexError> {
    if let Some(backend) = &config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(url) = &config.analysis_url {
        info!("Using analysis endpoint at {}", url);
        let backend =
            EndpointBackend::new(url.clone(), config.api_key.clone(), config.api_timeout_secs)?;
        return Ok(Arc::new(backend));
    }

    if let Some(url) = &config.gateway_url {
        info!("Using AI gateway at {}", url);
        let backend = GatewayBackend::new(url.clone(), config.api_key.clone(), config.api_timeout_secs)?
            .with_sampling(config.temperature, config.max_tokens);
        return Ok(Arc::new(backend));
    }

    let name = config.provider_name.clone().or_else(|| {
        std::env::var("EDGEQUAKE_LLM_PROVIDER")
            .ok()
            .filter(|p| !p.is_empty())
    });
    info!(
        "Using edgequake-llm provider {}",
        name.as_deref().unwrap_or("(derived from model)")
    );
    Ok(Arc::new(
        ProviderBackend::new(name, config.api_timeout_secs)
            .with_sampling(config.temperature, config.max_tokens),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_string_error_body() {
        let e = classify_status(429, r#"{"error":"Slow down"}"#);
        assert!(matches!(e, DocLexError::BackendRateLimited { message: Some(ref m) } if m == "Slow down"));
    }

    #[test]
    fn classify_nested_error_body() {
        let e = classify_status(402, r#"{"error":{"message":"No credits","code":402}}"#);
        assert!(matches!(e, DocLexError::BackendQuotaExceeded { message: Some(ref m) } if m == "No credits"));
    }

    #[test]
    fn classify_plain_body() {
        let e = classify_status(500, "Internal Server Error");
        assert!(matches!(
            e,
            DocLexError::BackendError {
                status: Some(500),
                ..
            }
        ));
    }

    #[test]
    fn content_extraction() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"a\":1}"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn missing_or_blank_content_is_empty_response() {
        assert!(matches!(
            extract_content(r#"{"choices":[]}"#),
            Err(DocLexError::EmptyResponse)
        ));
        assert!(matches!(
            extract_content(r#"{"choices":[{"message":{"content":"  "}}]}"#),
            Err(DocLexError::EmptyResponse)
        ));
    }

    #[test]
    fn provider_name_from_model_prefix() {
        assert_eq!(
            provider_and_model(None, "google/gemini-2.5-flash"),
            ("gemini".to_string(), "gemini-2.5-flash")
        );
        assert_eq!(
            provider_and_model(None, "openai/gpt-5"),
            ("openai".to_string(), "gpt-5")
        );
        assert_eq!(
            provider_and_model(Some("openrouter"), "openai/gpt-5-mini"),
            ("openrouter".to_string(), "gpt-5-mini")
        );
    }

    #[test]
    fn provider_error_classification() {
        assert!(matches!(
            classify_provider_error("HTTP 429 Too Many Requests".into()),
            DocLexError::BackendRateLimited { .. }
        ));
        assert!(matches!(
            classify_provider_error("You exceeded your current quota".into()),
            DocLexError::BackendQuotaExceeded { .. }
        ));
        assert!(matches!(
            classify_provider_error("connection reset".into()),
            DocLexError::BackendError { status: None, .. }
        ));
    }

    #[test]
    fn gateway_body_shape() {
        let g = GatewayBackend::new("https://x/v1/chat/completions", None, 10)
            .unwrap()
            .with_sampling(Some(0.2), None);
        let body = g.body(&BackendRequest {
            system_prompt: "sys".into(),
            user_prompt: "usr".into(),
            model: "openai/gpt-5".into(),
            analysis: AnalysisRequest::default(),
        });
        assert_eq!(body["model"], "openai/gpt-5");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert!(body.get("max_tokens").is_none());
        assert!(body["temperature"].is_number());
    }

    #[test]
    fn injected_backend_wins() {
        struct Fixed;
        #[async_trait]
        impl AnalysisBackend for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }
            async fn complete(&self, _r: &BackendRequest) -> Result<String, DocLexError> {
                Ok("{}".into())
            }
        }
        let config = PipelineConfig::builder()
            .backend(Arc::new(Fixed))
            .gateway_url("https://ignored")
            .build()
            .unwrap();
        assert_eq!(resolve_backend(&config).unwrap().name(), "fixed");
    }

    #[test]
    fn gateway_chosen_over_provider() {
        let config = PipelineConfig::builder()
            .gateway_url("https://ai.example.com/v1/chat/completions")
            .provider_name("openai")
            .build()
            .unwrap();
        assert_eq!(resolve_backend(&config).unwrap().name(), "gateway");
    }

    #[test]
    fn analysis_endpoint_chosen_over_gateway() {
        let config = PipelineConfig::builder()
            .analysis_url("https://project.example.com/functions/v1/analyze-document")
            .gateway_url("https://ai.example.com/v1/chat/completions")
            .api_key("sk-test")
            .build()
            .unwrap();
        let backend = resolve_backend(&config).unwrap();
        assert_eq!(backend.name(), "endpoint");
    }

    #[test]
    fn endpoint_debug_redacts_key() {
        let backend =
            EndpointBackend::new("https://x.example.com", Some("sk-secret".into()), 5).unwrap();
        let s = format!("{backend:?}");
        assert!(!s.contains("sk-secret"));
        assert!(s.contains("<redacted>"));
    }
}
