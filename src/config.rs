//! Configuration types for the ingestion-to-analysis pipeline.
//!
//! Session-wide behaviour lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]: backend selection, timeouts, the simulated stage
//! delays and the progress callback. What changes from one run to the next
//! (mode, model, template) lives in [`AnalysisOptions`].

use crate::error::DocLexError;
use crate::pipeline::backend::AnalysisBackend;
use crate::progress::ProgressCallback;
use crate::templates::{find_template, ColorScheme};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Session-wide configuration.
///
/// # Example
/// ```rust
/// use doclex::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .gateway_url("https://ai.example.com/v1/chat/completions")
///     .api_key("sk-test")
///     .upload_delay_ms(0)
///     .build()
///     .unwrap();
/// assert_eq!(config.tick_interval_ms, 50);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Pre-constructed backend. Takes precedence over every other backend field.
    pub backend: Option<Arc<dyn AnalysisBackend>>,

    /// Hosted analysis endpoint that receives the whole run description as
    /// JSON and builds the prompts itself. Takes precedence over the gateway.
    pub analysis_url: Option<String>,

    /// OpenAI-compatible `chat/completions` endpoint. When set, the gateway
    /// backend is used.
    pub gateway_url: Option<String>,

    /// Bearer token sent to the analysis endpoint or the gateway.
    pub api_key: Option<String>,

    /// edgequake-llm provider name (e.g. "openai", "gemini"). Used when no
    /// gateway is configured. If None the provider is derived from the model.
    pub provider_name: Option<String>,

    /// Sampling temperature forwarded to the backend. Default: None (backend default).
    pub temperature: Option<f32>,

    /// Maximum tokens the backend may generate. Default: None (backend default).
    pub max_tokens: Option<usize>,

    /// Per-call backend timeout in seconds. Default: 300.
    ///
    /// The slowest model (`gemini-pro`) routinely needs about two minutes on a
    /// long document.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Simulated duration of the upload stage. Default: 300 ms.
    pub upload_delay_ms: u64,

    /// Simulated duration of the final formatting/generation stage. Default: 200 ms.
    pub finalize_delay_ms: u64,

    /// Interval of the live elapsed-time ticker. Default: 50 ms.
    pub tick_interval_ms: u64,

    /// Path to a pdfium shared library. Falls back to `PDFIUM_LIB_PATH`, then
    /// the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Receives stage, warning and tick events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: None,
            analysis_url: None,
            gateway_url: None,
            api_key: None,
            provider_name: None,
            temperature: None,
            max_tokens: None,
            api_timeout_secs: 300,
            download_timeout_secs: 120,
            upload_delay_ms: 300,
            finalize_delay_ms: 200,
            tick_interval_ms: 50,
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("analysis_url", &self.analysis_url)
            .field("gateway_url", &self.gateway_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider_name", &self.provider_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("upload_delay_ms", &self.upload_delay_ms)
            .field("finalize_delay_ms", &self.finalize_delay_ms)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn upload_delay(&self) -> Duration {
        Duration::from_millis(self.upload_delay_ms)
    }

    pub fn finalize_delay(&self) -> Duration {
        Duration::from_millis(self.finalize_delay_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn backend(mut self, backend: Arc<dyn AnalysisBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn analysis_url(mut self, url: impl Into<String>) -> Self {
        self.config.analysis_url = Some(url.into());
        self
    }

    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.config.gateway_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn upload_delay_ms(mut self, ms: u64) -> Self {
        self.config.upload_delay_ms = ms;
        self
    }

    pub fn finalize_delay_ms(mut self, ms: u64) -> Self {
        self.config.finalize_delay_ms = ms;
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.tick_interval_ms = ms;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, DocLexError> {
        let c = &self.config;
        if c.tick_interval_ms == 0 {
            return Err(DocLexError::InvalidConfig(
                "Tick interval must be ≥ 1 ms".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocLexError::InvalidConfig(
                "API timeout must be ≥ 1 s".into(),
            ));
        }
        for (label, url) in [("Analysis", &c.analysis_url), ("Gateway", &c.gateway_url)] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(DocLexError::InvalidConfig(format!(
                        "{label} URL must be http(s), got '{url}'"
                    )));
                }
            }
        }
        Ok(self.config)
    }
}

// ── Per-run options ──────────────────────────────────────────────────────

/// What the backend is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Structured legal analysis as a JSON object. (default)
    #[default]
    Json,
    /// A visual HTML rendition: `{html, css, summary, elementsFound}`.
    Visual,
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnalysisMode::Json => "json",
            AnalysisMode::Visual => "visual",
        })
    }
}

/// The closed set of logical model names a caller can pick from.
///
/// | Name | Backend model | Notes |
/// |------|---------------|-------|
/// | `gemini-flash` | `google/gemini-2.5-flash` | Default, fastest (~30 s) |
/// | `gemini-pro` | `google/gemini-2.5-pro` | Most accurate (~2 min) |
/// | `gpt-5` | `openai/gpt-5` | OpenAI premium |
/// | `gpt-5-mini` | `openai/gpt-5-mini` | OpenAI fast |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelChoice {
    #[default]
    GeminiFlash,
    GeminiPro,
    #[serde(rename = "gpt-5")]
    Gpt5,
    #[serde(rename = "gpt-5-mini")]
    Gpt5Mini,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 4] = [
        ModelChoice::GeminiFlash,
        ModelChoice::GeminiPro,
        ModelChoice::Gpt5,
        ModelChoice::Gpt5Mini,
    ];

    /// Parse a logical name. Unknown names fall back to the default model.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelChoice::GeminiFlash => "gemini-flash",
            ModelChoice::GeminiPro => "gemini-pro",
            ModelChoice::Gpt5 => "gpt-5",
            ModelChoice::Gpt5Mini => "gpt-5-mini",
        }
    }

    /// Concrete identifier sent to the backend.
    pub fn backend_model(&self) -> &'static str {
        match self {
            ModelChoice::GeminiFlash => "google/gemini-2.5-flash",
            ModelChoice::GeminiPro => "google/gemini-2.5-pro",
            ModelChoice::Gpt5 => "openai/gpt-5",
            ModelChoice::Gpt5Mini => "openai/gpt-5-mini",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelChoice::GeminiFlash => "Gemini Flash",
            ModelChoice::GeminiPro => "Gemini Pro",
            ModelChoice::Gpt5 => "GPT-5",
            ModelChoice::Gpt5Mini => "GPT-5 Mini",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run options handed to [`crate::session::Session::process`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    pub mode: AnalysisMode,
    /// Logical model name as typed by the user; resolved with
    /// [`ModelChoice::from_name`].
    pub model: String,
    pub template_id: Option<String>,
    /// Stylesheet of the chosen template, prepended to the generated CSS.
    pub template_css: Option<String>,
    pub template_colors: Option<ColorScheme>,
}

impl AnalysisOptions {
    pub fn json(model: impl Into<String>) -> Self {
        Self {
            mode: AnalysisMode::Json,
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn visual(model: impl Into<String>) -> Self {
        Self {
            mode: AnalysisMode::Visual,
            model: model.into(),
            ..Default::default()
        }
    }

    /// Select a catalogue template: sets its id and colours.
    ///
    /// Unknown ids keep only the id; colours fall back to the default scheme
    /// at dispatch time.
    pub fn with_template(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if let Some(t) = find_template(&id) {
            self.template_colors = Some(t.color_scheme.into());
        }
        self.template_id = Some(id);
        self
    }

    pub fn with_template_css(mut self, css: impl Into<String>) -> Self {
        self.template_css = Some(css.into());
        self
    }

    pub fn with_colors(mut self, colors: ColorScheme) -> Self {
        self.template_colors = Some(colors);
        self
    }

    pub fn model_choice(&self) -> ModelChoice {
        ModelChoice::from_name(&self.model)
    }

    /// Colours the visual prompt should use.
    pub fn colors(&self) -> ColorScheme {
        self.template_colors.clone().unwrap_or_default()
    }
}
