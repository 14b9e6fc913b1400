//! # doclex
//!
//! Analyse Brazilian legal documents (PDF/DOCX) with an AI model, either as a
//! structured JSON analysis or as a "Visual Law" HTML rendition.
//!
//! ## Why this crate?
//!
//! Model replies are free-form text. A front-end that renders entities,
//! timelines or a generated HTML page needs a result whose shape it can rely
//! on, plus honest feedback while a two-minute model call is in flight. This
//! crate wraps the model call in a staged pipeline that caps the input,
//! times every stage, recovers JSON from chatty replies and guarantees the
//! shape of what comes back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / DOCX
//!  │
//!  ├─ 1. Upload      file accepted (PDF or DOCX only)
//!  ├─ 2. Extraction  pdfium / zip+xml text, ≤100 pages scanned, ≤50 000 words
//!  ├─ 3. Analysis    one backend call (json or visual prompt) + normalisation
//!  └─ 4. Formatting  result installed (visual mode: "generation")
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doclex::{analyze, AnalysisOptions, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .gateway_url("https://ai.example.com/v1/chat/completions")
//!         .api_key(std::env::var("DOCLEX_API_KEY")?)
//!         .build()?;
//!     let out = analyze("peticao.pdf", &AnalysisOptions::json("gemini-flash"), &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&out.result)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doclex` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! doclex = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing a Model
//!
//! | Name | Backend model | Typical time |
//! |------|---------------|--------------|
//! | `gemini-flash` | `google/gemini-2.5-flash` | ~30 s (default) |
//! | `gemini-pro` | `google/gemini-2.5-pro` | ~2 min, most accurate |
//! | `gpt-5` | `openai/gpt-5` | ~1 min |
//! | `gpt-5-mini` | `openai/gpt-5-mini` | ~40 s |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod stages;
pub mod templates;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_file, analyze_sync, analyze_to_file, inspect, write_result};
pub use config::{AnalysisMode, AnalysisOptions, ModelChoice, PipelineConfig, PipelineConfigBuilder};
pub use error::{DocLexError, PipelineWarning};
pub use output::{
    AnalysisResult, FileType, LegalAnalysis, ParsedDocument, RunOutput, StructuredResult,
    VisualResult,
};
pub use pipeline::backend::{
    AnalysisBackend, BackendRequest, EndpointBackend, GatewayBackend, ProviderBackend,
};
pub use pipeline::input::InputFile;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use session::Session;
pub use stages::{format_elapsed, ProcessingStage, StageId, StageStatus, StageTracker};
pub use templates::{find_template, ColorScheme, Template, TEMPLATES};
