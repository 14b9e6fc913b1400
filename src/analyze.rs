//! One-shot entry points over a throwaway [`Session`].
//!
//! ## Why both a session and free functions?
//!
//! A front-end that shows live stages, lets the user re-run with another
//! model or resets mid-run holds a [`Session`]. Scripts and batch jobs just
//! want "this file in, this result out"; the functions here build a session,
//! select the file, run once and drop it.

use crate::config::{AnalysisMode, AnalysisOptions, PipelineConfig};
use crate::error::DocLexError;
use crate::output::{AnalysisResult, ParsedDocument, RunOutput};
use crate::pipeline::extract::extract;
use crate::pipeline::input::{resolve_input, InputFile};
use crate::pipeline::render::{write_atomic, write_html};
use crate::session::Session;
use std::path::Path;
use tracing::info;

/// Analyse a local file or HTTP(S) URL.
///
/// # Example
/// ```rust,no_run
/// use doclex::{analyze, AnalysisOptions, PipelineConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     // Provider derived from the model: GEMINI_API_KEY for gemini-*, OPENAI_API_KEY for gpt-*
///     let config = PipelineConfig::default();
///     let out = analyze("contrato.pdf", &AnalysisOptions::json("gemini-flash"), &config).await?;
///     println!("{} words, {}ms", out.document.word_count, out.total_duration_ms);
///     Ok(())
/// }
/// ```
pub async fn analyze(
    input: impl AsRef<str>,
    options: &AnalysisOptions,
    config: &PipelineConfig,
) -> Result<RunOutput, DocLexError> {
    let file = resolve_input(input.as_ref(), None, config.download_timeout_secs).await?;
    analyze_file(file, options, config).await
}

/// Analyse an already-loaded file.
pub async fn analyze_file(
    file: InputFile,
    options: &AnalysisOptions,
    config: &PipelineConfig,
) -> Result<RunOutput, DocLexError> {
    let session = Session::new(config.clone())?;
    session.select_file(file)?;
    session.process(options).await
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input: impl AsRef<str>,
    options: &AnalysisOptions,
    config: &PipelineConfig,
) -> Result<RunOutput, DocLexError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocLexError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input, options, config))
}

/// Analyse and write the result to `output_path`.
///
/// Visual results are written as a standalone HTML document, structured
/// results as pretty-printed JSON. Both writes are atomic.
pub async fn analyze_to_file(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    options: &AnalysisOptions,
    config: &PipelineConfig,
) -> Result<RunOutput, DocLexError> {
    let output = analyze(input, options, config).await?;
    write_result(&output.result, output_path.as_ref()).await?;
    Ok(output)
}

/// Write `result` to `path` in the format its mode calls for.
pub async fn write_result(result: &AnalysisResult, path: &Path) -> Result<(), DocLexError> {
    match result {
        AnalysisResult::Visual(visual) => write_html(visual, path).await,
        AnalysisResult::Structured(structured) => {
            let json = serde_json::to_string_pretty(structured)
                .map_err(|e| DocLexError::Internal(format!("serialise result: {}", e)))?;
            write_atomic(path, &json).await?;
            info!("Wrote {} ({} bytes)", path.display(), json.len());
            Ok(())
        }
    }
}

/// Default output file name for `mode`.
pub fn default_output_name(mode: AnalysisMode) -> &'static str {
    match mode {
        AnalysisMode::Visual => crate::pipeline::render::HTML_FILE_NAME,
        AnalysisMode::Json => "analise.json",
    }
}

/// Extract text and counts without calling any backend.
///
/// Does not require an API key.
pub async fn inspect(
    input: impl AsRef<str>,
    mime_override: Option<&str>,
    config: &PipelineConfig,
) -> Result<ParsedDocument, DocLexError> {
    let file = resolve_input(input.as_ref(), mime_override, config.download_timeout_secs).await?;
    extract(&file, config).await
}
