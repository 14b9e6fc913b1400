//! Error types for the doclex library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`DocLexError`]: **Fatal**: the run cannot produce a result (unsupported
//!   file, backend refused the request, reply could not be coerced into JSON).
//!   Returned as `Err(DocLexError)` from [`crate::session::Session::process`]
//!   and the `analyze*` entry points.
//!
//! * [`PipelineWarning`]: **Non-fatal**: something was degraded (the text was
//!   capped at the word limit) but the run continues. Reported through the
//!   progress callback and collected in [`crate::output::RunOutput::warnings`].
//!
//! Every fatal error maps to exactly one human-readable sentence through
//! [`DocLexError::user_message`], which is what a front-end shows the user.

use crate::stages::{StageId, StageStatus};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doclex library.
#[derive(Debug, Error)]
pub enum DocLexError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Declared MIME type is neither PDF nor DOCX.
    #[error("Unsupported file type '{mime_type}' for '{file_name}'. Use PDF or DOCX.")]
    UnsupportedFormat { file_name: String, mime_type: String },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{file_name}' is corrupt: {detail}")]
    CorruptPdf { file_name: String, detail: String },

    /// PDF requires a password; doclex does not accept encrypted input.
    #[error("PDF '{file_name}' is encrypted. Remove the password and upload it again.")]
    PasswordRequired { file_name: String },

    /// The DOCX archive is missing its main part or the XML is malformed.
    #[error("DOCX '{file_name}' is corrupt: {detail}")]
    CorruptDocx { file_name: String, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Backend errors ────────────────────────────────────────────────────
    /// No backend could be built (missing gateway URL, API key or provider).
    #[error("AI backend '{backend}' is not configured.\n{hint}")]
    ProviderNotConfigured { backend: String, hint: String },

    /// Backend answered HTTP 429.
    #[error("Rate limit exceeded: {}", .message.as_deref().unwrap_or("try again in a few seconds"))]
    BackendRateLimited { message: Option<String> },

    /// Backend answered HTTP 402.
    #[error("Quota exceeded: {}", .message.as_deref().unwrap_or("payment required"))]
    BackendQuotaExceeded { message: Option<String> },

    /// Any other non-success answer. `status` is `None` when the transport did
    /// not expose an HTTP status (provider SDK errors, connection failures).
    #[error("AI backend error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    BackendError { status: Option<u16>, message: String },

    /// Backend answered 2xx but the reply carried no content.
    #[error("AI backend returned an empty response")]
    EmptyResponse,

    /// Backend call did not finish within the configured timeout.
    #[error("AI backend call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// Reply could not be coerced into a JSON object by any recovery strategy.
    #[error("Could not extract a JSON object from the AI response (starts with {preview:?})")]
    UnparsableResponse { preview: String },

    // ── Run-state errors ──────────────────────────────────────────────────
    /// A tracker transition would break stage monotonicity.
    #[error("Stage '{stage}' cannot become {to} while {from}")]
    InvalidStageTransition {
        stage: StageId,
        from: StageStatus,
        to: StageStatus,
    },

    /// `process` was called before any file was selected.
    #[error("No file selected")]
    NoFileSelected,

    /// Another run is still in flight on this session.
    #[error("A run is already in progress")]
    RunInProgress,

    /// The session was reset (or a new file selected) while this run was in
    /// flight; its output was discarded.
    #[error("Run was abandoned because the session was reset")]
    RunAbandoned,

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocLexError {
    /// Build the error for a non-success HTTP status.
    ///
    /// `detail` is the backend's own explanation (the `error` field of the
    /// response body), when it sent one.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        match status {
            429 => DocLexError::BackendRateLimited { message: detail },
            402 => DocLexError::BackendQuotaExceeded { message: detail },
            _ => DocLexError::BackendError {
                status: Some(status),
                message: detail.unwrap_or_else(|| format!("request failed with status {status}")),
            },
        }
    }

    /// True for errors raised by the AI backend call itself.
    ///
    /// `EmptyResponse` counts as a backend error.
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            DocLexError::BackendRateLimited { .. }
                | DocLexError::BackendQuotaExceeded { .. }
                | DocLexError::BackendError { .. }
                | DocLexError::EmptyResponse
                | DocLexError::ApiTimeout { .. }
        )
    }

    /// The single sentence shown to the user when a run fails.
    pub fn user_message(&self) -> String {
        match self {
            DocLexError::UnsupportedFormat { .. } => {
                "Unsupported file type. Use PDF or DOCX.".to_string()
            }
            DocLexError::BackendRateLimited { message } => message
                .clone()
                .unwrap_or_else(|| "Rate limit exceeded. Try again in a few seconds.".to_string()),
            DocLexError::BackendQuotaExceeded { message } => message.clone().unwrap_or_else(|| {
                "Insufficient credits. Add credits to your AI workspace to continue.".to_string()
            }),
            DocLexError::BackendError {
                status: Some(status),
                message,
            } => format!("Analysis failed ({status}): {message}"),
            DocLexError::BackendError {
                status: None,
                message,
            } => format!("Analysis failed: {message}"),
            DocLexError::EmptyResponse => {
                "Analysis failed: the AI returned an empty response.".to_string()
            }
            DocLexError::ApiTimeout { .. } => {
                "Analysis failed: the AI took too long to answer.".to_string()
            }
            DocLexError::UnparsableResponse { .. } => {
                "Could not process the AI response. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// A non-fatal degradation observed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PipelineWarning {
    /// The extracted text reached the word cap; only the first `limit` words
    /// are analysed.
    #[error("Document reached the {limit}-word limit; only the first {limit} words will be processed")]
    #[serde(rename_all = "camelCase")]
    WordLimitReached { limit: usize, word_count: usize },
}
