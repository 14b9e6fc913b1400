//! Pipeline steps for document ingestion and analysis.
//!
//! Each submodule implements exactly one transformation step. Keeping steps
//! separate makes each independently testable and lets a backend or an
//! extractor be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ dispatch ──▶ backend ──▶ normalize ──▶ render
//! (path/URL) (pdfium/   (prompts,    (gateway/   (JSON         (HTML file,
//!            zip+xml)   model)       provider)   recovery)     visual only)
//! ```
//!
//! 1. [`input`]: resolve a path, URL or byte buffer to an `InputFile`
//!    with a declared MIME type
//! 2. [`extract`]: text extraction under the page and word caps; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`dispatch`]: build the mode-specific request and send it
//! 4. [`backend`]: the only step with network I/O
//! 5. [`normalize`]: coerce the reply into a result of a guaranteed shape
//! 6. [`render`]: wrap a visual result in a standalone HTML document

pub mod backend;
pub mod dispatch;
pub mod extract;
pub mod input;
pub mod normalize;
pub mod render;
