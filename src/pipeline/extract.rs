//! Text extraction: PDF via pdfium, DOCX via zip + roxmltree.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool so the
//! Tokio workers (and the stage ticker) keep running while a long document is
//! parsed. DOCX parsing goes through the same pool: inflating and walking a
//! large `document.xml` is CPU-bound too.
//!
//! ## Why cap during iteration, not after?
//!
//! A 900-page scanned bundle would otherwise be fully parsed only to be thrown
//! away. PDF pages are pulled lazily through [`accumulate_pages`]: at most
//! [`MAX_PDF_PAGES`] are read, and reading stops at the first page that
//! brings the running word count to [`MAX_WORDS`]. DOCX has no page structure
//! to stop on, so its text is capped after the single extraction pass.

use crate::config::PipelineConfig;
use crate::error::{DocLexError, PipelineWarning};
use crate::output::{FileType, ParsedDocument};
use crate::pipeline::input::{validate_mime, InputFile};
use pdfium_render::prelude::*;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Maximum number of words kept from any document.
pub const MAX_WORDS: usize = 50_000;

/// Maximum number of PDF pages scanned.
pub const MAX_PDF_PAGES: usize = 100;

/// Words per page used to estimate a DOCX page count.
pub const WORDS_PER_PAGE: usize = 500;

/// Extract the text of `file`, enforcing the page and word caps.
///
/// Returns [`DocLexError::UnsupportedFormat`] before touching the bytes when
/// the declared MIME type is neither PDF nor DOCX.
pub async fn extract(
    file: &InputFile,
    config: &PipelineConfig,
) -> Result<ParsedDocument, DocLexError> {
    let file_type = validate_mime(file)?;
    let name = file.name.clone();
    let bytes = file.bytes.clone();
    let lib_path = config.pdfium_lib_path.clone();

    let extracted = tokio::task::spawn_blocking(move || match file_type {
        FileType::Pdf => extract_pdf_blocking(&name, &bytes, lib_path.as_deref()),
        FileType::Docx => extract_docx_blocking(&name, &bytes),
    })
    .await
    .map_err(|e| DocLexError::Internal(format!("Extraction task panicked: {}", e)))??;

    let doc = ParsedDocument {
        text: extracted.text,
        word_count: extracted.word_count,
        page_count: extracted.page_count,
        pages_read: extracted.pages_read,
        file_name: file.name.clone(),
        file_type,
        file_size: format_file_size(file.bytes.len() as u64),
    };
    info!(
        "Extracted {}: {} words, {} pages ({})",
        doc.file_name, doc.word_count, doc.page_count, doc.file_size
    );
    Ok(doc)
}

/// The warning a run should raise for `doc`, if any.
pub fn word_limit_warning(doc: &ParsedDocument) -> Option<PipelineWarning> {
    (doc.word_count >= MAX_WORDS).then_some(PipelineWarning::WordLimitReached {
        limit: MAX_WORDS,
        word_count: doc.word_count,
    })
}

/// Human-readable file size: `"512 B"`, `"1.5 KB"`, `"2.00 MB"`.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    }
}

/// Whitespace-delimited token count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// The first `limit` whitespace-delimited tokens joined by single spaces.
pub fn truncate_words(text: &str, limit: usize) -> String {
    text.split_whitespace()
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Intermediate result shared by both extractors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub word_count: usize,
    pub page_count: usize,
    pub pages_read: Option<usize>,
}

/// Text accumulated from a lazy sequence of pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatedPages {
    /// Trimmed, capped text.
    pub text: String,
    pub word_count: usize,
    /// Pages pulled from the iterator.
    pub pages_read: usize,
    /// True when reading stopped because the word cap was hit.
    pub truncated: bool,
}

/// Append pages separated by a blank line until the iterator ends or the
/// running word count reaches `max_words`.
///
/// On reaching the cap the text is cut to exactly `max_words` tokens joined
/// by single spaces and no further page is pulled. The first page error
/// aborts the whole accumulation.
pub fn accumulate_pages<I>(pages: I, max_words: usize) -> Result<AccumulatedPages, DocLexError>
where
    I: IntoIterator<Item = Result<String, DocLexError>>,
{
    let mut text = String::new();
    let mut running = 0usize;
    let mut pages_read = 0usize;
    let mut truncated = false;

    for page in pages {
        let page = page?;
        pages_read += 1;
        running += count_words(&page);
        text.push_str(&page);
        text.push_str("\n\n");

        if running >= max_words {
            text = truncate_words(&text, max_words);
            truncated = true;
            debug!("Word cap reached after {} pages", pages_read);
            break;
        }
    }

    let text = text.trim().to_string();
    Ok(AccumulatedPages {
        word_count: count_words(&text),
        text,
        pages_read,
        truncated,
    })
}

// ── PDF ──────────────────────────────────────────────────────────────────

fn extract_pdf_blocking(
    name: &str,
    bytes: &[u8],
    lib_path: Option<&Path>,
) -> Result<Extracted, DocLexError> {
    let pdfium = bind_pdfium(lib_path)?;

    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            DocLexError::PasswordRequired {
                file_name: name.to_string(),
            }
        } else {
            DocLexError::CorruptPdf {
                file_name: name.to_string(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let page_text = |idx: usize| -> Result<String, DocLexError> {
        let page = pages.get(idx as u16).map_err(|e| DocLexError::CorruptPdf {
            file_name: name.to_string(),
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        let text = page.text().map_err(|e| DocLexError::CorruptPdf {
            file_name: name.to_string(),
            detail: format!("page {} text: {:?}", idx + 1, e),
        })?;
        let all = text.all();
        Ok(all)
    };

    let acc = accumulate_pages(
        (0..total_pages.min(MAX_PDF_PAGES)).map(page_text),
        MAX_WORDS,
    )?;
    debug!(
        "Scanned {}/{} pages, {} words{}",
        acc.pages_read,
        total_pages,
        acc.word_count,
        if acc.truncated { " (capped)" } else { "" }
    );

    Ok(Extracted {
        text: acc.text,
        word_count: acc.word_count,
        page_count: total_pages,
        pages_read: Some(acc.pages_read),
    })
}

/// Bind pdfium from the configured path, then `PDFIUM_LIB_PATH`, then the
/// system library. Either path may point at the library file or at the
/// directory containing it.
fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, DocLexError> {
    let explicit = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => {
            let path = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", path.display());
            Pdfium::bind_to_library(&path)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| DocLexError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

// ── DOCX ─────────────────────────────────────────────────────────────────

fn extract_docx_blocking(name: &str, bytes: &[u8]) -> Result<Extracted, DocLexError> {
    let raw = docx_raw_text(name, bytes)?;
    let mut text = raw.trim().to_string();
    if count_words(&text) > MAX_WORDS {
        text = truncate_words(&text, MAX_WORDS);
    }
    let word_count = count_words(&text).min(MAX_WORDS);

    Ok(Extracted {
        text,
        word_count,
        page_count: word_count.div_ceil(WORDS_PER_PAGE),
        pages_read: None,
    })
}

/// Raw text of `word/document.xml`: paragraphs separated by a blank line,
/// `w:tab` as a tab, `w:br`/`w:cr` as a newline.
pub fn docx_raw_text(name: &str, bytes: &[u8]) -> Result<String, DocLexError> {
    let corrupt = |detail: String| DocLexError::CorruptDocx {
        file_name: name.to_string(),
        detail,
    };

    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(format!("not a zip archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| corrupt(format!("word/document.xml: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| corrupt(format!("word/document.xml: {}", e)))?;

    let doc = roxmltree::Document::parse(&xml).map_err(|e| corrupt(format!("malformed XML: {}", e)))?;

    let paragraphs: Vec<String> = doc
        .descendants()
        .filter(|n| is_tag(n, "p") && !in_fallback(n))
        .map(|p| {
            let mut out = String::new();
            for n in p.descendants().skip(1) {
                // Text boxes nest paragraphs; those are emitted on their own.
                let owner = n.ancestors().find(|a| is_tag(a, "p"));
                if owner != Some(p) {
                    continue;
                }
                match n.tag_name().name() {
                    "t" if n.is_element() => out.push_str(n.text().unwrap_or_default()),
                    "tab" if n.is_element() => out.push('\t'),
                    "br" | "cr" if n.is_element() => out.push('\n'),
                    _ => {}
                }
            }
            out
        })
        .collect();

    Ok(paragraphs.join("\n\n"))
}

fn is_tag(n: &roxmltree::Node<'_, '_>, tag: &str) -> bool {
    n.is_element() && n.tag_name().name() == tag
}

const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

/// True inside the `mc:Fallback` branch of an `mc:AlternateContent`; Word
/// writes text boxes twice (`mc:Choice` and `mc:Fallback`) and only the
/// first copy is read.
fn in_fallback(n: &roxmltree::Node<'_, '_>) -> bool {
    n.ancestors().any(|a| {
        a.is_element() && a.tag_name().name() == "Fallback" && a.tag_name().namespace() == Some(MC_NS)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn docx_bytes(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" xmlns:wps="http://schemas.microsoft.com/office/word/2010/wordprocessingShape" xmlns:v="urn:schemas-microsoft-com:vml"><w:body>{body}</w:body></w:document>"#
        );
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let opts = zip::write::SimpleFileOptions::default();
            zip.start_file("word/document.xml", opts).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn file_size_formatting() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 + 512 * 1024), "5.50 MB");
    }

    #[test]
    fn truncate_joins_with_single_spaces() {
        assert_eq!(truncate_words("a\n\nb\tc  d", 3), "a b c");
        assert_eq!(truncate_words("a b", 10), "a b");
    }

    #[test]
    fn pages_separated_by_blank_line() {
        let pages = vec![Ok("first page".to_string()), Ok("second".to_string())];
        let acc = accumulate_pages(pages, MAX_WORDS).unwrap();
        assert_eq!(acc.text, "first page\n\nsecond");
        assert_eq!(acc.word_count, 3);
        assert_eq!(acc.pages_read, 2);
        assert!(!acc.truncated);
    }

    #[test]
    fn cap_stops_pulling_pages() {
        let pulled = AtomicUsize::new(0);
        let pages = (0..10).map(|_| {
            pulled.fetch_add(1, Ordering::SeqCst);
            Ok(words(30))
        });
        let acc = accumulate_pages(pages, 100).unwrap();
        assert_eq!(acc.word_count, 100);
        assert_eq!(acc.pages_read, 4);
        assert!(acc.truncated);
        assert_eq!(pulled.load(Ordering::SeqCst), 4);
        assert!(!acc.text.contains('\n'));
    }

    #[test]
    fn exact_cap_counts_as_reached() {
        let acc = accumulate_pages(vec![Ok(words(50))], 50).unwrap();
        assert!(acc.truncated);
        assert_eq!(acc.word_count, 50);
    }

    #[test]
    fn page_error_aborts() {
        let pages = vec![
            Ok("one".to_string()),
            Err(DocLexError::CorruptPdf {
                file_name: "x.pdf".into(),
                detail: "bad page".into(),
            }),
        ];
        assert!(matches!(
            accumulate_pages(pages, MAX_WORDS),
            Err(DocLexError::CorruptPdf { .. })
        ));
    }

    #[test]
    fn docx_text_structure() {
        let bytes = docx_bytes(
            r#"<w:p><w:r><w:t>Cláusula</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve"> primeira</w:t></w:r></w:p>
<w:p><w:r><w:t>linha</w:t><w:br/><w:t>quebrada</w:t></w:r></w:p>"#,
        );
        let text = docx_raw_text("a.docx", &bytes).unwrap();
        assert_eq!(text, "Cláusula\t primeira\n\nlinha\nquebrada");
    }

    #[test]
    fn docx_text_box_read_once() {
        let bytes = docx_bytes(
            r#"<w:p><w:r><w:t>Antes</w:t></w:r><w:r><mc:AlternateContent><mc:Choice Requires="wps"><w:drawing><wps:txbx><w:txbxContent><w:p><w:r><w:t>Caixa de texto</w:t></w:r></w:p></w:txbxContent></wps:txbx></w:drawing></mc:Choice><mc:Fallback><w:pict><v:textbox><w:txbxContent><w:p><w:r><w:t>Caixa de texto</w:t></w:r></w:p></w:txbxContent></v:textbox></w:pict></mc:Fallback></mc:AlternateContent></w:r></w:p>"#,
        );
        let text = docx_raw_text("a.docx", &bytes).unwrap();
        assert_eq!(text, "Antes\n\nCaixa de texto");
        assert_eq!(text.matches("Caixa de texto").count(), 1);

        let extracted = extract_docx_blocking("a.docx", &bytes).unwrap();
        assert_eq!(extracted.word_count, 4);
    }

    #[test]
    fn docx_at_exact_cap_keeps_paragraphs() {
        let half = MAX_WORDS / 2;
        let body = format!(
            "<w:p><w:r><w:t>{}</w:t></w:r></w:p><w:p><w:r><w:t>{}</w:t></w:r></w:p>",
            words(half),
            words(half)
        );
        let exact = extract_docx_blocking("a.docx", &docx_bytes(&body)).unwrap();
        assert_eq!(exact.word_count, MAX_WORDS);
        assert!(exact.text.contains("\n\n"));
    }

    #[test]
    fn docx_page_estimate_and_cap() {
        let small = extract_docx_blocking("a.docx", &docx_bytes(&format!(
            "<w:p><w:r><w:t>{}</w:t></w:r></w:p>",
            words(501)
        )))
        .unwrap();
        assert_eq!(small.word_count, 501);
        assert_eq!(small.page_count, 2);
        assert_eq!(small.pages_read, None);

        let big = extract_docx_blocking("b.docx", &docx_bytes(&format!(
            "<w:p><w:r><w:t>{}</w:t></w:r></w:p>",
            words(MAX_WORDS + 10)
        )))
        .unwrap();
        assert_eq!(big.word_count, MAX_WORDS);
        assert_eq!(big.page_count, 100);
        assert_eq!(count_words(&big.text), MAX_WORDS);
    }

    #[test]
    fn docx_without_main_part_is_corrupt() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = docx_raw_text("a.docx", &buf.into_inner()).unwrap_err();
        assert!(matches!(err, DocLexError::CorruptDocx { .. }));
        let err = docx_raw_text("a.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, DocLexError::CorruptDocx { .. }));
    }

    #[test]
    fn warning_only_at_cap() {
        let mut doc = ParsedDocument {
            text: String::new(),
            word_count: MAX_WORDS - 1,
            page_count: 1,
            pages_read: None,
            file_name: "a.docx".into(),
            file_type: FileType::Docx,
            file_size: "1 B".into(),
        };
        assert!(word_limit_warning(&doc).is_none());
        doc.word_count = MAX_WORDS;
        assert!(word_limit_warning(&doc).is_some());
    }

    #[tokio::test]
    async fn extract_rejects_unsupported_mime() {
        let f = InputFile::from_bytes("a.txt", "text/plain", b"hello".to_vec());
        let err = extract(&f, &PipelineConfig::default()).await.unwrap_err();
        assert!(matches!(err, DocLexError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn extract_docx_is_deterministic() {
        let bytes = docx_bytes("<w:p><w:r><w:t>Autor: Fulano</w:t></w:r></w:p>");
        let f = InputFile::from_bytes("p.docx", FileType::DOCX_MIME, bytes);
        let config = PipelineConfig::default();
        let a = extract(&f, &config).await.unwrap();
        let b = extract(&f, &config).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.text, "Autor: Fulano");
        assert_eq!(a.word_count, 2);
        assert_eq!(a.page_count, 1);
        assert_eq!(a.file_type, FileType::Docx);
    }
}
