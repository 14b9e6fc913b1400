//! Input resolution: turn a user-supplied path, URL or byte buffer into an
//! [`InputFile`] with a declared MIME type.
//!
//! ## Why keep the bytes in memory?
//!
//! Both extractors work from a byte slice (pdfium via
//! `load_pdf_from_byte_slice`, DOCX via a `Cursor` over the zip archive), and
//! the page/word caps keep the useful part of any document small. Holding the
//! bytes avoids temp-file cleanup and lets tests build inputs without touching
//! the file system.
//!
//! The declared MIME type is what the extractor trusts. For local files it is
//! inferred from the extension; for URLs it comes from `Content-Type`, falling
//! back to the extension of the last path segment.

use crate::error::DocLexError;
use crate::output::FileType;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// A document as handed to the pipeline: name, declared MIME type and bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

impl InputFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file. The MIME type is `mime_override` when given,
    /// otherwise inferred from the extension (empty when unknown, which
    /// [`validate_mime`] then rejects).
    pub async fn from_path(
        path: impl AsRef<Path>,
        mime_override: Option<&str>,
    ) -> Result<Self, DocLexError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DocLexError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => DocLexError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => DocLexError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_override
            .map(str::to_string)
            .or_else(|| mime_from_extension(&name).map(str::to_string))
            .unwrap_or_default();

        debug!("Read local file {} ({} bytes, {})", path.display(), bytes.len(), mime_type);
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    /// The supported format this file declares, if any.
    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_mime(&self.mime_type)
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// MIME type implied by a file name's extension.
pub fn mime_from_extension(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(FileType::PDF_MIME),
        "docx" => Some(FileType::DOCX_MIME),
        _ => None,
    }
}

/// Reject anything that is not PDF or DOCX.
pub fn validate_mime(file: &InputFile) -> Result<FileType, DocLexError> {
    file.file_type()
        .ok_or_else(|| DocLexError::UnsupportedFormat {
            file_name: file.name.clone(),
            mime_type: file.mime_type.clone(),
        })
}

/// Resolve a path or URL to an [`InputFile`].
pub async fn resolve_input(
    input: &str,
    mime_override: Option<&str>,
    timeout_secs: u64,
) -> Result<InputFile, DocLexError> {
    if is_url(input) {
        download_url(input, mime_override, timeout_secs).await
    } else {
        InputFile::from_path(PathBuf::from(input), mime_override).await
    }
}

/// Download a URL into memory.
async fn download_url(
    url: &str,
    mime_override: Option<&str>,
    timeout_secs: u64,
) -> Result<InputFile, DocLexError> {
    info!("Downloading document from: {}", url);

    let failed = |reason: String| DocLexError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocLexError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let name = extract_filename(url);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let mime_type = pick_mime(mime_override, content_type.as_deref(), &name);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            DocLexError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    info!("Downloaded {} ({} bytes, {})", name, bytes.len(), mime_type);
    Ok(InputFile {
        name,
        mime_type,
        bytes: bytes.to_vec(),
    })
}

/// Explicit override, then a supported `Content-Type`, then the extension.
///
/// Servers often send `application/octet-stream` for documents, so an
/// unsupported header does not win over a recognisable extension. Only the
/// header's media type is kept (`application/pdf; charset=binary` declares
/// `application/pdf`); the declared type itself is then matched exactly.
fn pick_mime(mime_override: Option<&str>, content_type: Option<&str>, name: &str) -> String {
    if let Some(m) = mime_override {
        return m.to_string();
    }
    let media_type = content_type.map(|ct| {
        ct.split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    });
    if let Some(ct) = media_type.as_deref().filter(|ct| FileType::from_mime(ct).is_some()) {
        return ct.to_string();
    }
    mime_from_extension(name)
        .map(str::to_string)
        .or(media_type)
        .unwrap_or_default()
}

/// Last non-empty path segment with an extension, or a generic name.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "documento".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn extension_mapping() {
        assert_eq!(mime_from_extension("a.PDF"), Some(FileType::PDF_MIME));
        assert_eq!(mime_from_extension("peticao.docx"), Some(FileType::DOCX_MIME));
        assert_eq!(mime_from_extension("notes.txt"), None);
        assert_eq!(mime_from_extension("README"), None);
    }

    #[test]
    fn validate_rejects_other_types() {
        let f = InputFile::from_bytes("a.txt", "text/plain", b"hi".to_vec());
        assert!(matches!(
            validate_mime(&f),
            Err(DocLexError::UnsupportedFormat { .. })
        ));
        let f = InputFile::from_bytes("a.pdf", FileType::PDF_MIME, Vec::<u8>::new());
        assert_eq!(validate_mime(&f).unwrap(), FileType::Pdf);
    }

    #[test]
    fn mime_precedence() {
        assert_eq!(
            pick_mime(Some("text/plain"), Some(FileType::PDF_MIME), "a.pdf"),
            "text/plain"
        );
        assert_eq!(
            pick_mime(None, Some("application/octet-stream"), "a.docx"),
            FileType::DOCX_MIME
        );
        assert_eq!(
            pick_mime(None, Some("application/pdf"), "download"),
            "application/pdf"
        );
        assert_eq!(pick_mime(None, Some("text/html"), "page"), "text/html");
        assert_eq!(
            pick_mime(None, Some("Application/PDF; charset=binary"), "download"),
            FileType::PDF_MIME
        );
    }

    #[test]
    fn declared_type_must_match_exactly() {
        let f = InputFile::from_bytes("a.pdf", "application/pdf; charset=binary", b"%PDF".to_vec());
        assert!(matches!(
            validate_mime(&f),
            Err(DocLexError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn filename_from_url() {
        assert_eq!(extract_filename("https://x.com/files/contrato.pdf"), "contrato.pdf");
        assert_eq!(extract_filename("https://x.com/files/"), "documento");
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = InputFile::from_path("/definitely/not/here.pdf", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DocLexError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_gets_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peticao.docx");
        std::fs::write(&path, b"PK").unwrap();
        let f = InputFile::from_path(&path, None).await.unwrap();
        assert_eq!(f.name, "peticao.docx");
        assert_eq!(f.mime_type, FileType::DOCX_MIME);
        assert_eq!(f.bytes, b"PK");
    }
}
