//! Visual output: assemble a [`VisualResult`] into a standalone HTML file.
//!
//! The document is self-contained: the generated CSS is inlined in a
//! `<style>` block, the generated markup becomes the body and nothing is
//! fetched from the network, so the file can be opened, mailed or printed
//! as-is.

use crate::error::DocLexError;
use crate::output::VisualResult;
use std::path::Path;
use tracing::info;

/// Default file name of the downloaded document.
pub const HTML_FILE_NAME: &str = "documento-visual-law.html";

/// Wrap `result` in a complete HTML document.
pub fn assemble_html(result: &VisualResult) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Documento Visual Law</title>
  <style>
{css}
  </style>
</head>
<body>
{html}
</body>
</html>
"#,
        css = result.css,
        html = result.html
    )
}

/// Write `contents` to `path` atomically (temp file + rename), creating
/// parent directories as needed.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), DocLexError> {
    let write_err = |e: std::io::Error| DocLexError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Assemble `result` and write it to `path`.
pub async fn write_html(result: &VisualResult, path: &Path) -> Result<(), DocLexError> {
    let html = assemble_html(result);
    write_atomic(path, &html).await?;
    info!("Wrote {} ({} bytes)", path.display(), html.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> VisualResult {
        VisualResult {
            html: "<h1>Contrato</h1>".into(),
            css: "h1 { color: #2c5282; }".into(),
            summary: "s".into(),
            elements_found: vec!["titulos".into()],
        }
    }

    #[test]
    fn document_structure() {
        let html = assemble_html(&result());
        assert!(html.starts_with("<!DOCTYPE html>\n<html lang=\"pt-BR\">"));
        assert!(html.contains("<title>Documento Visual Law</title>"));
        assert!(html.contains("<style>\nh1 { color: #2c5282; }\n  </style>"));
        assert!(html.contains("<body>\n<h1>Contrato</h1>\n</body>"));
        assert!(html.trim_end().ends_with("</html>"));
        assert!(!html.contains("<link"));
        assert!(!html.contains("http"));
    }

    #[tokio::test]
    async fn write_creates_dirs_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join(HTML_FILE_NAME);
        write_html(&result(), &path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, assemble_html(&result()));
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from(HTML_FILE_NAME)]);
    }
}
