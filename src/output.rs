//! Output types returned by a run.
//!
//! [`ParsedDocument`] is what extraction produced, [`AnalysisResult`] is the
//! normalised backend reply and [`RunOutput`] bundles both with the stage
//! timings and any warnings. All types serialise to camelCase JSON so a
//! front-end can consume them directly.

use crate::error::PipelineWarning;
use crate::stages::ProcessingStage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The two document formats the extractor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
}

impl FileType {
    pub const PDF_MIME: &'static str = "application/pdf";
    pub const DOCX_MIME: &'static str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    /// Map a declared MIME type onto a supported format. Only the two exact
    /// MIME strings are accepted.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            Self::PDF_MIME => Some(FileType::Pdf),
            Self::DOCX_MIME => Some(FileType::Docx),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            FileType::Pdf => Self::PDF_MIME,
            FileType::Docx => Self::DOCX_MIME,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text extracted from an uploaded document.
///
/// Immutable once built; a new file selection discards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDocument {
    /// Trimmed text, capped at the word limit.
    pub text: String,
    /// Whitespace-delimited token count of `text`.
    pub word_count: usize,
    /// PDF: true page count of the file. DOCX: estimated from the word count.
    pub page_count: usize,
    /// PDF only: pages actually scanned.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pages_read: Option<usize>,
    pub file_name: String,
    pub file_type: FileType,
    /// Human-readable size, e.g. `"1.5 KB"`.
    pub file_size: String,
}

/// Structured legal analysis (json mode).
///
/// Kept as the raw JSON object the backend produced; the pipeline never
/// rewrites it. Use [`StructuredResult::analysis`] for a typed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredResult(pub Map<String, Value>);

impl StructuredResult {
    /// Top-level keys every well-formed analysis carries.
    pub const EXPECTED_FIELDS: &'static [&'static str] = &["documento", "status_ia"];

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Expected top-level keys that are absent.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        Self::EXPECTED_FIELDS
            .iter()
            .copied()
            .filter(|k| !self.0.contains_key(*k))
            .collect()
    }

    /// Typed, lenient view of the `documento` object.
    ///
    /// Fields that are missing or of the wrong shape come back empty rather
    /// than failing. Returns `None` only when there is no `documento` object.
    pub fn analysis(&self) -> Option<LegalAnalysis> {
        let doc = self.0.get("documento")?.as_object()?;
        let mut analysis = LegalAnalysis {
            status: self
                .0
                .get("status_ia")
                .and_then(Value::as_str)
                .map(str::to_string),
            ..Default::default()
        };
        analysis.category = doc
            .get("categoria_ia")
            .and_then(Value::as_str)
            .map(str::to_string);
        analysis.file_name = doc
            .get("nome_arquivo")
            .and_then(Value::as_str)
            .map(str::to_string);
        analysis.entities = list(doc, "entidade_juridica");
        analysis.law_citations = list(doc, "citacoes_de_lei");
        analysis.suggestions = list(doc, "sugestoes_analise");
        analysis.charts = list(doc, "grafico");
        analysis.infographics = list(doc, "infografico");
        analysis.timeline = list(doc, "timeline");
        analysis.citations = list(doc, "citacoes");
        analysis.highlights = list(doc, "destaque");
        Some(analysis)
    }
}

/// Deserialize each array element independently, skipping malformed ones.
fn list<T: serde::de::DeserializeOwned>(doc: &Map<String, Value>, key: &str) -> Vec<T> {
    doc.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Read-only typed view of a json-mode result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalAnalysis {
    pub status: Option<String>,
    pub category: Option<String>,
    pub file_name: Option<String>,
    pub entities: Vec<LegalEntity>,
    pub law_citations: Vec<LawCitation>,
    pub suggestions: Vec<Suggestion>,
    pub charts: Vec<Chart>,
    pub infographics: Vec<Infographic>,
    pub timeline: Vec<Timeline>,
    pub citations: Vec<Passage>,
    pub highlights: Vec<Passage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalEntity {
    #[serde(rename = "classificacao")]
    pub classification: String,
    #[serde(rename = "nome")]
    pub name: String,
    pub cpf: String,
    pub cnpj: String,
    #[serde(rename = "endereco")]
    pub address: String,
    #[serde(rename = "paragrafo")]
    pub paragraph: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LawCitation {
    #[serde(rename = "titulo_lei")]
    pub law_title: String,
    #[serde(rename = "artigo")]
    pub article: String,
    #[serde(rename = "resumo")]
    pub summary: String,
    #[serde(rename = "paragrafo")]
    pub paragraph: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Suggestion {
    #[serde(rename = "id_paragrafo")]
    pub paragraph_id: String,
    #[serde(rename = "paragrafo")]
    pub paragraph: String,
    #[serde(rename = "sugestoes")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chart {
    #[serde(rename = "paragrafo")]
    pub paragraph: String,
    #[serde(rename = "eixoX")]
    pub x_axis: String,
    #[serde(rename = "eixoY")]
    pub y_axis: String,
    #[serde(rename = "valores_eixoX")]
    pub x_values: Vec<Value>,
    #[serde(rename = "valores_eixoY")]
    pub y_values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Infographic {
    #[serde(rename = "paragrafo")]
    pub paragraph: String,
    #[serde(rename = "dados")]
    pub data: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeline {
    #[serde(rename = "paragrafo")]
    pub paragraph: String,
    #[serde(rename = "fatos")]
    pub events: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineEvent {
    #[serde(rename = "data")]
    pub date: String,
    #[serde(rename = "evento")]
    pub event: String,
    #[serde(rename = "icone")]
    pub icon: String,
}

/// A quoted or highlighted paragraph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Passage {
    #[serde(rename = "paragrafo")]
    pub paragraph: String,
}

/// Visual rendition (visual mode). All four fields are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualResult {
    pub html: String,
    pub css: String,
    pub summary: String,
    pub elements_found: Vec<String>,
}

/// A normalised backend reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Visual(VisualResult),
    Structured(StructuredResult),
}

impl AnalysisResult {
    pub fn as_visual(&self) -> Option<&VisualResult> {
        match self {
            AnalysisResult::Visual(v) => Some(v),
            AnalysisResult::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&StructuredResult> {
        match self {
            AnalysisResult::Structured(s) => Some(s),
            AnalysisResult::Visual(_) => None,
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub document: ParsedDocument,
    pub result: AnalysisResult,
    pub stages: Vec<ProcessingStage>,
    pub warnings: Vec<PipelineWarning>,
    pub total_duration_ms: u64,
}
