//! Analysis dispatch: turn a parsed document and the run's options into one
//! backend call.
//!
//! [`AnalysisRequest`] is the wire-level description of a run, the same body
//! a hosted analysis endpoint receives. [`build_backend_request`] turns it
//! into the prompts and concrete model the [`AnalysisBackend`] needs.

use crate::config::{AnalysisMode, AnalysisOptions, ModelChoice};
use crate::error::DocLexError;
use crate::output::{FileType, ParsedDocument};
use crate::pipeline::backend::{AnalysisBackend, BackendRequest};
use crate::prompts;
use crate::templates::ColorScheme;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Everything the backend needs to know about a run.
///
/// Serialises to `{text, fileName, fileType, wordCount, fileSize, model}`
/// plus, in visual mode, `{templateId, templateCss, templateColors, mode}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub text: String,
    pub file_name: String,
    /// Declared MIME type of the source file.
    pub file_type: String,
    pub word_count: usize,
    pub file_size: String,
    /// Logical model name.
    pub model: String,
    #[serde(skip_serializing_if = "is_json_mode", default)]
    pub mode: AnalysisMode,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub template_css: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub template_colors: Option<ColorScheme>,
}

fn is_json_mode(mode: &AnalysisMode) -> bool {
    *mode == AnalysisMode::Json
}

impl AnalysisRequest {
    /// Build the request for `doc` under `options`.
    ///
    /// Template fields are only carried in visual mode.
    pub fn new(doc: &ParsedDocument, options: &AnalysisOptions) -> Self {
        let model = options.model_choice();
        let visual = options.mode == AnalysisMode::Visual;
        Self {
            text: doc.text.clone(),
            file_name: doc.file_name.clone(),
            file_type: doc.file_type.mime().to_string(),
            word_count: doc.word_count,
            file_size: doc.file_size.clone(),
            model: model.as_str().to_string(),
            mode: options.mode,
            template_id: options.template_id.clone().filter(|_| visual),
            template_css: options.template_css.clone().filter(|_| visual),
            template_colors: visual.then(|| options.colors()),
        }
    }

    pub fn model_choice(&self) -> ModelChoice {
        ModelChoice::from_name(&self.model)
    }

    fn document(&self) -> ParsedDocument {
        ParsedDocument {
            text: self.text.clone(),
            word_count: self.word_count,
            page_count: 0,
            pages_read: None,
            file_name: self.file_name.clone(),
            file_type: FileType::from_mime(&self.file_type).unwrap_or(FileType::Pdf),
            file_size: self.file_size.clone(),
        }
    }
}

/// Prompts and concrete model for `request`.
pub fn build_backend_request(request: &AnalysisRequest) -> BackendRequest {
    let doc = request.document();
    let (system_prompt, user_prompt) = match request.mode {
        AnalysisMode::Json => (
            prompts::json_system_prompt(&request.file_size, request.word_count),
            prompts::json_user_prompt(&doc),
        ),
        AnalysisMode::Visual => (
            prompts::visual_system_prompt(&request.template_colors.clone().unwrap_or_default()),
            prompts::visual_user_prompt(&doc),
        ),
    };
    BackendRequest {
        system_prompt,
        user_prompt,
        model: request.model_choice().backend_model().to_string(),
        analysis: request.clone(),
    }
}

/// Sends one request per run to the configured backend.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn AnalysisBackend>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Dispatch `doc` and return the raw reply text. Never retries.
    pub async fn dispatch(
        &self,
        doc: &ParsedDocument,
        options: &AnalysisOptions,
    ) -> Result<String, DocLexError> {
        let request = AnalysisRequest::new(doc, options);
        let backend_request = build_backend_request(&request);
        info!(
            "Dispatching {} ({} words) to {} as {} [{}]",
            request.file_name,
            request.word_count,
            self.backend.name(),
            backend_request.model,
            request.mode
        );

        let start = Instant::now();
        let raw = self.backend.complete(&backend_request).await?;
        debug!(
            "Backend replied with {} chars in {:?}",
            raw.len(),
            start.elapsed()
        );
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn doc() -> ParsedDocument {
        ParsedDocument {
            text: "Art. 5º da Constituição.".into(),
            word_count: 4,
            page_count: 1,
            pages_read: Some(1),
            file_name: "peticao.pdf".into(),
            file_type: FileType::Pdf,
            file_size: "2.0 KB".into(),
        }
    }

    #[test]
    fn json_request_wire_shape() {
        let req = AnalysisRequest::new(&doc(), &AnalysisOptions::json("gemini-pro"));
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["fileName"], "peticao.pdf");
        assert_eq!(v["fileType"], "application/pdf");
        assert_eq!(v["wordCount"], 4);
        assert_eq!(v["fileSize"], "2.0 KB");
        assert_eq!(v["model"], "gemini-pro");
        for absent in ["mode", "templateId", "templateCss", "templateColors"] {
            assert!(v.get(absent).is_none(), "{absent} should be absent");
        }
    }

    #[test]
    fn visual_request_carries_template() {
        let opts = AnalysisOptions::visual("gpt-5")
            .with_template("contrato")
            .with_template_css(".doc { color: red }");
        let v = serde_json::to_value(AnalysisRequest::new(&doc(), &opts)).unwrap();
        assert_eq!(v["mode"], "visual");
        assert_eq!(v["templateId"], "contrato");
        assert_eq!(v["templateCss"], ".doc { color: red }");
        assert_eq!(v["templateColors"]["primary"], "#2c5282");
    }

    #[test]
    fn json_mode_drops_template_fields() {
        let opts = AnalysisOptions::json("gpt-5").with_template("contrato");
        let req = AnalysisRequest::new(&doc(), &opts);
        assert!(req.template_id.is_none());
        assert!(req.template_colors.is_none());
    }

    #[test]
    fn unknown_model_maps_to_default_backend_model() {
        let req = AnalysisRequest::new(&doc(), &AnalysisOptions::json("claude-9"));
        assert_eq!(req.model, "gemini-flash");
        assert_eq!(build_backend_request(&req).model, "google/gemini-2.5-flash");
    }

    #[test]
    fn prompts_follow_mode() {
        let json = build_backend_request(&AnalysisRequest::new(&doc(), &AnalysisOptions::json("gpt-5")));
        assert!(json.system_prompt.contains("\"2.0 KB\""));
        assert!(json.user_prompt.contains("Art. 5º"));
        assert_eq!(json.model, "openai/gpt-5");

        let visual = build_backend_request(&AnalysisRequest::new(
            &doc(),
            &AnalysisOptions::visual("gpt-5-mini").with_template("procuracao"),
        ));
        assert!(visual.system_prompt.contains("#4527a0"));
        assert!(visual.system_prompt.contains("elementsFound"));
        assert_eq!(visual.model, "openai/gpt-5-mini");
    }

    struct Recording {
        seen: Mutex<Vec<BackendRequest>>,
    }

    #[async_trait::async_trait]
    impl AnalysisBackend for Recording {
        fn name(&self) -> &str {
            "recording"
        }
        async fn complete(&self, request: &BackendRequest) -> Result<String, DocLexError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok("{\"ok\":true}".into())
        }
    }

    #[tokio::test]
    async fn dispatch_makes_exactly_one_call() {
        let backend = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher = Dispatcher::new(backend.clone());
        let raw = dispatcher
            .dispatch(&doc(), &AnalysisOptions::json("gemini-flash"))
            .await
            .unwrap();
        assert_eq!(raw, "{\"ok\":true}");
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "google/gemini-2.5-flash");
    }
}
