//! Response normalisation: coerce free-form model output into a result of a
//! guaranteed shape.
//!
//! ## Why several strategies?
//!
//! Even when told to "reply with JSON only", models regularly wrap the object
//! in a ```` ```json ```` fence or put a sentence before it. Rather than
//! rejecting those replies, the normaliser tries, in order:
//!
//! 1. the whole reply as JSON;
//! 2. the interior of the first fenced block;
//! 3. the span from the first `{` to the last `}`.
//!
//! A strategy that parses to something other than an object (an array, a
//! bare string) counts as a miss. When every strategy misses the reply is
//! [`DocLexError::UnparsableResponse`].
//!
//! ## Visual defaults
//!
//! A visual result always carries `html`, `css`, `summary` and
//! `elementsFound`. Fields the model omitted, nulled or mistyped are filled in
//! here so nothing downstream has to cope with a partial result.

use crate::config::AnalysisMode;
use crate::error::DocLexError;
use crate::output::{AnalysisResult, StructuredResult, VisualResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Placeholder body used when the model returned no `html`.
pub const DEFAULT_VISUAL_HTML: &str =
    r#"<div class="processing-error"><p>Não foi possível gerar o conteúdo visual deste documento.</p></div>"#;

/// Placeholder summary used when the model returned no `summary`.
pub const DEFAULT_VISUAL_SUMMARY: &str = "Documento visual gerado a partir do texto enviado.";

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?i:json)?\s*(.*?)```").unwrap());

type Strategy = fn(&str) -> Option<Map<String, Value>>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("fenced", parse_fenced),
    ("braces", parse_braces),
];

/// Parse `raw` into the result shape of `mode`.
///
/// `template_css` (visual mode only) is prepended to the generated CSS so the
/// template loads first and generated rules can override it.
pub fn normalize(
    raw: &str,
    mode: AnalysisMode,
    template_css: Option<&str>,
) -> Result<AnalysisResult, DocLexError> {
    let object = extract_object(raw)?;
    Ok(match mode {
        AnalysisMode::Json => {
            let result = StructuredResult(object);
            let missing = result.missing_fields();
            if !missing.is_empty() {
                warn!("Analysis is missing top-level fields: {}", missing.join(", "));
            }
            AnalysisResult::Structured(result)
        }
        AnalysisMode::Visual => AnalysisResult::Visual(shape_visual(object, template_css)),
    })
}

/// Run the strategies in order and return the first JSON object found.
pub fn extract_object(raw: &str) -> Result<Map<String, Value>, DocLexError> {
    for (name, strategy) in STRATEGIES {
        if let Some(object) = strategy(raw) {
            debug!("Parsed backend reply with the {} strategy", name);
            return Ok(object);
        }
    }
    Err(DocLexError::UnparsableResponse {
        preview: raw.chars().take(120).collect(),
    })
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_direct(raw: &str) -> Option<Map<String, Value>> {
    as_object(raw)
}

fn parse_fenced(raw: &str) -> Option<Map<String, Value>> {
    let caps = RE_FENCE.captures(raw)?;
    as_object(caps.get(1)?.as_str())
}

fn parse_braces(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    as_object(&raw[start..=end])
}

/// Fill the four visual fields, defaulting whatever is missing or mistyped.
fn shape_visual(mut object: Map<String, Value>, template_css: Option<&str>) -> VisualResult {
    let mut take_str = |key: &str| match object.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    };

    let html = take_str("html").unwrap_or_else(|| DEFAULT_VISUAL_HTML.to_string());
    let css = take_str("css").unwrap_or_default();
    let summary = take_str("summary")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VISUAL_SUMMARY.to_string());
    let elements_found = match object.remove("elementsFound") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let css = match template_css.filter(|t| !t.trim().is_empty()) {
        Some(template) if css.is_empty() => template.to_string(),
        Some(template) => format!("{template}\n\n{css}"),
        None => css,
    };

    VisualResult {
        html,
        css,
        summary,
        elements_found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn visual(raw: &str) -> VisualResult {
        match normalize(raw, AnalysisMode::Visual, None).unwrap() {
            AnalysisResult::Visual(v) => v,
            other => panic!("expected visual, got {other:?}"),
        }
    }

    #[test]
    fn direct_parse() {
        let obj = extract_object(r#"{"a": 1}"#).unwrap();
        assert_eq!(obj["a"], 1);
    }

    #[test]
    fn fenced_parse() {
        let raw = "Here is the result:\n```json\n{\"html\":\"<p>ok</p>\"}\n```";
        let v = visual(raw);
        assert_eq!(v.html, "<p>ok</p>");
        assert_eq!(v.css, "");
        assert_eq!(v.summary, DEFAULT_VISUAL_SUMMARY);
        assert!(v.elements_found.is_empty());
    }

    #[test]
    fn untagged_and_uppercase_fences() {
        assert_eq!(extract_object("```\n{\"a\":2}\n```").unwrap()["a"], 2);
        assert_eq!(extract_object("```JSON\n{\"a\":3}```").unwrap()["a"], 3);
    }

    #[test]
    fn prose_wrapped_object() {
        let raw = "Sure! {\"documento\": {\"categoria_ia\": \"Contrato\"}} Hope this helps.";
        let obj = extract_object(raw).unwrap();
        assert_eq!(obj["documento"]["categoria_ia"], "Contrato");
    }

    #[test]
    fn broken_fence_falls_through_to_braces() {
        let raw = "```json\nnot json\n``` but later {\"a\": 1}";
        let obj = extract_object(raw).unwrap();
        assert_eq!(obj["a"], 1);
    }

    #[test]
    fn non_object_json_is_a_miss() {
        assert!(matches!(
            extract_object("[1, 2, 3]"),
            Err(DocLexError::UnparsableResponse { .. })
        ));
        assert!(matches!(
            extract_object("\"just a string\""),
            Err(DocLexError::UnparsableResponse { .. })
        ));
    }

    #[test]
    fn prose_without_braces_is_unparsable() {
        let err = extract_object("Sorry, I cannot help with that.").unwrap_err();
        match err {
            DocLexError::UnparsableResponse { preview } => assert!(preview.starts_with("Sorry")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn closing_brace_before_opening_is_unparsable() {
        assert!(extract_object("} nothing {").is_err());
    }

    #[test]
    fn visual_defaults_for_null_and_mistyped_fields() {
        let v = visual(r#"{"html": null, "css": 42, "summary": "", "elementsFound": "timeline"}"#);
        assert_eq!(v.html, DEFAULT_VISUAL_HTML);
        assert_eq!(v.css, "");
        assert_eq!(v.summary, DEFAULT_VISUAL_SUMMARY);
        assert!(v.elements_found.is_empty());
    }

    #[test]
    fn visual_keeps_string_elements_in_order() {
        let v = visual(r#"{"html":"<p/>","css":"p{}","summary":"s","elementsFound":["timeline",3,"tabela"]}"#);
        assert_eq!(v.elements_found, vec!["timeline", "tabela"]);
        assert_eq!(v.summary, "s");
    }

    #[test]
    fn template_css_is_prepended() {
        let r = normalize(
            r#"{"html":"<p/>","css":".gen{color:red}"}"#,
            AnalysisMode::Visual,
            Some(".tpl{color:blue}"),
        )
        .unwrap();
        assert_eq!(r.as_visual().unwrap().css, ".tpl{color:blue}\n\n.gen{color:red}");

        let r = normalize(r#"{"html":"<p/>"}"#, AnalysisMode::Visual, Some(".tpl{}")).unwrap();
        assert_eq!(r.as_visual().unwrap().css, ".tpl{}");
    }

    #[test]
    fn json_mode_returns_object_untouched() {
        let raw = json!({"documento": {"id": 7}, "extra": [1]}).to_string();
        let r = normalize(&raw, AnalysisMode::Json, Some(".ignored{}")).unwrap();
        let s = r.as_structured().unwrap();
        assert_eq!(s.as_map()["documento"]["id"], 7);
        assert_eq!(s.as_map()["extra"][0], 1);
        assert!(s.as_map().get("html").is_none());
    }

    #[test]
    fn round_trip_of_serialised_object() {
        let obj = json!({"k": "v", "n": [1, 2, {"x": null}]});
        let parsed = extract_object(&serde_json::to_string_pretty(&obj).unwrap()).unwrap();
        assert_eq!(Value::Object(parsed), obj);
    }
}
