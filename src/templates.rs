//! Static catalogue of visual templates.
//!
//! A template contributes its colour scheme (and, when the caller loads it,
//! its stylesheet) to a visual-mode run. The catalogue is read-only.

use serde::{Deserialize, Serialize};

/// Colours a template asks the generated document to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub primary: String,
    pub accent: String,
    pub background: String,
}

impl ColorScheme {
    pub fn new(
        primary: impl Into<String>,
        accent: impl Into<String>,
        background: impl Into<String>,
    ) -> Self {
        Self {
            primary: primary.into(),
            accent: accent.into(),
            background: background.into(),
        }
    }
}

impl Default for ColorScheme {
    /// Neutral navy/blue scheme used when no template is selected.
    fn default() -> Self {
        Self::new("#2c3e50", "#3498db", "#ffffff")
    }
}

/// One catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub preview_url: &'static str,
    pub color_scheme: TemplateColors,
}

/// `ColorScheme` in `'static` form so the catalogue can be a `const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateColors {
    pub primary: &'static str,
    pub accent: &'static str,
    pub background: &'static str,
}

impl From<TemplateColors> for ColorScheme {
    fn from(c: TemplateColors) -> Self {
        ColorScheme::new(c.primary, c.accent, c.background)
    }
}

const fn entry(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    preview_url: &'static str,
    primary: &'static str,
    accent: &'static str,
) -> Template {
    Template {
        id,
        name,
        description,
        preview_url,
        color_scheme: TemplateColors {
            primary,
            accent,
            background: "#ffffff",
        },
    }
}

/// Every template shipped with doclex.
pub const TEMPLATES: &[Template] = &[
    entry(
        "responsabilidade",
        "Termo de Responsabilidade",
        "Modern layout with sidebar and timeline",
        "/templates/template-responsabilidade.html",
        "#132238",
        "#f5b041",
    ),
    entry(
        "contrato",
        "Contrato de Serviços",
        "Corporate design with a visual flowchart",
        "/templates/template-contrato.html",
        "#2c5282",
        "#f6ad55",
    ),
    entry(
        "procuracao",
        "Procuração",
        "Elegant, with a purple gradient header",
        "/templates/template-procuracao.html",
        "#4527a0",
        "#7c43bd",
    ),
    entry(
        "alegacoes",
        "Alegações Finais",
        "Institutional style in wine red",
        "/templates/template-alegacoes.html",
        "#591313",
        "#f2f2f2",
    ),
    entry(
        "privacidade",
        "Política de Privacidade",
        "Blue sidebar with information cards",
        "/templates/template-privacidade.html",
        "#0d1b45",
        "#3d5afe",
    ),
    entry(
        "alegacoes-finais",
        "Alegações Finais (Vinho)",
        "Wine-red design with icons and badges",
        "/templates/template-alegacoes-finais.html",
        "#591313",
        "#fcebeb",
    ),
    entry(
        "alimentos",
        "Ação de Alimentos",
        "Classic professional navy layout",
        "/templates/template-alimentos.html",
        "#0f3057",
        "#005b96",
    ),
    entry(
        "replica",
        "Réplica 360",
        "Modern design with a circular logo",
        "/templates/template-replica.html",
        "#2c3e50",
        "#16a085",
    ),
    entry(
        "civel-1",
        "Cível Consumidor I",
        "Navy sidebar with orange accents",
        "/templates/template-civel-1.html",
        "#2c3e50",
        "#e67e22",
    ),
    entry(
        "civel-2",
        "Cível Consumidor II",
        "Variation of the civil layout with sidebar",
        "/templates/template-civel-2.html",
        "#2c3e50",
        "#e67e22",
    ),
];

/// Look a template up by id.
pub fn find_template(id: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let ids: HashSet<_> = TEMPLATES.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), TEMPLATES.len());
    }

    #[test]
    fn lookup_by_id() {
        let t = find_template("contrato").expect("contrato exists");
        assert_eq!(t.color_scheme.primary, "#2c5282");
        assert!(find_template("nope").is_none());
    }

    #[test]
    fn colors_convert_to_owned_scheme() {
        let t = find_template("replica").unwrap();
        let scheme: ColorScheme = t.color_scheme.into();
        assert_eq!(scheme, ColorScheme::new("#2c3e50", "#16a085", "#ffffff"));
    }
}
