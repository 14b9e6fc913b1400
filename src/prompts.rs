//! System and user prompts for the two analysis modes.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: the schema the backend must fill and the
//!    visual element catalogue are defined exactly once.
//!
//! 2. **Testability**: unit tests inspect the prompts directly without a
//!    backend, so a dropped instruction is caught as a test failure.
//!
//! The prompts are written in Portuguese because the documents are Brazilian
//! legal texts and the generated output is meant to stay in that language.

use crate::output::ParsedDocument;
use crate::templates::ColorScheme;

/// Shape of the structured legal analysis the json mode asks for.
pub const SCHEMA_TEMPLATE: &str = r#"{
  "documento": {
    "id": number,
    "user_id": number,
    "nome_arquivo": "string",
    "tipo_arquivo": "string",
    "conteudo_texto": "HTML formatado do documento",
    "entidade_juridica": [
      {
        "classificacao": "Autor/Réu/Testemunha/etc",
        "nome": "string",
        "cpf": "string ou vazio",
        "cnpj": "string ou vazio",
        "endereco": "string",
        "paragrafo": number
      }
    ],
    "citacoes_de_lei": [
      {
        "titulo_lei": "Nome completo da lei",
        "artigo": "Artigo citado",
        "resumo": "Resumo do que dispõe",
        "paragrafo": number
      }
    ],
    "sugestoes_analise": [
      {
        "id_paragrafo": number,
        "paragrafo": "Trecho do texto",
        "sugestoes": ["sugestão 1", "sugestão 2"]
      }
    ],
    "grafico": [
      {
        "paragrafo": number,
        "eixoX": "descrição do eixo X",
        "eixoY": "descrição do eixo Y",
        "valores_eixoX": ["valor1", "valor2"],
        "valores_eixoY": [numero1, numero2]
      }
    ],
    "infografico": [
      {
        "paragrafo": number,
        "dados": [
          {
            "icone": "URL do ícone",
            "chave 1": "descrição",
            "valor 1": "valor"
          }
        ]
      }
    ],
    "timeline": [
      {
        "paragrafo": number,
        "fatos": [
          {
            "data": "YYYY-MM-DD",
            "evento": "descrição do evento",
            "icone": "URL do ícone"
          }
        ]
      }
    ],
    "citacoes": [{ "paragrafo": number }],
    "destaque": [{ "paragrafo": number }],
    "categoria_ia": "Classificação do tipo de documento jurídico",
    "created_at": "ISO date string",
    "updated_at": "ISO date string",
    "folder_id": null,
    "projeto_id": number,
    "quantidade_palavras": number,
    "quantidade_imagens": number,
    "tamanho_arquivo": "string"
  },
  "status_ia": "Processado"
}"#;

/// System prompt for json mode. Embeds the document's size and word count so
/// the backend copies them into the schema verbatim.
pub fn json_system_prompt(file_size: &str, word_count: usize) -> String {
    format!(
        r#"Você é um especialista em análise de documentos jurídicos brasileiros. Extraia informações estruturadas de petições, contratos, sentenças e demais documentos legais.

Analise o documento fornecido e preencha o seguinte schema JSON:

{SCHEMA_TEMPLATE}

REGRAS:
1. Extraia TODAS as entidades jurídicas mencionadas (partes, advogados, testemunhas etc.)
2. Identifique TODAS as citações de leis, artigos e normas
3. Sugira melhorias para os parágrafos mais relevantes
4. Havendo dados quantitativos ou temporais, crie gráficos e timelines
5. "conteudo_texto" deve conter o texto formatado em HTML
6. Use ícones placeholder no formato "https://exemplo.com/icones/[nome].png"
7. Classifique o tipo de documento em "categoria_ia"
8. Gere inteiros plausíveis para id, user_id e projeto_id
9. Datas no formato ISO (YYYY-MM-DDTHH:mm:ss.000000Z)
10. "tamanho_arquivo" deve ser "{file_size}"
11. "quantidade_palavras" deve ser {word_count}

RESPONDA APENAS COM O JSON VÁLIDO, SEM EXPLICAÇÕES ADICIONAIS."#
    )
}

/// User prompt for json mode.
pub fn json_user_prompt(doc: &ParsedDocument) -> String {
    format!(
        "Analise o seguinte documento jurídico e extraia as informações no formato JSON especificado:\n\nNome do arquivo: {}\nTipo: {}\n\n{}",
        doc.file_name,
        doc.file_type.mime(),
        doc.text
    )
}

/// Visual element kinds the backend may choose from, each with a worked
/// example. Keys double as the values expected in `elementsFound`.
pub const VISUAL_ELEMENTS: &[(&str, &str, &str)] = &[
    (
        "grafico_barras",
        "Gráfico de barras para comparar valores",
        r#"<figure class="chart"><svg viewBox="0 0 300 160" role="img"><rect x="20" y="60" width="50" height="90" fill="{primary}"/><rect x="100" y="30" width="50" height="120" fill="{accent}"/><text x="45" y="155" text-anchor="middle">2023</text><text x="125" y="155" text-anchor="middle">2024</text></svg><figcaption>Valores por ano</figcaption></figure>"#,
    ),
    (
        "grafico_pizza",
        "Gráfico de pizza para proporções",
        r#"<figure class="chart"><svg viewBox="0 0 32 32" role="img"><circle r="16" cx="16" cy="16" fill="{accent}"/><circle r="8" cx="16" cy="16" fill="transparent" stroke="{primary}" stroke-width="16" stroke-dasharray="30 50"/></svg><figcaption>60% autor / 40% réu</figcaption></figure>"#,
    ),
    (
        "grafico_linha",
        "Gráfico de linha para evolução no tempo",
        r#"<figure class="chart"><svg viewBox="0 0 300 120" role="img"><polyline points="10,100 80,70 150,80 220,30 290,20" fill="none" stroke="{primary}" stroke-width="3"/></svg><figcaption>Evolução do débito</figcaption></figure>"#,
    ),
    (
        "infografico",
        "Infográfico com ícones e números-chave",
        r#"<div class="infographic"><div class="info-item"><span class="info-icon">⚖️</span><strong>R$ 15.000,00</strong><span>Valor da causa</span></div></div>"#,
    ),
    (
        "timeline",
        "Linha do tempo de fatos datados",
        r#"<ol class="timeline"><li><time>12/03/2024</time><p>Assinatura do contrato</p></li><li><time>05/06/2024</time><p>Notificação extrajudicial</p></li></ol>"#,
    ),
    (
        "citacao",
        "Destaque de citação legal ou jurisprudencial",
        r#"<blockquote class="legal-quote"><p>"Aquele que, por ação ou omissão voluntária, ... comete ato ilícito."</p><cite>Art. 186, Código Civil</cite></blockquote>"#,
    ),
    (
        "titulos",
        "Títulos e subtítulos hierárquicos",
        r#"<h1 class="doc-title">Contrato de Prestação de Serviços</h1><h2 class="section-title">Cláusula 1ª - Do Objeto</h2>"#,
    ),
    (
        "caixa_destaque",
        "Caixa de destaque para pontos críticos",
        r#"<aside class="highlight-box"><strong>Atenção:</strong> o prazo para contestação é de 15 dias úteis.</aside>"#,
    ),
    (
        "cabecalho_rodape",
        "Cabeçalho e rodapé do documento",
        r#"<header class="doc-header"><span>Escritório Exemplo Advocacia</span></header><footer class="doc-footer"><span>OAB/SP 000.000</span></footer>"#,
    ),
    (
        "barra_progresso",
        "Barra de progresso para etapas ou percentuais",
        r#"<div class="progress"><div class="progress-bar" style="width: 70%; background: {accent}">70% cumprido</div></div>"#,
    ),
    (
        "tabela",
        "Tabela para dados estruturados",
        r#"<table class="data-table"><thead><tr><th>Parcela</th><th>Vencimento</th><th>Valor</th></tr></thead><tbody><tr><td>1</td><td>10/01/2025</td><td>R$ 500,00</td></tr></tbody></table>"#,
    ),
    (
        "resumo",
        "Resumo executivo do documento",
        r#"<section class="summary"><h3>Resumo</h3><p>Ação de cobrança de honorários no valor de R$ 15.000,00.</p></section>"#,
    ),
    (
        "qrcode",
        "Espaço reservado para QR code de links",
        r#"<div class="qr-placeholder">[QR CODE: https://exemplo.com/processo/123]</div>"#,
    ),
    (
        "fluxograma",
        "Fluxograma de procedimentos",
        r#"<div class="flowchart"><div class="flow-step">Petição inicial</div><span class="flow-arrow">→</span><div class="flow-step">Citação</div><span class="flow-arrow">→</span><div class="flow-step">Sentença</div></div>"#,
    ),
    (
        "checklist",
        "Lista de verificação de obrigações",
        r#"<ul class="checklist"><li class="done">Procuração assinada</li><li>Comprovante de residência</li></ul>"#,
    ),
];

/// System prompt for visual mode.
pub fn visual_system_prompt(colors: &ColorScheme) -> String {
    let catalogue = VISUAL_ELEMENTS
        .iter()
        .map(|(key, description, example)| {
            let example = example
                .replace("{primary}", &colors.primary)
                .replace("{accent}", &colors.accent);
            format!("- {key}: {description}\n  Exemplo: {example}")
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Você é um designer especializado em Visual Law. Transforme o documento jurídico fornecido em um documento HTML visualmente rico, claro e fiel ao conteúdo original.

ELEMENTOS VISUAIS DISPONÍVEIS:
{catalogue}

REGRAS:
1. Use SOMENTE os elementos que o conteúdo do documento realmente justifica. Não force a inclusão de nenhum elemento.
2. Cores obrigatórias: primária {primary}, destaque {accent}, fundo {background}.
3. Gráficos devem ser SVG inline. Não use bibliotecas externas de gráficos nem scripts.
4. Para links ou referências a QR codes use apenas o marcador textual [QR CODE: <url>].
5. Preserve integralmente o texto jurídico; os elementos visuais complementam, não substituem.
6. O CSS deve ser autocontido, sem fontes ou recursos externos.

RESPONDA APENAS COM UM JSON VÁLIDO contendo exatamente estes campos:
{{
  "html": "conteúdo do <body>",
  "css": "estilos do documento",
  "summary": "resumo de uma frase do que foi gerado",
  "elementsFound": ["chaves dos elementos usados"]
}}"#,
        primary = colors.primary,
        accent = colors.accent,
        background = colors.background,
    )
}

/// User prompt for visual mode.
pub fn visual_user_prompt(doc: &ParsedDocument) -> String {
    format!(
        "Gere a versão Visual Law do seguinte documento:\n\nNome do arquivo: {}\nTipo: {}\nPalavras: {}\n\n{}",
        doc.file_name,
        doc.file_type.mime(),
        doc.word_count,
        doc.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::FileType;

    fn doc() -> ParsedDocument {
        ParsedDocument {
            text: "Cláusula primeira.".into(),
            word_count: 2,
            page_count: 1,
            pages_read: Some(1),
            file_name: "contrato.pdf".into(),
            file_type: FileType::Pdf,
            file_size: "1.5 KB".into(),
        }
    }

    #[test]
    fn json_prompt_embeds_size_and_word_count() {
        let p = json_system_prompt("1.5 KB", 1234);
        assert!(p.contains("\"1.5 KB\""));
        assert!(p.contains("1234"));
        assert!(p.contains("\"entidade_juridica\""));
        assert!(p.contains("APENAS COM O JSON"));
    }

    #[test]
    fn json_user_prompt_carries_text() {
        let p = json_user_prompt(&doc());
        assert!(p.contains("Nome do arquivo: contrato.pdf"));
        assert!(p.contains("Tipo: application/pdf"));
        assert!(p.ends_with("Cláusula primeira."));
    }

    #[test]
    fn visual_prompt_lists_every_element() {
        let p = visual_system_prompt(&ColorScheme::default());
        for (key, _, _) in VISUAL_ELEMENTS {
            assert!(p.contains(key), "missing element {key}");
        }
        assert_eq!(VISUAL_ELEMENTS.len(), 15);
    }

    #[test]
    fn visual_prompt_uses_template_colors() {
        let colors = ColorScheme::new("#4527a0", "#7c43bd", "#ffffff");
        let p = visual_system_prompt(&colors);
        assert!(p.contains("primária #4527a0"));
        assert!(p.contains("fill=\"#7c43bd\""));
        assert!(!p.contains("{primary}"));
    }

    #[test]
    fn visual_prompt_requires_exact_fields() {
        let p = visual_system_prompt(&ColorScheme::default());
        for field in ["\"html\"", "\"css\"", "\"summary\"", "\"elementsFound\""] {
            assert!(p.contains(field));
        }
        assert!(p.contains("SVG inline"));
        assert!(p.contains("[QR CODE:"));
    }
}
