//! CLI binary for doclex.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` / `AnalysisOptions`, drives a `Session` and prints the
//! result.

use anyhow::{Context, Result};
use clap::Parser;
use doclex::pipeline::input::resolve_input;
use doclex::pipeline::render::{assemble_html, HTML_FILE_NAME};
use doclex::{
    find_template, format_elapsed, inspect, write_result, AnalysisMode, AnalysisOptions,
    AnalysisResult, ColorScheme, ModelChoice, PipelineConfig, PipelineProgressCallback,
    PipelineWarning, ProgressCallback, Session, StageId, TEMPLATES,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one spinner showing the active stage and the
/// live elapsed time, plus a log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, file_name: &str, mode: AnalysisMode) {
        self.bar.println(format!(
            "{} {}",
            bold("◆"),
            bold(&format!("Analysing {file_name} ({mode})"))
        ));
    }

    fn on_stage_start(&self, stage: StageId) {
        self.bar.set_prefix(stage.label());
        self.bar.set_message("");
    }

    fn on_stage_complete(&self, stage: StageId, duration: Duration) {
        self.bar.println(format!(
            "  {} {:<20} {}",
            green("✓"),
            stage.label(),
            dim(&format_elapsed(duration))
        ));
    }

    fn on_stage_error(&self, stage: StageId, error: &str) {
        self.bar.println(format!("  {} {:<20} {}", red("✗"), stage.label(), red(error)));
        self.bar.finish_and_clear();
    }

    fn on_warning(&self, warning: &PipelineWarning) {
        self.bar.println(format!("  {} {}", yellow("⚠"), warning));
    }

    fn on_tick(&self, _stage: StageId, elapsed: Duration) {
        self.bar.set_message(format_elapsed(elapsed));
    }

    fn on_run_complete(&self, total: Duration) {
        self.bar.finish_and_clear();
        eprintln!("{} done in {}", green("✔"), bold(&format_elapsed(total)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Structured analysis (stdout)
  doclex peticao.pdf

  # Visual Law HTML with a catalogue template
  doclex --mode visual --template contrato contrato.docx -o contrato.html

  # Custom colours and template stylesheet
  doclex --mode visual --primary '#132238' --accent '#f5b041' --template-css base.css termo.pdf --html

  # Most accurate model
  doclex --model gemini-pro sentenca.pdf -o analise.json

  # Extracted text and counts only (no API key needed)
  doclex --inspect-only peticao.pdf

  # Full run report (document, stages, warnings, result) as JSON
  doclex --json peticao.pdf > run.json

MODELS:
  Name                    Backend model             Notes
  ──────────────────────  ────────────────────────  ─────────────────
  gemini-flash (default)  google/gemini-2.5-flash   fastest (~30 s)
  gemini-pro              google/gemini-2.5-pro     most accurate (~2 min)
  gpt-5                   openai/gpt-5              OpenAI premium
  gpt-5-mini              openai/gpt-5-mini         OpenAI fast

LIMITS:
  Only PDF and DOCX are accepted. At most 100 PDF pages are scanned and the
  text is capped at 50 000 words; longer documents are analysed partially.

ENVIRONMENT VARIABLES:
  DOCLEX_ANALYSIS_URL     Hosted analysis endpoint (receives the request JSON)
  DOCLEX_GATEWAY_URL      OpenAI-compatible chat/completions endpoint
  DOCLEX_API_KEY          Bearer key for the endpoint or gateway
  GEMINI_API_KEY          Google Gemini API key (no gateway)
  OPENAI_API_KEY          OpenAI API key (no gateway)
  EDGEQUAKE_LLM_PROVIDER  Force an edgequake-llm provider
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
"#;

/// Analyse legal documents (PDF/DOCX) with AI: structured JSON or Visual Law HTML.
#[derive(Parser, Debug)]
#[command(
    name = "doclex",
    version,
    about = "Analyse legal documents (PDF/DOCX) with AI: structured JSON or Visual Law HTML",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/DOCX path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "list_templates")]
    input: Option<String>,

    /// Analysis mode: json (structured analysis) or visual (HTML).
    #[arg(long, env = "DOCLEX_MODE", value_enum, default_value = "json")]
    mode: ModeArg,

    /// Model: gemini-flash, gemini-pro, gpt-5, gpt-5-mini.
    #[arg(long, env = "DOCLEX_MODEL", default_value = "gemini-flash")]
    model: String,

    /// Catalogue template id (visual mode). See --list-templates.
    #[arg(long, env = "DOCLEX_TEMPLATE")]
    template: Option<String>,

    /// Stylesheet prepended to the generated CSS (visual mode).
    #[arg(long, env = "DOCLEX_TEMPLATE_CSS")]
    template_css: Option<PathBuf>,

    /// Primary colour override, e.g. '#2c3e50'.
    #[arg(long, env = "DOCLEX_PRIMARY")]
    primary: Option<String>,

    /// Accent colour override, e.g. '#3498db'.
    #[arg(long, env = "DOCLEX_ACCENT")]
    accent: Option<String>,

    /// Write the result to this file instead of stdout.
    #[arg(short, long, env = "DOCLEX_OUTPUT")]
    output: Option<PathBuf>,

    /// Visual mode: also save the page as ./documento-visual-law.html.
    #[arg(long, env = "DOCLEX_HTML")]
    html: bool,

    /// Print the full run report (document, stages, warnings, result) as JSON.
    #[arg(long, env = "DOCLEX_JSON")]
    json: bool,

    /// Extract and print the text statistics only; no AI call.
    #[arg(long)]
    inspect_only: bool,

    /// Print the template catalogue and exit.
    #[arg(long)]
    list_templates: bool,

    /// Override the declared MIME type of the input.
    #[arg(long, env = "DOCLEX_MIME")]
    mime: Option<String>,

    /// Hosted analysis endpoint; takes precedence over the gateway.
    #[arg(long, env = "DOCLEX_ANALYSIS_URL")]
    analysis_url: Option<String>,

    /// OpenAI-compatible chat/completions endpoint.
    #[arg(long, env = "DOCLEX_GATEWAY_URL")]
    gateway_url: Option<String>,

    /// Bearer key for the analysis endpoint or gateway.
    #[arg(long, env = "DOCLEX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// edgequake-llm provider (openai, gemini, …) when no gateway is set.
    #[arg(long, env = "DOCLEX_PROVIDER")]
    provider: Option<String>,

    /// AI call timeout in seconds.
    #[arg(long, env = "DOCLEX_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCLEX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "DOCLEX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCLEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCLEX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Json,
    Visual,
}

impl From<ModeArg> for AnalysisMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Json => AnalysisMode::Json,
            ModeArg::Visual => AnalysisMode::Visual,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides all the feedback that matters; keep INFO logs
    // out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.list_templates {
        print_templates(cli.json)?;
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .context("An input file or URL is required")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = PipelineConfig::builder()
            .download_timeout_secs(cli.download_timeout)
            .build()
            .context("Invalid configuration")?;
        let doc = inspect(&input, cli.mime.as_deref(), &config)
            .await
            .context("Failed to inspect document")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&doc).context("Failed to serialise document")?
            );
        } else {
            println!("File:         {}", doc.file_name);
            println!("Type:         {}", doc.file_type);
            println!("Size:         {}", doc.file_size);
            println!("Pages:        {}", doc.page_count);
            if let Some(read) = doc.pages_read {
                println!("Pages read:   {}", read);
            }
            println!("Words:        {}", doc.word_count);
        }
        return Ok(());
    }

    // ── Build config and options ─────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let options = build_options(&cli).await?;

    let known = ModelChoice::ALL
        .iter()
        .any(|m| m.as_str().eq_ignore_ascii_case(cli.model.trim()));
    if !known && !cli.quiet {
        eprintln!(
            "{} unknown model '{}', using {}",
            yellow("⚠"),
            cli.model,
            ModelChoice::default()
        );
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let file = resolve_input(&input, cli.mime.as_deref(), cli.download_timeout)
        .await
        .context("Failed to read input")?;
    let session = Session::new(config).context("Failed to configure the AI backend")?;
    session.select_file(file).context("File rejected")?;

    let output = match session.process(&options).await {
        Ok(output) => output,
        Err(e) => {
            anyhow::bail!("{}", e.user_message());
        }
    };

    if let Some(path) = &cli.output {
        write_result(&output.result, path)
            .await
            .context("Failed to write output")?;
        if !cli.quiet {
            eprintln!("→ {}", bold(&path.display().to_string()));
        }
    }

    if cli.html {
        match &output.result {
            AnalysisResult::Visual(_) => {
                let path = PathBuf::from(HTML_FILE_NAME);
                write_result(&output.result, &path)
                    .await
                    .context("Failed to write HTML")?;
                if !cli.quiet {
                    eprintln!("→ {}", bold(HTML_FILE_NAME));
                }
            }
            AnalysisResult::Structured(_) => {
                eprintln!("{} --html only applies to --mode visual", yellow("⚠"));
            }
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let body = match &output.result {
            AnalysisResult::Visual(visual) => assemble_html(visual),
            AnalysisResult::Structured(structured) => {
                serde_json::to_string_pretty(structured).context("Failed to serialise result")?
            }
        };
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(body.as_bytes())
            .context("Failed to write to stdout")?;
        if !body.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !show_progress {
        eprintln!(
            "Analysed {} ({} words) in {}ms",
            output.document.file_name, output.document.word_count, output.total_duration_ms
        );
        for w in &output.warnings {
            eprintln!("  {} {}", yellow("⚠"), w);
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(url) = &cli.analysis_url {
        builder = builder.analysis_url(url);
    }
    if let Some(url) = &cli.gateway_url {
        builder = builder.gateway_url(url);
    }
    if let Some(key) = &cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(provider) = &cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args to `AnalysisOptions`.
async fn build_options(cli: &Cli) -> Result<AnalysisOptions> {
    let mode: AnalysisMode = cli.mode.into();
    let mut options = AnalysisOptions {
        mode,
        model: cli.model.clone(),
        ..Default::default()
    };

    if let Some(id) = &cli.template {
        if find_template(id).is_none() {
            anyhow::bail!("Unknown template '{}'. See --list-templates.", id);
        }
        options = options.with_template(id);
    }

    if let Some(path) = &cli.template_css {
        let css = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read template CSS from {:?}", path))?;
        options = options.with_template_css(css);
    }

    if cli.primary.is_some() || cli.accent.is_some() {
        let base = options.colors();
        options = options.with_colors(ColorScheme {
            primary: cli.primary.clone().unwrap_or(base.primary),
            accent: cli.accent.clone().unwrap_or(base.accent),
            background: base.background,
        });
    }

    let styled = cli.template.is_some()
        || cli.template_css.is_some()
        || cli.primary.is_some()
        || cli.accent.is_some();
    if mode == AnalysisMode::Json && styled && !cli.quiet {
        eprintln!("{} template options only apply to --mode visual", yellow("⚠"));
    }

    Ok(options)
}

fn print_templates(json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(TEMPLATES).context("Failed to serialise templates")?
        );
        return Ok(());
    }
    for t in TEMPLATES {
        println!(
            "{:<18} {:<28} {} / {}  {}",
            bold(t.id),
            t.name,
            t.color_scheme.primary,
            t.color_scheme.accent,
            dim(t.description)
        );
    }
    Ok(())
}
