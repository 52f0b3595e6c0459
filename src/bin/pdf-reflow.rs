//! CLI binary for pdf-reflow.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReflowConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_reflow::pipeline::input::load_document;
use pdf_reflow::{
    reflow_to_file, summarize, translate_markdown_file, OutputFormat, PageSelection,
    ProgressCallback, ReflowConfig, ReflowProgressCallback, TranslatorKind,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished page. Pages may complete
/// out of order when `--page-concurrency` is above 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_reflow_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading fragments…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Reflowing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ReflowProgressCallback for CliProgressCallback {
    fn on_reflow_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reflowing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, plans: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{plans:>4} plans")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('…');
            s
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_reflow_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages reflowed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages reflowed  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Reflow a fragments document into Chinese, JSON render plans on stdout
  pdf-reflow paper.fragments.json

  # Markdown export, bilingual, to a file
  pdf-reflow paper.fragments.json --format markdown --bilingual -o paper.zh.md

  # Specific pages, Japanese, a specific model
  pdf-reflow --pages 1-5 --target-lang ja --provider openai --model gpt-4.1-mini paper.json

  # Layout check only: keep the source text, report overflow
  pdf-reflow --translator none paper.json -o plans.json

  # Count pages, fragments and paragraph groups (no API key needed)
  pdf-reflow --inspect-only paper.json

  # Translate a Markdown file
  pdf-reflow notes.md -o notes.zh.md

INPUT FORMAT:
  JSON from a PDF text extractor: {"title": ..., "pages": [...]} or a bare
  array of pages. Each page: {page_no, width, height, blocks: [...]}, each
  block: {text, bbox: [x0, y0, x1, y1], font_name, font_size, color, bold}.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY            OpenAI API key
  ANTHROPIC_API_KEY         Anthropic API key
  GEMINI_API_KEY            Google Gemini API key
  GOOGLE_TRANSLATE_API_KEY  Google Cloud Translation key (--translator google)
  EDGEQUAKE_LLM_PROVIDER    Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL           Override model ID
  RUST_LOG                  Override log filter
"#;

/// Re-flow translated text into the layout of PDF pages.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-reflow",
    version,
    about = "Re-flow translated text into the layout of PDF pages",
    long_about = "Group positioned PDF text fragments into paragraphs, translate each paragraph, \
split the translation back over the original fragments and shrink the font until each share \
fits its box. Reads fragments JSON (local file or URL) or a Markdown file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Fragments JSON (path or HTTP/HTTPS URL), or a `.md` file.
    input: String,

    /// Write the result to this file instead of stdout.
    #[arg(short, long, env = "PDF_REFLOW_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format for fragments input.
    #[arg(long, env = "PDF_REFLOW_FORMAT", value_enum, default_value = "json")]
    format: FormatArg,

    /// Translation backend.
    #[arg(long, env = "PDF_REFLOW_TRANSLATOR", value_enum, default_value = "llm")]
    translator: TranslatorArg,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Source language code.
    #[arg(long, env = "PDF_REFLOW_SOURCE_LANG", default_value = "en")]
    source_lang: String,

    /// Target language code (zh, ja, ko, fr, …).
    #[arg(long, env = "PDF_REFLOW_TARGET_LANG", default_value = "zh")]
    target_lang: String,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF_REFLOW_PAGES", default_value = "all")]
    pages: String,

    /// Keep the original text next to each translation in Markdown output.
    #[arg(long, env = "PDF_REFLOW_BILINGUAL")]
    bilingual: bool,

    /// Omit `---` / `*Page N*` markers between pages in Markdown output.
    #[arg(long, env = "PDF_REFLOW_NO_PAGE_BREAKS")]
    no_page_breaks: bool,

    /// Concurrent translator calls per page.
    #[arg(short, long, env = "PDF_REFLOW_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Pages processed at the same time.
    #[arg(long, env = "PDF_REFLOW_PAGE_CONCURRENCY", default_value_t = 2)]
    page_concurrency: usize,

    /// Starting font size as a share of the original size.
    #[arg(long, env = "PDF_REFLOW_FONT_SCALE", default_value_t = 0.9)]
    font_scale: f32,

    /// Smallest font size as a share of the original size.
    #[arg(long, env = "PDF_REFLOW_MIN_SCALE", default_value_t = 0.5)]
    min_scale: f32,

    /// Vertical distance (points) under which two fragments share a line.
    #[arg(long, env = "PDF_REFLOW_LINE_THRESHOLD", default_value_t = 5.0)]
    line_threshold: f32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF_REFLOW_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF_REFLOW_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Retries per translator call.
    #[arg(long, env = "PDF_REFLOW_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call translator timeout in seconds.
    #[arg(long, env = "PDF_REFLOW_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF_REFLOW_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print page, fragment and group counts only; no translation.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_REFLOW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_REFLOW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_REFLOW_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Json,
    Markdown,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TranslatorArg {
    Llm,
    Google,
    None,
}

impl From<TranslatorArg> for TranslatorKind {
    fn from(v: TranslatorArg) -> Self {
        match v {
            TranslatorArg::Llm => TranslatorKind::Llm,
            TranslatorArg::Google => TranslatorKind::Google,
            TranslatorArg::None => TranslatorKind::None,
        }
    }
}

fn is_markdown_input(input: &str) -> bool {
    Path::new(input)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let markdown_input = is_markdown_input(&cli.input);

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect_only && !markdown_input;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ReflowProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let doc = load_document(&cli.input, config.download_timeout_secs)
            .await
            .context("Failed to load fragments")?;
        let summary = summarize(&doc, &config).context("Failed to inspect document")?;

        println!("File:              {}", cli.input);
        if let Some(ref t) = summary.title {
            println!("Title:             {}", t);
        }
        println!("Pages:             {}", summary.pages);
        println!("Selected pages:    {}", summary.selected_pages);
        println!("Fragments:         {}", summary.fragments);
        println!("Eligible:          {}", summary.eligible_fragments);
        println!("Paragraph groups:  {}", summary.groups);
        if summary.malformed_boxes > 0 {
            println!("Malformed boxes:   {}", summary.malformed_boxes);
        }
        return Ok(());
    }

    // ── Markdown translation ─────────────────────────────────────────────
    if markdown_input {
        let output = translate_markdown_file(&cli.input, cli.output.as_deref(), &config)
            .await
            .context("Markdown translation failed")?;
        if cli.output.is_none() {
            write_stdout(&output.markdown)?;
        }
        if !cli.quiet {
            eprintln!(
                "{}  {} segments translated  ({} failed)",
                if output.diagnostics.is_empty() {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                output.translated_segments,
                output.diagnostics.len(),
            );
        }
        return Ok(());
    }

    // ── Reflow ───────────────────────────────────────────────────────────
    let format: OutputFormat = cli.format.into();
    let stats = match cli.output {
        Some(ref output_path) => reflow_to_file(&cli.input, output_path, format, &config)
            .await
            .context("Reflow failed")?,
        None => {
            let doc = load_document(&cli.input, config.download_timeout_secs)
                .await
                .context("Failed to load fragments")?;
            let output = pdf_reflow::reflow_document(&doc, &config)
                .await
                .context("Reflow failed")?;
            let rendered = match format {
                OutputFormat::Json => {
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?
                }
                OutputFormat::Markdown => pdf_reflow::render_markdown(&doc, &output, &config),
            };
            write_stdout(&rendered)?;
            output.stats
        }
    };

    if !cli.quiet {
        let selected = stats.processed_pages + stats.failed_pages;
        let target = cli
            .output
            .as_ref()
            .map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default();
        eprintln!(
            "{}  {}/{} pages  {} groups ({} failed)  {} overflowed  {}ms{}",
            if stats.failed_pages == 0 && stats.failed_groups == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.processed_pages,
            selected,
            stats.groups,
            stats.failed_groups,
            dim(&stats.overflowed_fragments.to_string()),
            stats.total_duration_ms,
            target,
        );
    }

    Ok(())
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Map CLI args to `ReflowConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReflowConfig> {
    let pages = PageSelection::parse(&cli.pages).context("Invalid --pages")?;

    let mut builder = ReflowConfig::builder()
        .translator_kind(cli.translator.into())
        .source_lang(&cli.source_lang)
        .target_lang(&cli.target_lang)
        .pages(pages)
        .bilingual(cli.bilingual)
        .include_page_breaks(!cli.no_page_breaks)
        .concurrency(cli.concurrency)
        .page_concurrency(cli.page_concurrency)
        .font_scale(cli.font_scale)
        .min_scale(cli.min_scale)
        .line_threshold(cli.line_threshold)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
