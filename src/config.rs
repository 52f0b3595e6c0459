//! Configuration types for a reflow run.
//!
//! All behaviour is controlled through [`ReflowConfig`], built via its
//! [`ReflowConfigBuilder`]. Geometric heuristics live in the `Copy`
//! [`LayoutParams`] so the pure stages (group, redistribute, wrap, fit) can
//! take them by value without touching the rest of the config.

use crate::error::ReflowError;
use crate::measure::TextMeasure;
use crate::pipeline::translate::Translator;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Tunable constants of the layout heuristics.
///
/// The defaults were chosen empirically on single-column, left-to-right
/// pages; multi-column or rotated layouts may need different values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutParams {
    /// Two fragments whose `y0` differ by less than this are on the same line. Default: 5.0.
    pub line_threshold: f32,
    /// A following fragment continues the paragraph when its gap below the
    /// previous one is smaller than `prev.height * next_line_factor`. Default: 1.5.
    pub next_line_factor: f32,
    /// How far (in characters) a redistribution cut may move forward to reach
    /// a soft break. Default: 10.
    pub snap_window: usize,
    /// Starting font size as a fraction of the original. Default: 0.9.
    pub font_scale: f32,
    /// Smallest font size as a fraction of the original. Default: 0.5.
    pub min_scale: f32,
    /// Absolute font-size floor in page units. Default: 4.0.
    pub min_font_size: f32,
    /// Decrement of the font-size search. Default: 0.5.
    pub font_step: f32,
    /// Line height as a multiple of font size. Default: 1.15.
    pub line_height_factor: f32,
    /// Tolerated overflow of the box height. Default: 1.5.
    pub overflow_tolerance: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            line_threshold: 5.0,
            next_line_factor: 1.5,
            snap_window: 10,
            font_scale: 0.9,
            min_scale: 0.5,
            min_font_size: 4.0,
            font_step: 0.5,
            line_height_factor: 1.15,
            overflow_tolerance: 1.5,
        }
    }
}

/// Which translation backend to build when no translator is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorKind {
    /// Any LLM supported by edgequake-llm. (default)
    #[default]
    Llm,
    /// Google Cloud Translation v2.
    Google,
    /// Return every text unchanged.
    None,
}

/// Configuration for a reflow run.
///
/// # Example
/// ```rust
/// use pdf_reflow::ReflowConfig;
///
/// let config = ReflowConfig::builder()
///     .target_lang("zh")
///     .font_scale(0.85)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReflowConfig {
    pub layout: LayoutParams,

    /// Concurrent translator calls per page. Default: 8.
    pub concurrency: usize,

    /// Pages processed at the same time. Default: 2.
    ///
    /// Translator calls in flight are bounded by `page_concurrency * concurrency`.
    pub page_concurrency: usize,

    /// Source language code. Default: "en".
    pub source_lang: String,

    /// Target language code. Default: "zh".
    pub target_lang: String,

    /// Backend to build when `translator` is None. Default: [`TranslatorKind::Llm`].
    pub translator_kind: TranslatorKind,

    /// Pre-constructed translator. Takes precedence over `translator_kind`.
    pub translator: Option<Arc<dyn Translator>>,

    /// Pre-constructed measurement. Default: [`crate::measure::ApproxMetrics`].
    pub measure: Option<Arc<dyn TextMeasure>>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// Sampling temperature for LLM translation. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens per translated group. Default: 2048.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses the built-in academic prompt.
    pub system_prompt: Option<String>,

    /// Retries on a transient translator failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call translator timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Keep the original next to the translation in Markdown output. Default: false.
    pub bilingual: bool,

    /// Insert page-break markers between pages in Markdown output. Default: true.
    pub include_page_breaks: bool,

    /// Progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReflowConfig {
    fn default() -> Self {
        Self {
            layout: LayoutParams::default(),
            concurrency: 8,
            page_concurrency: 2,
            source_lang: "en".to_string(),
            target_lang: "zh".to_string(),
            translator_kind: TranslatorKind::default(),
            translator: None,
            measure: None,
            provider_name: None,
            model: None,
            temperature: 0.3,
            max_tokens: 2048,
            system_prompt: None,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            pages: PageSelection::default(),
            bilingual: false,
            include_page_breaks: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflowConfig")
            .field("layout", &self.layout)
            .field("concurrency", &self.concurrency)
            .field("page_concurrency", &self.page_concurrency)
            .field("source_lang", &self.source_lang)
            .field("target_lang", &self.target_lang)
            .field("translator_kind", &self.translator_kind)
            .field("translator", &self.translator.as_ref().map(|t| t.name().to_string()))
            .field("measure", &self.measure.as_ref().map(|_| "<dyn TextMeasure>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pages", &self.pages)
            .field("bilingual", &self.bilingual)
            .finish()
    }
}

impl ReflowConfig {
    pub fn builder() -> ReflowConfigBuilder {
        ReflowConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ReflowConfig`].
#[derive(Debug)]
pub struct ReflowConfigBuilder {
    config: ReflowConfig,
}

impl ReflowConfigBuilder {
    pub fn layout(mut self, layout: LayoutParams) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn line_threshold(mut self, v: f32) -> Self {
        self.config.layout.line_threshold = v;
        self
    }

    pub fn next_line_factor(mut self, v: f32) -> Self {
        self.config.layout.next_line_factor = v;
        self
    }

    pub fn snap_window(mut self, chars: usize) -> Self {
        self.config.layout.snap_window = chars;
        self
    }

    pub fn font_scale(mut self, v: f32) -> Self {
        self.config.layout.font_scale = v;
        self
    }

    pub fn min_scale(mut self, v: f32) -> Self {
        self.config.layout.min_scale = v;
        self
    }

    pub fn min_font_size(mut self, v: f32) -> Self {
        self.config.layout.min_font_size = v;
        self
    }

    pub fn font_step(mut self, v: f32) -> Self {
        self.config.layout.font_step = v;
        self
    }

    pub fn line_height_factor(mut self, v: f32) -> Self {
        self.config.layout.line_height_factor = v;
        self
    }

    pub fn overflow_tolerance(mut self, v: f32) -> Self {
        self.config.layout.overflow_tolerance = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn page_concurrency(mut self, n: usize) -> Self {
        self.config.page_concurrency = n.max(1);
        self
    }

    pub fn source_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.source_lang = lang.into();
        self
    }

    pub fn target_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.target_lang = lang.into();
        self
    }

    pub fn translator_kind(mut self, kind: TranslatorKind) -> Self {
        self.config.translator_kind = kind;
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.config.translator = Some(translator);
        self
    }

    pub fn measure(mut self, measure: Arc<dyn TextMeasure>) -> Self {
        self.config.measure = Some(measure);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn bilingual(mut self, v: bool) -> Self {
        self.config.bilingual = v;
        self
    }

    pub fn include_page_breaks(mut self, v: bool) -> Self {
        self.config.include_page_breaks = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReflowConfig, ReflowError> {
        let l = &self.config.layout;
        if !(l.font_scale > 0.0) {
            return Err(ReflowError::InvalidConfig(format!(
                "font scale must be > 0, got {}",
                l.font_scale
            )));
        }
        if !(l.min_scale > 0.0) || l.min_scale > l.font_scale.max(1.0) {
            return Err(ReflowError::InvalidConfig(format!(
                "min scale must be in (0, {}], got {}",
                l.font_scale.max(1.0),
                l.min_scale
            )));
        }
        if !(l.font_step > 0.0) {
            return Err(ReflowError::InvalidConfig(format!(
                "font step must be > 0, got {}",
                l.font_step
            )));
        }
        if !(l.min_font_size > 0.0) {
            return Err(ReflowError::InvalidConfig(format!(
                "minimum font size must be > 0, got {}",
                l.min_font_size
            )));
        }
        if !(l.line_height_factor > 0.0) || !(l.overflow_tolerance > 0.0) {
            return Err(ReflowError::InvalidConfig(
                "line height factor and overflow tolerance must be > 0".into(),
            ));
        }
        if l.line_threshold < 0.0 || l.next_line_factor < 0.0 {
            return Err(ReflowError::InvalidConfig(
                "grouping thresholds must be ≥ 0".into(),
            ));
        }
        if self.config.source_lang.trim().is_empty() || self.config.target_lang.trim().is_empty() {
            return Err(ReflowError::InvalidConfig(
                "source and target languages must be set".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the document to reflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Parse `all`, `5`, `3-15`, `1,3-5,7` (1-indexed).
    pub fn parse(s: &str) -> Result<Self, ReflowError> {
        let s = s.trim().to_lowercase();
        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        let bad = |part: &str| ReflowError::InvalidConfig(format!("invalid page selection '{part}'"));
        let parse_page = |p: &str| -> Result<usize, ReflowError> {
            match p.trim().parse::<usize>() {
                Ok(n) if n >= 1 => Ok(n),
                _ => Err(bad(p)),
            }
        };

        if !s.contains(',') {
            if let Some((a, b)) = s.split_once('-') {
                let (start, end) = (parse_page(a)?, parse_page(b)?);
                if start > end {
                    return Err(bad(&s));
                }
                return Ok(PageSelection::Range(start, end));
            }
            return Ok(PageSelection::Single(parse_page(&s)?));
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            if let Some((a, b)) = part.split_once('-') {
                let (start, end) = (parse_page(a)?, parse_page(b)?);
                if start > end {
                    return Err(bad(part));
                }
                pages.extend(start..=end);
            } else {
                pages.push(parse_page(part)?);
            }
        }
        Ok(PageSelection::Set(pages))
    }

    /// Expand the selection into a sorted, deduplicated list of 0-indexed positions.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
