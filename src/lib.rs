//! # pdf-reflow
//!
//! Put translated text back into the layout of a source PDF page.
//!
//! A PDF text extractor hands over each page as positioned text fragments.
//! This crate groups those fragments into paragraphs, translates each
//! paragraph as a unit, splits the translation back over the original
//! fragments in proportion to their length, and picks the largest font size
//! at which each share still fits its fragment's box. The result is a
//! [`RenderPlan`] per fragment that a compositor can draw over the page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! fragments JSON
//!  │
//!  ├─ 1. Input         resolve local file or download from URL
//!  ├─ 2. Group         reading-order paragraph grouping
//!  ├─ 3. Translate     concurrent translator calls per group (LLM / Google / none)
//!  ├─ 4. Redistribute  proportional split, snapped to word boundaries
//!  ├─ 5. Fit           shrink-to-fit font size with line wrapping
//!  └─ 6. Output        render plans + diagnostics per page, JSON or Markdown
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_reflow::{reflow, ReflowConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ReflowConfig::builder().target_lang("zh").build()?;
//!     let output = reflow("paper.fragments.json", &config).await?;
//!     for page in &output.pages {
//!         eprintln!("page {}: {} plans", page.page_num, page.plans.len());
//!     }
//!     eprintln!("{} fragments overflowed", output.stats.overflowed_fragments);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-reflow` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-reflow = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod geometry;
pub mod measure;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod reflow;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{LayoutParams, PageSelection, ReflowConfig, ReflowConfigBuilder, TranslatorKind};
pub use error::{Diagnostic, DiagnosticKind, ReflowError, ReflowStage};
pub use geometry::BoundingBox;
pub use measure::{ApproxMetrics, FontFamily, TextMeasure};
pub use output::{
    DocumentSummary, MarkdownOutput, OutputFormat, PageReflow, RenderPlan, ReflowOutput,
    ReflowStats,
};
pub use page::{PageContent, ParagraphGroup, SourceDocument, TextFragment};
pub use pipeline::translate::{
    GoogleTranslator, LlmTranslator, PassthroughTranslator, TranslateError, Translator,
};
pub use progress::{NoopProgressCallback, ProgressCallback, ReflowProgressCallback};
pub use reflow::{
    reflow, reflow_document, reflow_page, reflow_sync, reflow_to_file, render_markdown,
    summarize, translate_markdown_file,
};
pub use stream::{reflow_document_stream, reflow_stream, PageStream};
