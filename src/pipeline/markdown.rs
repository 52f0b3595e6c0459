//! Markdown translation: segment a Markdown file and translate its prose.
//!
//! A line-oriented segmenter splits the input into typed segments. Only
//! plain-text blocks are sent to the translator; code, tables, images and
//! formulas pass through untouched. Text blocks are translated concurrently
//! with their order preserved, and each one falls back to its original text
//! when the translator fails.

use crate::config::ReflowConfig;
use crate::error::Diagnostic;
use crate::output::MarkdownOutput;
use crate::pipeline::translate::{translate_with_timeout, Translator};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a [`Segment`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Text,
    CodeFence,
    Code,
    Table,
    Image,
    Formula,
    Empty,
}

/// One piece of a Markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub translatable: bool,
    pub kind: SegmentKind,
}

impl Segment {
    fn new(text: impl Into<String>, kind: SegmentKind) -> Self {
        Self {
            text: text.into(),
            translatable: kind == SegmentKind::Text,
            kind,
        }
    }
}

static RE_IMAGE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*!\[.*\]\(.*\)\s*$").unwrap());
static RE_HEADING_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6}\s+)").unwrap());
static RE_BARE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+\s*$").unwrap());

/// Split Markdown into segments, one per line except for consecutive prose
/// lines, which form a single `Text` segment.
pub fn segment_markdown(markdown: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut in_code = false;

    fn flush(block: &mut Vec<&str>, segments: &mut Vec<Segment>) {
        if !block.is_empty() {
            segments.push(Segment::new(block.join("\n"), SegmentKind::Text));
            block.clear();
        }
    }

    for line in markdown.split('\n') {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            flush(&mut block, &mut segments);
            in_code = !in_code;
            segments.push(Segment::new(line, SegmentKind::CodeFence));
            continue;
        }
        if in_code {
            segments.push(Segment::new(line, SegmentKind::Code));
            continue;
        }

        let kind = if trimmed.starts_with('|') || trimmed.starts_with("<table") {
            Some(SegmentKind::Table)
        } else if RE_IMAGE_LINE.is_match(line) {
            Some(SegmentKind::Image)
        } else if trimmed.starts_with('$') {
            Some(SegmentKind::Formula)
        } else if trimmed.is_empty() {
            Some(SegmentKind::Empty)
        } else {
            None
        };

        match kind {
            Some(SegmentKind::Empty) => {
                flush(&mut block, &mut segments);
                segments.push(Segment::new("", SegmentKind::Empty));
            }
            Some(kind) => {
                flush(&mut block, &mut segments);
                segments.push(Segment::new(line, kind));
            }
            None => block.push(line),
        }
    }
    flush(&mut block, &mut segments);
    segments
}

/// Whether a text segment is worth a translator call: at least three
/// characters, not a number, not a bare `#` marker.
pub fn should_translate_segment(text: &str) -> bool {
    let text = text.trim();
    if text.chars().count() < 3 {
        return false;
    }
    let stripped: String = text.chars().filter(|c| !matches!(c, '.' | ',' | ' ')).collect();
    if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    !RE_BARE_HEADING.is_match(text)
}

/// Split a leading `#{1,6} ` heading prefix off `text`.
pub fn split_heading_prefix(text: &str) -> (&str, &str) {
    match RE_HEADING_PREFIX.find(text) {
        Some(m) => text.split_at(m.end()),
        None => ("", text),
    }
}

/// Quote every line of `text` with `> `.
fn quote(text: &str) -> String {
    text.split('\n')
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

enum Translated {
    Kept(String),
    Done(String),
    Failed(String, String),
}

/// Translate the prose of a Markdown document.
pub async fn translate_markdown(
    markdown: &str,
    translator: Arc<dyn Translator>,
    config: &ReflowConfig,
) -> MarkdownOutput {
    let segments = segment_markdown(markdown);
    let candidates = segments
        .iter()
        .filter(|s| s.translatable && should_translate_segment(&s.text))
        .count();
    info!(
        "Markdown: {} segments, {} to translate via {}",
        segments.len(),
        candidates,
        translator.name()
    );

    let timeout_secs = config.api_timeout_secs;
    let results: Vec<Translated> = stream::iter(segments.into_iter())
        .map(|segment| {
            let translator = Arc::clone(&translator);
            async move {
                if !(segment.translatable && should_translate_segment(&segment.text)) {
                    return Translated::Kept(segment.text);
                }
                let (prefix, content) = split_heading_prefix(&segment.text);
                let result = translate_with_timeout(translator.as_ref(), content, timeout_secs).await;
                match result {
                    Ok(t) => Translated::Done(format!("{prefix}{t}")),
                    Err(e) => Translated::Failed(segment.text, e.to_string()),
                }
            }
        })
        .buffered(config.concurrency)
        .collect()
        .await;

    let mut parts = Vec::with_capacity(results.len());
    let mut diagnostics = Vec::new();
    let mut translated_segments = 0usize;

    for (index, result) in results.into_iter().enumerate() {
        match result {
            Translated::Kept(text) => parts.push(text),
            Translated::Done(text) => {
                translated_segments += 1;
                parts.push(text);
            }
            Translated::Failed(original, detail) => {
                warn!("Markdown segment {}: translation failed: {}", index, detail);
                diagnostics.push(Diagnostic::SegmentTranslationFailed {
                    segment: index,
                    detail,
                });
                parts.push(original);
            }
        }
        debug!("Markdown segment {} done", index);
    }

    // Bilingual mode needs the originals, so re-segment instead of cloning up front.
    let markdown = if config.bilingual {
        let originals = segment_markdown(markdown);
        parts
            .into_iter()
            .zip(originals)
            .map(|(out, original)| {
                if original.translatable
                    && should_translate_segment(&original.text)
                    && out != original.text
                {
                    format!("{out}\n\n{}", quote(&original.text))
                } else {
                    out
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        parts.join("\n")
    };

    MarkdownOutput {
        markdown,
        translated_segments,
        diagnostics,
    }
}
