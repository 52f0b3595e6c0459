//! Semantic block classification and Markdown export of reflowed pages.
//!
//! Each eligible fragment is given a role from its font size, weight,
//! position and leading words. Consecutive paragraphs are merged into one
//! block, footers are dropped, and the blocks are emitted as Markdown with the
//! translated text (falling back to the original where no translation exists).

use crate::measure::is_unspaced_char;
use crate::output::PageReflow;
use crate::page::{PageContent, TextFragment};
use crate::pipeline::postprocess::clean_markdown;
use serde::{Deserialize, Serialize};

/// Fragments starting below this share of the page height are footers.
pub const FOOTER_BAND: f32 = 0.9;

/// Bold fragments shorter than this (in characters) are headings.
pub const BOLD_HEADING_MAX_CHARS: usize = 100;

const CAPTION_PREFIXES: [&str; 6] = ["figure", "fig.", "fig ", "table", "tab.", "tab "];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockRole {
    Title,
    Heading,
    Paragraph,
    Caption,
    Footer,
}

/// One classified block of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedBlock {
    pub role: BlockRole,
    /// Heading level 1-5; zero for other roles.
    pub level: u8,
    pub original: String,
    pub translated: Option<String>,
}

/// Role and heading level for one fragment.
pub fn classify_fragment(fragment: &TextFragment, page_height: f32) -> (BlockRole, u8) {
    let text = fragment.text.trim();
    let size = fragment.font_size;

    if fragment.bbox.y0 > page_height * FOOTER_BAND {
        return (BlockRole::Footer, 0);
    }

    if size >= 14.0 || (fragment.bold && text.chars().count() < BOLD_HEADING_MAX_CHARS) {
        let level = if size >= 18.0 {
            1
        } else if size >= 16.0 {
            2
        } else if size >= 14.0 {
            3
        } else if fragment.bold {
            4
        } else {
            5
        };
        let role = if level == 1 {
            BlockRole::Title
        } else {
            BlockRole::Heading
        };
        return (role, level);
    }

    let lower = text.to_lowercase();
    if CAPTION_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return (BlockRole::Caption, 0);
    }

    (BlockRole::Paragraph, 0)
}

/// Classify the eligible fragments of `page` in source order. Translations
/// are taken from `reflow` for fragments whose plan was translated.
pub fn classify_page(page: &PageContent, reflow: Option<&PageReflow>) -> Vec<ClassifiedBlock> {
    page.eligible_fragments()
        .map(|(index, fragment)| {
            let (role, level) = classify_fragment(fragment, page.height);
            let translated = reflow
                .and_then(|r| r.plan_for(index))
                .filter(|plan| plan.translated)
                .map(|plan| plan.text.trim().to_string())
                .filter(|t| !t.is_empty());
            ClassifiedBlock {
                role,
                level,
                original: fragment.text.trim().to_string(),
                translated,
            }
        })
        .collect()
}

/// Join two runs of text, adding a space unless either side is unspaced script.
fn join_runs(left: &mut String, right: &str) {
    let needs_space = match (left.chars().last(), right.chars().next()) {
        (Some(a), Some(b)) => !is_unspaced_char(a) && !is_unspaced_char(b),
        _ => false,
    };
    if needs_space {
        left.push(' ');
    }
    left.push_str(right);
}

/// Merge runs of consecutive paragraph blocks.
pub fn merge_paragraphs(blocks: Vec<ClassifiedBlock>) -> Vec<ClassifiedBlock> {
    let mut merged: Vec<ClassifiedBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        match merged.last_mut() {
            Some(current)
                if current.role == BlockRole::Paragraph && block.role == BlockRole::Paragraph =>
            {
                if current.translated.is_some() || block.translated.is_some() {
                    // Untranslated members contribute their original text.
                    let mut t = current
                        .translated
                        .take()
                        .unwrap_or_else(|| current.original.clone());
                    join_runs(&mut t, block.translated.as_deref().unwrap_or(&block.original));
                    current.translated = Some(t);
                }
                join_runs(&mut current.original, &block.original);
            }
            _ => merged.push(block),
        }
    }
    merged
}

/// Markdown for one block; `None` for footers.
pub fn render_block(block: &ClassifiedBlock, bilingual: bool) -> Option<String> {
    let text = block.translated.as_deref().unwrap_or(&block.original);
    let show_original = bilingual && block.translated.is_some();
    let mut lines = Vec::new();

    match block.role {
        BlockRole::Footer => return None,
        BlockRole::Title | BlockRole::Heading => {
            let prefix = "#".repeat(block.level.max(1) as usize);
            lines.push(format!("{prefix} {text}"));
            if show_original {
                lines.push(String::new());
                lines.push(format!("> {}", block.original));
            }
        }
        BlockRole::Caption => {
            lines.push(format!("**{text}**"));
            if show_original {
                lines.push(format!("*{}*", block.original));
            }
        }
        BlockRole::Paragraph => {
            lines.push(text.to_string());
            if show_original {
                lines.push(String::new());
                lines.push(format!("> {}", block.original));
            }
        }
    }
    lines.push(String::new());
    Some(lines.join("\n"))
}

/// Markdown for one page (uncleaned).
pub fn render_page_markdown(page: &PageContent, reflow: Option<&PageReflow>, bilingual: bool) -> String {
    merge_paragraphs(classify_page(page, reflow))
        .iter()
        .filter_map(|b| render_block(b, bilingual))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Options for [`render_document_markdown`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownExport<'a> {
    pub title: Option<&'a str>,
    pub bilingual: bool,
    pub include_page_breaks: bool,
}

/// Markdown for a sequence of `(page_num, page, reflow)` entries, cleaned.
///
/// A page-break marker (`---` and `*Page N*`) is inserted before every page
/// after the first one that produced text.
pub fn render_document_markdown<'a, I>(pages: I, options: MarkdownExport<'_>) -> String
where
    I: IntoIterator<Item = (usize, &'a PageContent, Option<&'a PageReflow>)>,
{
    let mut parts: Vec<String> = Vec::new();
    if let Some(title) = options.title.filter(|t| !t.trim().is_empty()) {
        parts.push(format!("# {}\n\n---\n", title.trim()));
    }

    let mut first = true;
    for (page_num, page, reflow) in pages {
        let body = render_page_markdown(page, reflow, options.bilingual);
        if body.trim().is_empty() {
            continue;
        }
        if options.include_page_breaks && !first {
            parts.push(format!("---\n*Page {page_num}*\n"));
        }
        parts.push(body);
        first = false;
    }

    clean_markdown(&parts.join("\n"))
}
