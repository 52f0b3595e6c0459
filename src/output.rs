//! Output types: what the compositor receives.

use crate::error::Diagnostic;
use crate::geometry::BoundingBox;
use crate::measure::FontFamily;
use serde::{Deserialize, Serialize};

/// Drawing instructions for one source fragment.
///
/// Computed once per fragment, consumed by the compositor, then discarded.
/// The source fragment itself is never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    /// Index of the fragment in [`crate::page::PageContent::fragments`].
    pub fragment_index: usize,
    /// Region to draw into; equal to the original fragment box.
    pub target_bbox: BoundingBox,
    /// Text assigned to this fragment before wrapping.
    pub text: String,
    pub lines: Vec<String>,
    pub font_size: f32,
    pub font_family: FontFamily,
    /// 24-bit packed `0xRRGGBB`, copied from the fragment.
    pub color: u32,
    /// False when the fragment kept its original text (skip rule or
    /// translation failure).
    pub translated: bool,
    /// True when the lines overflow the box even at the minimum size.
    pub overflow: bool,
}

impl RenderPlan {
    /// Height the lines occupy at the chosen size.
    pub fn text_height(&self, line_height_factor: f32) -> f32 {
        self.lines.len() as f32 * self.font_size * line_height_factor
    }
}

/// Reflow result for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReflow {
    /// 1-indexed page number.
    pub page_num: usize,
    pub width: f32,
    pub height: f32,
    /// One plan per eligible fragment, ordered by `fragment_index`.
    pub plans: Vec<RenderPlan>,
    pub diagnostics: Vec<Diagnostic>,
    /// Paragraph groups found on the page.
    pub groups: usize,
    /// Groups that fell back to their original text.
    pub failed_groups: usize,
    pub duration_ms: u64,
}

impl PageReflow {
    pub fn overflowed(&self) -> usize {
        self.plans.iter().filter(|p| p.overflow).count()
    }

    /// Plan for a given fragment index, if the fragment was eligible.
    pub fn plan_for(&self, fragment_index: usize) -> Option<&RenderPlan> {
        self.plans
            .binary_search_by_key(&fragment_index, |p| p.fragment_index)
            .ok()
            .map(|i| &self.plans[i])
    }
}

/// Reflow result for a whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflowOutput {
    pub title: Option<String>,
    /// Pages that completed, sorted by page number.
    pub pages: Vec<PageReflow>,
    pub stats: ReflowStats,
}

impl ReflowOutput {
    /// All diagnostics across pages, in page order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.pages.iter().flat_map(|p| p.diagnostics.iter())
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflowStats {
    /// Pages in the source document.
    pub total_pages: usize,
    pub processed_pages: usize,
    /// Pages aborted by an invariant violation.
    pub failed_pages: usize,
    pub fragments: usize,
    pub groups: usize,
    pub failed_groups: usize,
    pub overflowed_fragments: usize,
    pub total_duration_ms: u64,
}

/// Page, fragment and group counts of a document, computed without a translator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub title: Option<String>,
    pub pages: usize,
    /// Pages selected by the configured page selection.
    pub selected_pages: usize,
    pub fragments: usize,
    /// Non-blank fragments on the selected pages.
    pub eligible_fragments: usize,
    pub groups: usize,
    pub malformed_boxes: usize,
}

/// Serialisation of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// [`ReflowOutput`] as pretty-printed JSON. (default)
    #[default]
    Json,
    /// Classified Markdown export of the reflowed pages.
    Markdown,
}

/// Result of the Markdown translation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownOutput {
    pub markdown: String,
    /// Segments sent to the translator.
    pub translated_segments: usize,
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(idx: usize, overflow: bool) -> RenderPlan {
        RenderPlan {
            fragment_index: idx,
            target_bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            text: "x".into(),
            lines: vec!["x".into(), "y".into()],
            font_size: 10.0,
            font_family: FontFamily::Latin,
            color: 0,
            translated: true,
            overflow,
        }
    }

    #[test]
    fn plan_lookup_and_overflow_count() {
        let page = PageReflow {
            page_num: 1,
            width: 100.0,
            height: 100.0,
            plans: vec![plan(0, false), plan(2, true), plan(5, false)],
            diagnostics: vec![],
            groups: 2,
            failed_groups: 0,
            duration_ms: 0,
        };
        assert_eq!(page.overflowed(), 1);
        assert!(page.plan_for(2).is_some());
        assert!(page.plan_for(3).is_none());
    }

    #[test]
    fn text_height() {
        assert!((plan(0, false).text_height(1.2) - 24.0).abs() < 1e-4);
    }
}
