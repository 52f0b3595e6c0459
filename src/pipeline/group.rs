//! Paragraph grouping: partition a page's fragments into paragraph-sized groups.
//!
//! Fragments are sorted into reading order (top-to-bottom, then
//! left-to-right) and each one is compared with the last fragment added to the
//! current group. It joins the group when it sits on the same line
//! (`|Δy0| < line_threshold`) or starts just below the previous one
//! (`0 < y0 - prev.y1 < prev.height * next_line_factor`); otherwise it opens a
//! new group.
//!
//! The function is total: malformed boxes are measured with clamped
//! dimensions. Reporting them is the orchestrator's job.

use crate::config::LayoutParams;
use crate::page::{PageContent, ParagraphGroup, TextFragment};
use std::cmp::Ordering;

/// Group `fragments` into paragraphs. Each item carries the index that will
/// identify the fragment in the emitted groups.
pub fn group_fragments<'a, I>(fragments: I, params: &LayoutParams) -> Vec<ParagraphGroup<'a>>
where
    I: IntoIterator<Item = (usize, &'a TextFragment)>,
{
    let mut ordered: Vec<(usize, &'a TextFragment)> = fragments.into_iter().collect();
    // `sort_by` is stable, so fragments at identical positions keep source order.
    ordered.sort_by(|(_, a), (_, b)| reading_order(a, b));

    let mut groups = Vec::new();
    let mut iter = ordered.into_iter();
    let Some((first_idx, first)) = iter.next() else {
        return groups;
    };

    let mut current = ParagraphGroup::seed(first_idx, first);
    for (idx, frag) in iter {
        if continues_paragraph(current.last(), frag, params) {
            current.push(idx, frag);
        } else {
            groups.push(std::mem::replace(&mut current, ParagraphGroup::seed(idx, frag)));
        }
    }
    groups.push(current);
    groups
}

/// Group the eligible (non-blank) fragments of a page.
pub fn group_page<'a>(page: &'a PageContent, params: &LayoutParams) -> Vec<ParagraphGroup<'a>> {
    group_fragments(page.eligible_fragments(), params)
}

fn reading_order(a: &TextFragment, b: &TextFragment) -> Ordering {
    a.bbox
        .y0
        .total_cmp(&b.bbox.y0)
        .then_with(|| a.bbox.x0.total_cmp(&b.bbox.x0))
}

fn continues_paragraph(prev: &TextFragment, next: &TextFragment, params: &LayoutParams) -> bool {
    let same_line = (next.bbox.y0 - prev.bbox.y0).abs() < params.line_threshold;
    if same_line {
        return true;
    }
    let gap = next.bbox.y0 - prev.bbox.y1;
    next.bbox.y0 > prev.bbox.y1 && gap < prev.bbox.height() * params.next_line_factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    fn frag(text: &str, x0: f32, y0: f32, h: f32) -> TextFragment {
        TextFragment::new(text, BoundingBox::new(x0, y0, x0 + 100.0, y0 + h), 10.0)
    }

    fn indices(groups: &[ParagraphGroup<'_>]) -> Vec<Vec<usize>> {
        groups.iter().map(|g| g.indices().collect()).collect()
    }

    #[test]
    fn empty_input_yields_no_groups() {
        let groups = group_fragments(std::iter::empty(), &LayoutParams::default());
        assert!(groups.is_empty());
    }

    #[test]
    fn single_fragment_is_its_own_group() {
        let fs = [frag("alone", 0.0, 0.0, 10.0)];
        let groups = group_fragments(fs.iter().enumerate(), &LayoutParams::default());
        assert_eq!(indices(&groups), vec![vec![0]]);
    }

    #[test]
    fn same_line_fragments_join() {
        let fs = [frag("left", 0.0, 100.0, 10.0), frag("right", 200.0, 103.0, 10.0)];
        let groups = group_fragments(fs.iter().enumerate(), &LayoutParams::default());
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn wrapped_lines_continue_and_gaps_split() {
        let fs = [
            frag("line one", 0.0, 100.0, 10.0),
            // 4 units below line one: continuation (< 10 * 1.5).
            frag("line two", 0.0, 114.0, 10.0),
            // 40 units below line two: new paragraph.
            frag("next paragraph", 0.0, 164.0, 10.0),
        ];
        let groups = group_fragments(fs.iter().enumerate(), &LayoutParams::default());
        assert_eq!(indices(&groups), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn input_order_does_not_matter() {
        let fs = [
            frag("b", 0.0, 164.0, 10.0),
            frag("a2", 0.0, 114.0, 10.0),
            frag("a1", 0.0, 100.0, 10.0),
        ];
        let groups = group_fragments(fs.iter().enumerate(), &LayoutParams::default());
        assert_eq!(indices(&groups), vec![vec![2, 1], vec![0]]);
        assert_eq!(groups[0].combined_text(), "a1 a2");
    }

    #[test]
    fn thresholds_are_configurable() {
        let fs = [frag("a", 0.0, 100.0, 10.0), frag("b", 0.0, 104.0, 10.0)];
        let strict = LayoutParams {
            line_threshold: 2.0,
            next_line_factor: 0.0,
            ..LayoutParams::default()
        };
        let groups = group_fragments(fs.iter().enumerate(), &strict);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn close_y0_always_groups_together() {
        // Property: |Δy0| < line_threshold puts two fragments in the same group,
        // whatever their heights or horizontal positions.
        let params = LayoutParams::default();
        for dy in [0.0_f32, 1.0, 2.5, 4.9] {
            for h in [1.0_f32, 10.0, 40.0] {
                let fs = [frag("a", 300.0, 50.0, h), frag("b", 0.0, 50.0 + dy, h)];
                let groups = group_fragments(fs.iter().enumerate(), &params);
                assert_eq!(groups.len(), 1, "dy={dy} h={h}");
            }
        }
    }

    #[test]
    fn malformed_boxes_are_tolerated() {
        let mut bad = frag("bad", 0.0, 100.0, 10.0);
        bad.bbox = BoundingBox::new(50.0, 120.0, 10.0, 100.0);
        let fs = [frag("ok", 0.0, 100.0, 10.0), bad];
        let groups = group_fragments(fs.iter().enumerate(), &LayoutParams::default());
        let total: usize = groups.iter().map(|g| g.len()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn group_page_skips_blank_fragments() {
        let page = PageContent {
            page_no: 0,
            width: 600.0,
            height: 800.0,
            fragments: vec![
                frag("a", 0.0, 100.0, 10.0),
                frag("   ", 0.0, 112.0, 10.0),
                frag("b", 0.0, 300.0, 10.0),
            ],
        };
        let groups = group_page(&page, &LayoutParams::default());
        assert_eq!(indices(&groups), vec![vec![0], vec![2]]);
    }
}
