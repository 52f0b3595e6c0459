//! Font-size fitting: the largest size at which the wrapped text fits its box.
//!
//! The search is a bounded descent over a fixed grid. Candidate sizes are the
//! multiples of `font_step` from the scaled original size (snapped down to the
//! grid) while they stay above the minimum size, then the minimum size
//! itself. The first candidate whose wrapped height fits within
//! `box.height * overflow_tolerance` wins. When none does, the minimum size is
//! accepted with all of its lines: overflowing the box is preferred over
//! dropping text.
//!
//! Because every scale shares the same grid, lowering `font_scale` can only
//! remove candidates from the front of the list, never add larger ones.

use crate::config::LayoutParams;
use crate::measure::{FontFamily, TextMeasure};
use crate::page::TextFragment;
use crate::pipeline::wrap::wrap;

/// Outcome of fitting one fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Fit {
    pub font_size: f32,
    pub lines: Vec<String>,
    pub family: FontFamily,
    /// Height the lines occupy at `font_size`.
    pub required_height: f32,
    /// Box height times the overflow tolerance.
    pub available_height: f32,
    /// True when even the minimum size exceeds `available_height`.
    pub overflow: bool,
}

/// Smallest size the search may reach for a fragment of `font_size`.
pub fn min_size(font_size: f32, params: &LayoutParams) -> f32 {
    params.min_font_size.max(font_size * params.min_scale)
}

/// Candidate sizes in the order the search tries them. Never empty; the last
/// item is always [`min_size`].
pub fn candidate_sizes(font_size: f32, params: &LayoutParams) -> impl Iterator<Item = f32> {
    let step = params.font_step;
    let floor = min_size(font_size, params);
    let start = font_size * params.font_scale;
    // Absorb float noise such as 10.0 * 0.9 = 8.999999.
    let top = ((start / step) + 1e-4).floor().max(0.0) as u64;
    (1..=top)
        .rev()
        .map(move |k| k as f32 * step)
        .take_while(move |&size| size > floor)
        .chain(std::iter::once(floor))
}

/// Choose a font size and line breaks for `translated` inside `fragment`'s box.
pub fn fit(
    fragment: &TextFragment,
    translated: &str,
    measure: &dyn TextMeasure,
    params: &LayoutParams,
) -> Fit {
    let base = if fragment.font_size.is_finite() && fragment.font_size > 0.0 {
        fragment.font_size
    } else {
        params.min_font_size
    };
    let family = FontFamily::for_text(translated);
    let max_width = fragment.bbox.width();
    let available_height = fragment.bbox.height() * params.overflow_tolerance;

    let mut last = None;
    for size in candidate_sizes(base, params) {
        let lines: Vec<String> = wrap(translated, measure, family, size, max_width).collect();
        let required_height = lines.len() as f32 * size * params.line_height_factor;
        if required_height <= available_height {
            return Fit {
                font_size: size,
                lines,
                family,
                required_height,
                available_height,
                overflow: false,
            };
        }
        last = Some((size, lines, required_height));
    }

    // `candidate_sizes` always yields the minimum size last.
    let (font_size, lines, required_height) =
        last.unwrap_or_else(|| (min_size(base, params), Vec::new(), 0.0));
    Fit {
        font_size,
        lines,
        family,
        required_height,
        available_height,
        overflow: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    fn mono(text: &str, _: FontFamily, size: f32) -> f32 {
        text.chars().count() as f32 * 0.6 * size
    }

    fn fragment(w: f32, h: f32, size: f32) -> TextFragment {
        TextFragment::new("original", BoundingBox::new(0.0, 0.0, w, h), size)
    }

    #[test]
    fn candidates_descend_on_grid_and_end_at_min() {
        let params = LayoutParams {
            min_scale: 0.4,
            ..LayoutParams::default()
        };
        let sizes: Vec<f32> = candidate_sizes(10.0, &params).collect();
        assert_eq!(sizes.first(), Some(&9.0));
        assert_eq!(sizes.last(), Some(&4.0));
        assert!(sizes.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(sizes.len(), 11);
    }

    #[test]
    fn roomy_box_keeps_scaled_size() {
        let f = fragment(500.0, 50.0, 12.0);
        let out = fit(&f, "short text", &mono, &LayoutParams::default());
        assert!((out.font_size - 10.5).abs() < 1e-4);
        assert_eq!(out.lines, vec!["short text"]);
        assert!(!out.overflow);
    }

    #[test]
    fn long_sentence_wraps_to_width() {
        let f = fragment(100.0, 60.0, 12.0);
        let out = fit(
            &f,
            "A very long English sentence that needs wrapping",
            &mono,
            &LayoutParams::default(),
        );
        assert!(out.lines.len() > 1);
        for l in &out.lines {
            assert!(mono(l, out.family, out.font_size) <= 100.0);
        }
        assert!(!out.overflow);
    }

    #[test]
    fn tiny_box_falls_back_to_minimum_with_overflow() {
        let params = LayoutParams {
            min_scale: 0.4,
            ..LayoutParams::default()
        };
        let f = fragment(20.0, 2.0, 10.0);
        let text = "far too much text for such a small region";
        let out = fit(&f, text, &mono, &params);
        assert!((out.font_size - 4.0).abs() < 1e-4);
        assert!(out.overflow);
        assert!(out.required_height > out.available_height);
        // Nothing is dropped.
        assert_eq!(out.lines.join(" "), text);
    }

    #[test]
    fn lower_scale_never_raises_size() {
        let f = fragment(120.0, 30.0, 12.0);
        let text = "The quick brown fox jumps over the lazy dog again and again";
        let mut previous = f32::INFINITY;
        for scale in [1.2_f32, 1.0, 0.95, 0.9, 0.85, 0.8, 0.7, 0.6, 0.55] {
            let params = LayoutParams {
                font_scale: scale,
                ..LayoutParams::default()
            };
            let size = fit(&f, text, &mono, &params).font_size;
            assert!(size <= previous, "scale {scale} raised size to {size}");
            previous = size;
        }
    }

    #[test]
    fn cjk_translation_selects_cjk_family() {
        let f = fragment(200.0, 20.0, 10.0);
        let out = fit(&f, "你好世界", &mono, &LayoutParams::default());
        assert_eq!(out.family, FontFamily::Cjk);
    }

    #[test]
    fn invalid_font_size_uses_floor() {
        let f = fragment(200.0, 20.0, f32::NAN);
        let out = fit(&f, "text", &mono, &LayoutParams::default());
        assert!(out.font_size.is_finite());
        assert!(out.font_size >= LayoutParams::default().min_font_size);
    }

    #[test]
    fn empty_text_fits_without_lines() {
        let f = fragment(100.0, 10.0, 10.0);
        let out = fit(&f, "", &mono, &LayoutParams::default());
        assert!(out.lines.is_empty());
        assert!(!out.overflow);
    }
}
