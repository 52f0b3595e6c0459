//! Text measurement: the one typesetting primitive the fitter relies on.
//!
//! The compositor owns the real fonts, so the engine only sees a
//! [`TextMeasure`] that returns advance widths in page units. Any
//! `Fn(&str, FontFamily, f32) -> f32` closure is a valid measure, which keeps
//! tests free of font files. [`ApproxMetrics`] is the built-in fallback used
//! when no measure is injected.
//!
//! Implementations are shared across concurrent group fits and must be safe
//! for concurrent read-only use.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two font families the compositor is expected to provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFamily {
    #[default]
    Latin,
    Cjk,
}

impl FontFamily {
    /// CJK-capable family as soon as the text holds any CJK character.
    pub fn for_text(text: &str) -> Self {
        if text.chars().any(is_cjk_char) {
            FontFamily::Cjk
        } else {
            FontFamily::Latin
        }
    }
}

impl fmt::Display for FontFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontFamily::Latin => f.write_str("latin"),
            FontFamily::Cjk => f.write_str("cjk"),
        }
    }
}

/// Characters that need a CJK-capable font (Han, kana, Hangul, CJK punctuation,
/// full-width forms).
pub fn is_cjk_char(c: char) -> bool {
    is_unspaced_char(c) || matches!(c, '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}')
}

/// Characters from scripts written without spaces between words.
///
/// Hangul is deliberately absent: Korean separates words with spaces.
pub fn is_unspaced_char(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3000}'..='\u{303F}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{FF00}'..='\u{FFEF}'
        | '\u{20000}'..='\u{2A6DF}')
}

/// Returns the rendered advance width of `text` at `font_size`.
pub trait TextMeasure: Send + Sync {
    fn measure(&self, text: &str, family: FontFamily, font_size: f32) -> f32;
}

impl<F> TextMeasure for F
where
    F: Fn(&str, FontFamily, f32) -> f32 + Send + Sync,
{
    fn measure(&self, text: &str, family: FontFamily, font_size: f32) -> f32 {
        self(text, family, font_size)
    }
}

/// Per-character width estimates, expressed as a fraction of the font size.
///
/// Good enough to pick line breaks that a Helvetica- or SimSun-like font will
/// honour within a few percent; not a substitute for real glyph metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproxMetrics {
    /// Advance of a full-width (ideographic) character.
    pub wide: f32,
    /// Advance of an average Latin lowercase letter.
    pub average: f32,
    pub space: f32,
    pub narrow: f32,
    pub broad: f32,
    pub uppercase: f32,
}

impl Default for ApproxMetrics {
    fn default() -> Self {
        Self {
            wide: 1.0,
            average: 0.5,
            space: 0.28,
            narrow: 0.28,
            broad: 0.83,
            uppercase: 0.67,
        }
    }
}

impl ApproxMetrics {
    fn char_ratio(&self, c: char, family: FontFamily) -> f32 {
        if is_cjk_char(c) {
            return self.wide;
        }
        // CJK fonts ship half-width Latin glyphs.
        if family == FontFamily::Cjk {
            return self.average;
        }
        match c {
            ' ' | '\u{00A0}' => self.space,
            'i' | 'l' | 'j' | 't' | 'f' | 'r' | 'I' | '.' | ',' | ';' | ':' | '!' | '|'
            | '\'' | '`' | '(' | ')' | '[' | ']' => self.narrow,
            'm' | 'w' | 'M' | 'W' | '@' | '%' => self.broad,
            c if c.is_uppercase() => self.uppercase,
            _ => self.average,
        }
    }
}

impl TextMeasure for ApproxMetrics {
    fn measure(&self, text: &str, family: FontFamily, font_size: f32) -> f32 {
        text.chars()
            .map(|c| self.char_ratio(c, family))
            .sum::<f32>()
            * font_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_detection() {
        assert_eq!(FontFamily::for_text("Hello world"), FontFamily::Latin);
        assert_eq!(FontFamily::for_text("Hello 世界"), FontFamily::Cjk);
        assert_eq!(FontFamily::for_text("안녕하세요"), FontFamily::Cjk);
        assert_eq!(FontFamily::for_text(""), FontFamily::Latin);
    }

    #[test]
    fn hangul_is_spaced() {
        assert!(is_cjk_char('한'));
        assert!(!is_unspaced_char('한'));
        assert!(is_unspaced_char('中'));
        assert!(is_unspaced_char('。'));
        assert!(is_unspaced_char('カ'));
    }

    #[test]
    fn approx_metrics_scale_linearly() {
        let m = ApproxMetrics::default();
        let a = m.measure("abc", FontFamily::Latin, 10.0);
        let b = m.measure("abc", FontFamily::Latin, 20.0);
        assert!((b - 2.0 * a).abs() < 1e-4);
        assert!((m.measure("中文", FontFamily::Cjk, 10.0) - 20.0).abs() < 1e-4);
        assert!(m.measure("i", FontFamily::Latin, 10.0) < m.measure("M", FontFamily::Latin, 10.0));
    }

    #[test]
    fn closures_are_measures() {
        let fixed = |t: &str, _: FontFamily, size: f32| t.chars().count() as f32 * 0.6 * size;
        assert!((fixed.measure("abcde", FontFamily::Latin, 10.0) - 30.0).abs() < 1e-4);
    }
}
