//! Greedy line wrapping against a [`TextMeasure`].
//!
//! Text written without spaces between words (Chinese, Japanese) is wrapped
//! one character at a time, with embedded Latin words and numbers kept whole;
//! everything else is wrapped at whitespace-delimited words. A token that is wider than the line on its own is emitted alone on
//! its line rather than split, so wrapping always terminates.
//!
//! [`wrap`] returns a lazy [`Lines`] iterator. It borrows its inputs and holds
//! no other state, so the fitter can call it repeatedly (or clone it) while
//! searching for a font size.

use crate::measure::{is_unspaced_char, FontFamily, TextMeasure};
use std::str::SplitWhitespace;

/// Share of unspaced-script characters above which text is wrapped per character.
pub const UNSPACED_RATIO: f32 = 0.3;

/// Token size used when breaking lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Word,
    Char,
}

impl Granularity {
    /// Pick the granularity from the share of unspaced-script characters
    /// among the non-whitespace characters of `text`.
    pub fn detect(text: &str) -> Self {
        let mut total = 0usize;
        let mut unspaced = 0usize;
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            total += 1;
            if is_unspaced_char(c) {
                unspaced += 1;
            }
        }
        if total > 0 && unspaced as f32 / total as f32 > UNSPACED_RATIO {
            Granularity::Char
        } else {
            Granularity::Word
        }
    }
}

#[derive(Clone)]
enum Tokens<'a> {
    Words(SplitWhitespace<'a>),
    /// Breaks after every unspaced character but never inside a run of other
    /// non-whitespace characters. Whitespace runs come out as one `" "`.
    Chars(&'a str),
}

/// Byte length of the leading run of `rest` whose characters satisfy `pred`.
fn run_len(rest: &str, pred: impl Fn(char) -> bool) -> usize {
    rest.char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(rest.len(), |(i, _)| i)
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        match self {
            Tokens::Words(words) => words.next(),
            Tokens::Chars(rest) => {
                let text: &'a str = *rest;
                let c = text.chars().next()?;
                let (token, len) = if c.is_whitespace() {
                    (" ", run_len(text, char::is_whitespace))
                } else if is_unspaced_char(c) {
                    (&text[..c.len_utf8()], c.len_utf8())
                } else {
                    let len = run_len(text, |c| !c.is_whitespace() && !is_unspaced_char(c));
                    (&text[..len], len)
                };
                *rest = &text[len..];
                Some(token)
            }
        }
    }
}

/// Lazy sequence of wrapped lines. See [`wrap`].
#[derive(Clone)]
pub struct Lines<'a> {
    tokens: Tokens<'a>,
    pending: Option<&'a str>,
    measure: &'a dyn TextMeasure,
    family: FontFamily,
    font_size: f32,
    max_width: f32,
    granularity: Granularity,
}

impl<'a> Lines<'a> {
    fn first_token(&mut self) -> Option<&'a str> {
        let pending = self.pending.take();
        pending
            .into_iter()
            .chain(self.tokens.by_ref())
            .find(|t| !t.trim().is_empty())
    }

    fn fits(&self, line: &str) -> bool {
        self.measure.measure(line, self.family, self.font_size) <= self.max_width
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let first = self.first_token()?;
        let mut line = String::from(first);

        while let Some(token) = self.tokens.next() {
            let mut candidate = line.clone();
            match self.granularity {
                Granularity::Word => {
                    candidate.push(' ');
                    candidate.push_str(token);
                }
                Granularity::Char if token.trim().is_empty() => candidate.push(' '),
                Granularity::Char => candidate.push_str(token),
            }
            if self.fits(candidate.trim_end()) {
                line = candidate;
            } else {
                self.pending = Some(token);
                break;
            }
        }

        line.truncate(line.trim_end().len());
        Some(line)
    }
}

/// Wrap `text` into lines no wider than `max_width` at `font_size`.
///
/// The first token of every line is always accepted, so a token wider than
/// `max_width` produces an over-wide line of its own. Empty or
/// whitespace-only input yields no lines.
pub fn wrap<'a>(
    text: &'a str,
    measure: &'a dyn TextMeasure,
    family: FontFamily,
    font_size: f32,
    max_width: f32,
) -> Lines<'a> {
    let granularity = Granularity::detect(text);
    let tokens = match granularity {
        Granularity::Word => Tokens::Words(text.split_whitespace()),
        Granularity::Char => Tokens::Chars(text),
    };
    Lines {
        tokens,
        pending: None,
        measure,
        family,
        font_size,
        max_width,
        granularity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is `0.6 * size` wide.
    fn mono(text: &str, _: FontFamily, size: f32) -> f32 {
        text.chars().count() as f32 * 0.6 * size
    }

    fn lines(text: &str, size: f32, max_width: f32) -> Vec<String> {
        wrap(text, &mono, FontFamily::Latin, size, max_width).collect()
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(lines("", 12.0, 100.0).is_empty());
        assert!(lines("   \n\t ", 12.0, 100.0).is_empty());
    }

    #[test]
    fn long_sentence_wraps_within_width() {
        let text = "A very long English sentence that needs wrapping";
        let out = lines(text, 12.0, 100.0);
        assert!(out.len() > 1);
        for l in &out {
            assert!(mono(l, FontFamily::Latin, 12.0) <= 100.0, "line too wide: {l:?}");
        }
        assert_eq!(out.join(" "), text);
    }

    #[test]
    fn overlong_word_gets_its_own_line() {
        let out = lines("a supercalifragilistic b", 10.0, 30.0);
        assert_eq!(out, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn words_are_never_split() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let words: Vec<&str> = text.split_whitespace().collect();
        for width in [1.0_f32, 20.0, 35.0, 60.0, 200.0, 1000.0] {
            let out = lines(text, 10.0, width);
            let rejoined: Vec<&str> = out.iter().flat_map(|l| l.split_whitespace()).collect();
            assert_eq!(rejoined, words, "width={width}");
        }
    }

    #[test]
    fn cjk_wraps_per_character() {
        let text = "这是一个需要换行的中文句子";
        let out: Vec<String> = wrap(text, &mono, FontFamily::Cjk, 10.0, 30.0).collect();
        // 30 / 6 = 5 characters per line.
        assert_eq!(out, vec!["这是一个需", "要换行的中", "文句子"]);
        assert_eq!(out.concat(), text);
    }

    #[test]
    fn char_mode_drops_spaces_at_line_edges() {
        let text = "中文 English 混排";
        let out: Vec<String> = wrap(text, &mono, FontFamily::Cjk, 10.0, 18.0).collect();
        for l in &out {
            assert_eq!(l.trim(), l.as_str());
            assert!(!l.is_empty());
        }
    }

    #[test]
    fn mixed_script_keeps_latin_words_whole() {
        let text = "模型的准确率 accuracy 很高";
        let out: Vec<String> = wrap(text, &mono, FontFamily::Cjk, 10.0, 61.0).collect();
        assert_eq!(out, vec!["模型的准确率", "accuracy 很", "高"]);
        for l in &out {
            let latin: String = l.chars().filter(|c| c.is_ascii_alphabetic()).collect();
            assert!(latin.is_empty() || latin == "accuracy", "split word in {l:?}");
        }
    }

    #[test]
    fn digits_stay_attached_in_char_mode() {
        let out: Vec<String> = wrap("第2024年度报告", &mono, FontFamily::Cjk, 10.0, 25.0).collect();
        assert!(out.iter().any(|l| l.contains("2024")), "got {out:?}");
    }

    #[test]
    fn whitespace_runs_collapse() {
        let out: Vec<String> = wrap("中文\n\n中文", &mono, FontFamily::Cjk, 10.0, 500.0).collect();
        assert_eq!(out, vec!["中文 中文"]);
        let out: Vec<String> = wrap("模型  \t 准确", &mono, FontFamily::Cjk, 10.0, 500.0).collect();
        assert_eq!(out, vec!["模型 准确"]);
    }

    #[test]
    fn granularity_detection() {
        assert_eq!(Granularity::detect("plain english"), Granularity::Word);
        assert_eq!(Granularity::detect("中文"), Granularity::Char);
        assert_eq!(Granularity::detect("한국어 문장"), Granularity::Word);
        assert_eq!(Granularity::detect("Model 模型 accuracy"), Granularity::Word);
        assert_eq!(Granularity::detect("模型的准确率 accuracy"), Granularity::Char);
        assert_eq!(Granularity::detect(""), Granularity::Word);
    }

    #[test]
    fn lines_are_restartable() {
        let text = "one two three four five six";
        let it = wrap(text, &mono, FontFamily::Latin, 10.0, 40.0);
        let a: Vec<String> = it.clone().collect();
        let b: Vec<String> = it.collect();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_width_still_terminates() {
        let out = lines("a b c", 10.0, 0.0);
        assert_eq!(out, vec!["a", "b", "c"]);
    }
}
