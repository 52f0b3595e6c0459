//! Text redistribution: split one translated paragraph back across the
//! fragments it was built from.
//!
//! Each fragment receives a share of the translation proportional to the
//! character length of its original text. Every cut except the last is then
//! pushed forward to just after the first soft break (punctuation or space)
//! found within `snap_window` characters, so pieces tend to end on natural
//! boundaries.
//!
//! The pieces partition the translation exactly: concatenating them gives
//! back the input, and there is always one piece per fragment.

use crate::page::ParagraphGroup;

/// Characters a cut may snap to. The cut lands immediately after them.
pub fn is_soft_break(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '.' | ',' | ';' | ':' | '!' | '?' | ')' | ']'
                | '。' | '，' | '、' | '；' | '：' | '！' | '？'
                | '）' | '」' | '』' | '】' | '》' | '…'
        )
}

/// Split `translated` across the fragments of `group`.
///
/// A single-fragment group receives the translation unchanged.
pub fn redistribute(group: &ParagraphGroup<'_>, translated: &str, snap_window: usize) -> Vec<String> {
    if group.len() == 1 {
        return vec![translated.to_string()];
    }
    let weights: Vec<usize> = group.fragments().map(|f| f.char_len()).collect();
    split_proportional(&weights, translated, snap_window)
}

/// Split `text` into `weights.len()` consecutive pieces sized in proportion
/// to `weights`.
///
/// When every weight is zero the pieces are sized equally. An empty `weights`
/// slice yields no pieces.
pub fn split_proportional(weights: &[usize], text: &str, snap_window: usize) -> Vec<String> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let total: usize = weights.iter().sum();
    let (weights, total): (Vec<usize>, usize) = if total == 0 {
        (vec![1; n], n)
    } else {
        (weights.to_vec(), total)
    };

    let mut cuts = Vec::with_capacity(n);
    let mut cumulative = 0usize;
    let mut prev = 0usize;
    for w in &weights[..n - 1] {
        cumulative += w;
        // u128 keeps `cumulative * len` exact for any realistic input.
        let raw = ((cumulative as u128 * len as u128) / total as u128) as usize;
        let cut = snap_forward(&chars, raw, snap_window).clamp(prev, len);
        cuts.push(cut);
        prev = cut;
    }
    cuts.push(len);

    let mut pieces = Vec::with_capacity(n);
    let mut start = 0usize;
    for cut in cuts {
        pieces.push(chars[start..cut].iter().collect::<String>());
        start = cut;
    }
    pieces
}

/// Move `cut` to just after the first soft break in `chars[cut..cut + window]`.
fn snap_forward(chars: &[char], cut: usize, window: usize) -> usize {
    let end = cut.saturating_add(window).min(chars.len());
    if cut >= end {
        return cut;
    }
    chars[cut..end]
        .iter()
        .position(|&c| is_soft_break(c))
        .map(|offset| cut + offset + 1)
        .unwrap_or(cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::page::TextFragment;

    fn frags(texts: &[&str]) -> Vec<TextFragment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let y = i as f32 * 12.0;
                TextFragment::new(*t, BoundingBox::new(0.0, y, 100.0, y + 10.0), 10.0)
            })
            .collect()
    }

    #[test]
    fn hello_world_split_in_two() {
        let fs = frags(&["Hello ", "world"]);
        let g = ParagraphGroup::from_fragments(&fs).unwrap();
        assert_eq!(redistribute(&g, "你好世界", 10), vec!["你好", "世界"]);
    }

    #[test]
    fn single_fragment_identity() {
        let fs = frags(&["anything at all"]);
        let g = ParagraphGroup::from_fragments(&fs).unwrap();
        for t in ["", "x", "一段很长的翻译文字。还有第二句。", "  spaced  "] {
            assert_eq!(redistribute(&g, t, 10), vec![t.to_string()]);
        }
    }

    #[test]
    fn cut_snaps_after_punctuation() {
        // Proportional cut at 6 ("abcdef|g, hij"); the comma at 7 is within the window.
        let pieces = split_proportional(&[1, 1], "abcdefg, hij", 10);
        assert_eq!(pieces, vec!["abcdefg,", " hij"]);
    }

    #[test]
    fn cut_without_break_in_window_stays_put() {
        let pieces = split_proportional(&[1, 1], "abcdefghijklmnopqrstuvwxyz", 3);
        assert_eq!(pieces, vec!["abcdefghijklm", "nopqrstuvwxyz"]);
    }

    #[test]
    fn zero_window_disables_snapping() {
        let pieces = split_proportional(&[1, 1], "ab, cd", 0);
        assert_eq!(pieces, vec!["ab,", " cd"]);
    }

    #[test]
    fn zero_weights_split_evenly() {
        let pieces = split_proportional(&[0, 0, 0], "abcdef", 0);
        assert_eq!(pieces, vec!["ab", "cd", "ef"]);
    }

    #[test]
    fn short_translation_leaves_empty_tail() {
        let pieces = split_proportional(&[5, 5, 5], "a", 10);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces.concat(), "a");
    }

    #[test]
    fn round_trip_and_cardinality() {
        let samples = [
            "",
            "x",
            "你好，世界。这是一个测试句子，用来检查重新分配。",
            "The quick brown fox jumps over the lazy dog, twice; then rests.",
            "mixed 中文 and English，带标点！",
            "ééé üüü ñññ",
        ];
        let weight_sets: [&[usize]; 5] = [&[1], &[6, 5], &[3, 0, 9], &[1, 1, 1, 1, 1, 1, 1], &[40, 2]];
        for text in samples {
            for weights in weight_sets {
                for window in [0, 1, 10, 50] {
                    let pieces = split_proportional(weights, text, window);
                    assert_eq!(pieces.len(), weights.len(), "{text:?} {weights:?}");
                    assert_eq!(pieces.concat(), text, "{text:?} {weights:?} w={window}");
                }
            }
        }
    }
}
