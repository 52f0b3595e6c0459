//! Source-side data model: positioned text fragments and the pages that own them.
//!
//! Fragments are read-only to the reflow engine. Translated text and render
//! parameters are carried separately in [`crate::output::RenderPlan`], so a
//! page can be re-flowed any number of times with different settings.

use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

fn default_font_size() -> f32 {
    12.0
}

/// One positioned run of text with a single font and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub font_name: String,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// 24-bit packed `0xRRGGBB`.
    #[serde(default, alias = "font_color")]
    pub color: u32,
    #[serde(default, alias = "is_bold")]
    pub bold: bool,
    #[serde(default, alias = "is_italic")]
    pub italic: bool,
    #[serde(default, alias = "block_no")]
    pub block_index: usize,
    #[serde(default, alias = "line_no")]
    pub line_index: usize,
}

impl TextFragment {
    /// Minimal constructor used by tests and adapters; style fields default.
    pub fn new(text: impl Into<String>, bbox: BoundingBox, font_size: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            font_name: String::new(),
            font_size,
            color: 0,
            bold: false,
            italic: false,
            block_index: 0,
            line_index: 0,
        }
    }

    /// True when the fragment carries anything worth translating.
    pub fn is_eligible(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Character count of the original text (not bytes).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// All fragments of one page plus its dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    /// 0-indexed page number in the source document.
    #[serde(default)]
    pub page_no: usize,
    pub width: f32,
    pub height: f32,
    #[serde(default, alias = "blocks", alias = "text_blocks")]
    pub fragments: Vec<TextFragment>,
}

impl PageContent {
    /// Fragments eligible for translation, paired with their index in
    /// [`PageContent::fragments`].
    pub fn eligible_fragments(&self) -> impl Iterator<Item = (usize, &TextFragment)> {
        self.fragments
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_eligible())
    }
}

/// Every page handed over by the document source.
///
/// Accepts either `{"title": ..., "pages": [...]}` or a bare array of pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentRepr")]
pub struct SourceDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub pages: Vec<PageContent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentRepr {
    Wrapped {
        #[serde(default)]
        title: Option<String>,
        pages: Vec<PageContent>,
    },
    Bare(Vec<PageContent>),
}

impl From<DocumentRepr> for SourceDocument {
    fn from(repr: DocumentRepr) -> Self {
        match repr {
            DocumentRepr::Wrapped { title, pages } => Self { title, pages },
            DocumentRepr::Bare(pages) => Self { title: None, pages },
        }
    }
}

impl SourceDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn fragment_count(&self) -> usize {
        self.pages.iter().map(|p| p.fragments.len()).sum()
    }
}

/// Fragments believed to form one logical paragraph, in reading order.
///
/// Each member keeps the index it had in the sequence handed to the grouper
/// so results can be re-assembled in emission order after a concurrent
/// fan-out. A group is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphGroup<'a> {
    members: Vec<(usize, &'a TextFragment)>,
}

impl<'a> ParagraphGroup<'a> {
    pub(crate) fn seed(index: usize, fragment: &'a TextFragment) -> Self {
        Self {
            members: vec![(index, fragment)],
        }
    }

    pub(crate) fn push(&mut self, index: usize, fragment: &'a TextFragment) {
        self.members.push((index, fragment));
    }

    /// Build a group directly from fragments, indexed from zero.
    pub fn from_fragments(fragments: &'a [TextFragment]) -> Option<Self> {
        if fragments.is_empty() {
            return None;
        }
        Some(Self {
            members: fragments.iter().enumerate().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[(usize, &'a TextFragment)] {
        &self.members
    }

    pub fn fragments(&self) -> impl Iterator<Item = &'a TextFragment> + '_ {
        self.members.iter().map(|(_, f)| *f)
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().map(|(i, _)| *i)
    }

    /// The most recently added member.
    pub fn last(&self) -> &'a TextFragment {
        // Groups are created through `seed`, so there is always one member.
        self.members[self.members.len() - 1].1
    }

    /// Member texts joined with a single space, each trimmed, blanks skipped.
    pub fn combined_text(&self) -> String {
        self.fragments()
            .map(|f| f.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Union of all member boxes.
    pub fn bbox(&self) -> BoundingBox {
        self.fragments()
            .map(|f| f.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default()
    }
}
