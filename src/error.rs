//! Error types for the pdf-reflow library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`ReflowError`]: **Fatal**: the run (or one page) cannot proceed
//!   (unreadable input, translator not configured, or an internal invariant
//!   broke). Returned as `Err(ReflowError)`.
//!
//! * [`Diagnostic`]: **Non-fatal**: something about one fragment or group
//!   was degraded (bad bounding box, translation failure, font-size overflow)
//!   but the page still produced a complete set of render plans. Collected
//!   into [`crate::output::PageReflow::diagnostics`].
//!
//! Callers decide their own tolerance: treat any diagnostic as fatal, log and
//! continue, or collect them for a post-run report.

use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Orchestrator stage in which a failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflowStage {
    Grouping,
    Translating,
    Redistributing,
    Fitting,
    Done,
}

impl fmt::Display for ReflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReflowStage::Grouping => "grouping",
            ReflowStage::Translating => "translating",
            ReflowStage::Redistributing => "redistributing",
            ReflowStage::Fitting => "fitting",
            ReflowStage::Done => "done",
        };
        f.write_str(s)
    }
}

/// All fatal errors returned by the pdf-reflow library.
#[derive(Debug, Error)]
pub enum ReflowError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input was read but is not a fragments document.
    #[error("Could not parse '{source_name}' as a fragments document: {detail}")]
    ParseFailed { source_name: String, detail: String },

    /// Page selection does not match any page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Translator errors ─────────────────────────────────────────────────
    /// The configured translator could not be constructed.
    #[error("Translator '{translator}' is not configured.\n{hint}")]
    TranslatorNotConfigured { translator: String, hint: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// An internal invariant broke (e.g. redistribution changed the fragment
    /// count). Indicates a bug; the offending page is aborted.
    #[error("Invariant violated on page {page}, group {group} while {stage}: {detail}")]
    InvariantViolation {
        page: usize,
        group: usize,
        stage: ReflowStage,
        detail: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Taxonomy class of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    DataQuality,
    TranslationFailure,
    FitOverflow,
}

/// A non-fatal problem with one fragment or group.
///
/// `page` is 1-indexed, `fragment` indexes [`crate::page::PageContent::fragments`]
/// and `group` is the paragraph group's position in reading order.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Malformed source data that was clamped or skipped.
    #[error("Page {page}, fragment {fragment}: {detail}")]
    DataQuality {
        page: usize,
        fragment: usize,
        detail: String,
    },

    /// The translator failed for a group; its fragments keep their original text.
    #[error("Page {page}, group {group} at {bbox:?}: translation failed: {detail}")]
    TranslationFailed {
        page: usize,
        group: usize,
        bbox: BoundingBox,
        detail: String,
    },

    /// Even the minimum font size overflows the fragment's box.
    #[error(
        "Page {page}, fragment {fragment}: text overflows its box at {font_size:.1}pt \
         ({required_height:.1} needed, {available_height:.1} available)"
    )]
    FitOverflow {
        page: usize,
        fragment: usize,
        font_size: f32,
        required_height: f32,
        available_height: f32,
    },

    /// A Markdown text segment kept its original text.
    #[error("Markdown segment {segment}: translation failed: {detail}")]
    SegmentTranslationFailed { segment: usize, detail: String },

    /// Redistribution left a fragment with no text.
    #[error("Page {page}, fragment {fragment}: received an empty share of the translation")]
    EmptyText { page: usize, fragment: usize },
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Diagnostic::DataQuality { .. } | Diagnostic::EmptyText { .. } => {
                DiagnosticKind::DataQuality
            }
            Diagnostic::TranslationFailed { .. } | Diagnostic::SegmentTranslationFailed { .. } => {
                DiagnosticKind::TranslationFailure
            }
            Diagnostic::FitOverflow { .. } => DiagnosticKind::FitOverflow,
        }
    }

    /// 1-indexed page the diagnostic belongs to; `None` for Markdown segments.
    pub fn page(&self) -> Option<usize> {
        match self {
            Diagnostic::DataQuality { page, .. }
            | Diagnostic::TranslationFailed { page, .. }
            | Diagnostic::FitOverflow { page, .. }
            | Diagnostic::EmptyText { page, .. } => Some(*page),
            Diagnostic::SegmentTranslationFailed { .. } => None,
        }
    }
}
