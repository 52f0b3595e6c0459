//! Pipeline stages for layout-preserving reflow.
//!
//! Each submodule implements one transformation step, independently
//! testable. The orchestrator in [`crate::reflow`] threads a page through
//! them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ group ──▶ translate ──▶ redistribute ──▶ fit (wrap)
//! (JSON)    (paragraphs) (backend)   (per fragment)   (font size)
//!                                                        │
//!                                   classify ◀───────────┘ (Markdown export)
//! ```
//!
//! 1. [`input`]        load a fragments document from a path or URL
//! 2. [`group`]        merge reading-order fragments into paragraph groups
//! 3. [`translate`]    translator backends with retry and timeout
//! 4. [`redistribute`] split a group's translation back over its fragments
//! 5. [`fit`]          pick the largest font size whose wrapped lines fit
//!    the fragment's box, using [`wrap`] for line breaking
//! 6. [`classify`]     role classification and Markdown export
//!
//! [`markdown`] is the Markdown-to-Markdown sibling pipeline and
//! [`postprocess`] cleans any Markdown either one emits.

pub mod classify;
pub mod fit;
pub mod group;
pub mod input;
pub mod markdown;
pub mod postprocess;
pub mod redistribute;
pub mod translate;
pub mod wrap;
