//! Reflow orchestration and eager (full-document) entry points.
//!
//! Each page runs through `Grouping → Translating → Redistributing → Fitting
//! → Done`. Groups are independent, so after grouping they fan out through a
//! bounded `buffer_unordered` pool sized by `config.concurrency`; the plans
//! are sorted back into fragment order before the page is emitted, so the
//! output does not depend on which group finished first.
//!
//! Only an invariant violation aborts a page. A failed or timed-out
//! translation leaves the group's fragments with their original text and
//! records a diagnostic; fit overflow and bad boxes are diagnostics too.
//!
//! Use [`crate::stream::reflow_stream`] instead of [`reflow`] to receive
//! pages as they complete.

use crate::config::ReflowConfig;
use crate::error::{Diagnostic, ReflowError, ReflowStage};
use crate::measure::{ApproxMetrics, TextMeasure};
use crate::output::{
    DocumentSummary, MarkdownOutput, OutputFormat, PageReflow, RenderPlan, ReflowOutput,
    ReflowStats,
};
use crate::page::{PageContent, ParagraphGroup, SourceDocument, TextFragment};
use crate::pipeline::classify::{render_document_markdown, MarkdownExport};
use crate::pipeline::fit::fit;
use crate::pipeline::group::group_fragments;
use crate::pipeline::input;
use crate::pipeline::markdown::translate_markdown;
use crate::pipeline::redistribute::redistribute;
use crate::pipeline::translate::{
    resolve_translator, should_skip, translate_with_timeout, Translator,
};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Borrowed collaborators for one page.
#[derive(Clone, Copy)]
struct PageJob<'a> {
    page_num: usize,
    translator: &'a dyn Translator,
    measure: &'a dyn TextMeasure,
    config: &'a ReflowConfig,
}

struct GroupOutcome {
    group: usize,
    members: usize,
    plans: Vec<RenderPlan>,
    diagnostics: Vec<Diagnostic>,
    failed: bool,
}

impl GroupOutcome {
    /// Every member of the group must come back with exactly one plan.
    fn check_coverage(&self, page_num: usize) -> Result<(), ReflowError> {
        if self.plans.len() == self.members {
            return Ok(());
        }
        Err(ReflowError::InvariantViolation {
            page: page_num,
            group: self.group,
            stage: ReflowStage::Done,
            detail: format!(
                "{} render plans for {} eligible fragments",
                self.plans.len(),
                self.members
            ),
        })
    }
}

/// The configured measure, or [`ApproxMetrics`] when none is set.
pub fn resolve_measure(config: &ReflowConfig) -> Arc<dyn TextMeasure> {
    match config.measure {
        Some(ref m) => Arc::clone(m),
        None => Arc::new(ApproxMetrics::default()),
    }
}

/// Reflow one page.
///
/// `page_num` is the 1-indexed number used in diagnostics and logs.
///
/// # Errors
/// Only [`ReflowError::InvariantViolation`]; every other problem is reported
/// in [`PageReflow::diagnostics`].
pub async fn reflow_page(
    page: &PageContent,
    page_num: usize,
    translator: &dyn Translator,
    measure: &dyn TextMeasure,
    config: &ReflowConfig,
) -> Result<PageReflow, ReflowError> {
    let start = Instant::now();
    let job = PageJob {
        page_num,
        translator,
        measure,
        config,
    };

    // ── Grouping ─────────────────────────────────────────────────────────
    let eligible: Vec<(usize, &TextFragment)> = page.eligible_fragments().collect();
    let mut diagnostics = Vec::new();
    for (index, fragment) in &eligible {
        if fragment.bbox.is_malformed() {
            let detail = format!("malformed bounding box {:?}, extents clamped to zero", fragment.bbox);
            warn!("Page {}, fragment {}: {}", page_num, index, detail);
            diagnostics.push(Diagnostic::DataQuality {
                page: page_num,
                fragment: *index,
                detail,
            });
        }
    }

    let groups = group_fragments(eligible.iter().copied(), &config.layout);
    let group_count = groups.len();
    debug!(
        "Page {}: {} eligible fragments in {} groups",
        page_num,
        eligible.len(),
        group_count
    );

    // ── Translating → Redistributing → Fitting, per group ────────────────
    let jobs: Vec<_> = groups
        .into_iter()
        .enumerate()
        .map(|(index, group)| process_group(job, index, group))
        .collect();
    let outcomes: Vec<Result<GroupOutcome, ReflowError>> = stream::iter(jobs)
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    let mut plans = Vec::with_capacity(eligible.len());
    let mut failed_groups = 0;
    for outcome in outcomes {
        let outcome = outcome?;
        outcome.check_coverage(page_num)?;
        if outcome.failed {
            failed_groups += 1;
        }
        plans.extend(outcome.plans);
        diagnostics.extend(outcome.diagnostics);
    }

    // ── Done ─────────────────────────────────────────────────────────────
    plans.sort_by_key(|p| p.fragment_index);

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Page {}: {} plans, {} groups ({} failed), {} diagnostics, {}ms",
        page_num,
        plans.len(),
        group_count,
        failed_groups,
        diagnostics.len(),
        duration_ms
    );

    Ok(PageReflow {
        page_num,
        width: page.width,
        height: page.height,
        plans,
        diagnostics,
        groups: group_count,
        failed_groups,
        duration_ms,
    })
}

async fn process_group(
    job: PageJob<'_>,
    index: usize,
    group: ParagraphGroup<'_>,
) -> Result<GroupOutcome, ReflowError> {
    let page_num = job.page_num;
    let combined = group.combined_text();
    let mut diagnostics = Vec::new();

    // ── Translating ──────────────────────────────────────────────────────
    let translated = if should_skip(&combined) {
        debug!("Page {}, group {}: skipped ({:?})", page_num, index, combined);
        None
    } else {
        let result =
            translate_with_timeout(job.translator, &combined, job.config.api_timeout_secs).await;
        let outcome = match result {
            Ok(t) if t.trim().is_empty() => Err("translator returned an empty string".to_string()),
            Ok(t) => Ok(t.trim().to_string()),
            Err(e) => Err(e.to_string()),
        };
        match outcome {
            Ok(t) => Some(t),
            Err(detail) => {
                warn!(
                    "Page {}, group {}: translation failed, keeping original text: {}",
                    page_num, index, detail
                );
                diagnostics.push(Diagnostic::TranslationFailed {
                    page: page_num,
                    group: index,
                    bbox: group.bbox(),
                    detail,
                });
                None
            }
        }
    };
    let failed = !diagnostics.is_empty();

    // ── Redistributing ───────────────────────────────────────────────────
    let pieces: Vec<String> = match translated {
        Some(ref t) => redistribute(&group, t, job.config.layout.snap_window),
        None => group.fragments().map(|f| f.text.trim().to_string()).collect(),
    };
    if pieces.len() != group.len() {
        return Err(ReflowError::InvariantViolation {
            page: page_num,
            group: index,
            stage: ReflowStage::Redistributing,
            detail: format!("expected {} pieces, got {}", group.len(), pieces.len()),
        });
    }

    // ── Fitting ──────────────────────────────────────────────────────────
    let is_translated = translated.is_some();
    let mut plans = Vec::with_capacity(pieces.len());
    for ((fragment_index, fragment), piece) in group.members().iter().zip(pieces) {
        if piece.trim().is_empty() {
            warn!(
                "Page {}, fragment {}: empty share of the translation",
                page_num, fragment_index
            );
            diagnostics.push(Diagnostic::EmptyText {
                page: page_num,
                fragment: *fragment_index,
            });
        }

        let fitted = fit(fragment, &piece, job.measure, &job.config.layout);
        if fitted.overflow {
            warn!(
                "Page {}, fragment {}: overflow at {:.1}pt ({:.1} > {:.1})",
                page_num,
                fragment_index,
                fitted.font_size,
                fitted.required_height,
                fitted.available_height
            );
            diagnostics.push(Diagnostic::FitOverflow {
                page: page_num,
                fragment: *fragment_index,
                font_size: fitted.font_size,
                required_height: fitted.required_height,
                available_height: fitted.available_height,
            });
        }

        plans.push(RenderPlan {
            fragment_index: *fragment_index,
            target_bbox: fragment.bbox,
            text: piece,
            lines: fitted.lines,
            font_size: fitted.font_size,
            font_family: fitted.family,
            color: fragment.color,
            translated: is_translated,
            overflow: fitted.overflow,
        });
    }

    Ok(GroupOutcome {
        group: index,
        members: group.len(),
        plans,
        diagnostics,
        failed,
    })
}

/// Reflow a page with progress events; shared by the eager and streaming APIs.
pub(crate) async fn run_page(
    page: &PageContent,
    page_num: usize,
    total: usize,
    translator: &dyn Translator,
    measure: &dyn TextMeasure,
    config: &ReflowConfig,
) -> Result<PageReflow, ReflowError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_num, total);
    }
    let result = reflow_page(page, page_num, translator, measure, config).await;
    if let Some(ref cb) = config.progress_callback {
        match &result {
            Ok(p) => cb.on_page_complete(page_num, total, p.plans.len()),
            Err(e) => cb.on_page_error(page_num, total, &e.to_string()),
        }
    }
    result
}

/// Reflow every selected page of an already-loaded document.
///
/// # Returns
/// `Ok(ReflowOutput)` even if some pages failed (check
/// `output.stats.failed_pages`).
///
/// # Errors
/// - No page matches the selection
/// - The translator cannot be constructed
/// - Every selected page failed (the first error is returned)
pub async fn reflow_document(
    doc: &SourceDocument,
    config: &ReflowConfig,
) -> Result<ReflowOutput, ReflowError> {
    let total_start = Instant::now();
    let selected = input::select_pages(doc, &config.pages)?;
    if selected.is_empty() {
        return Err(ReflowError::PageOutOfRange {
            page: 0,
            total: doc.page_count(),
        });
    }
    let total = selected.len();

    let translator = resolve_translator(config)?;
    let measure = resolve_measure(config);
    info!(
        "Reflowing {} of {} pages via '{}' translator",
        total,
        doc.page_count(),
        translator.name()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_reflow_start(total);
    }

    let jobs: Vec<_> = selected
        .iter()
        .map(|(page_num, page)| {
            let page_num = *page_num;
            let translator = translator.as_ref();
            let measure = measure.as_ref();
            async move {
                let result = run_page(page, page_num, total, translator, measure, config).await;
                (page_num, result)
            }
        })
        .collect();
    let results: Vec<(usize, Result<PageReflow, ReflowError>)> = stream::iter(jobs)
        .buffer_unordered(config.page_concurrency)
        .collect()
        .await;

    let mut pages = Vec::with_capacity(total);
    let mut first_error: Option<ReflowError> = None;
    let mut failed_pages = 0;
    for (page_num, result) in results {
        match result {
            Ok(page) => pages.push(page),
            Err(e) => {
                warn!("Page {} aborted: {}", page_num, e);
                failed_pages += 1;
                first_error.get_or_insert(e);
            }
        }
    }
    pages.sort_by_key(|p| p.page_num);

    if pages.is_empty() {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    let stats = ReflowStats {
        total_pages: doc.page_count(),
        processed_pages: pages.len(),
        failed_pages,
        fragments: selected.iter().map(|(_, p)| p.eligible_fragments().count()).sum(),
        groups: pages.iter().map(|p| p.groups).sum(),
        failed_groups: pages.iter().map(|p| p.failed_groups).sum(),
        overflowed_fragments: pages.iter().map(|p| p.overflowed()).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Reflow complete: {}/{} pages, {} groups ({} failed), {} overflowed, {}ms total",
        stats.processed_pages,
        total,
        stats.groups,
        stats.failed_groups,
        stats.overflowed_fragments,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_reflow_complete(total, stats.processed_pages);
    }

    Ok(ReflowOutput {
        title: doc.title.clone(),
        pages,
        stats,
    })
}

/// Load a fragments document from a path or URL and reflow it.
///
/// This is the primary entry point for the library.
pub async fn reflow(
    input_str: impl AsRef<str>,
    config: &ReflowConfig,
) -> Result<ReflowOutput, ReflowError> {
    let input_str = input_str.as_ref();
    info!("Starting reflow: {}", input_str);
    let doc = input::load_document(input_str, config.download_timeout_secs).await?;
    reflow_document(&doc, config).await
}

/// Synchronous wrapper around [`reflow`].
///
/// Creates a temporary tokio runtime internally.
pub fn reflow_sync(
    input_str: impl AsRef<str>,
    config: &ReflowConfig,
) -> Result<ReflowOutput, ReflowError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReflowError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(reflow(input_str, config))
}

/// Markdown export of a finished run.
pub fn render_markdown(doc: &SourceDocument, output: &ReflowOutput, config: &ReflowConfig) -> String {
    let pages = output.pages.iter().filter_map(|reflowed| {
        doc.pages
            .get(reflowed.page_num.checked_sub(1)?)
            .map(|page| (reflowed.page_num, page, Some(reflowed)))
    });
    render_document_markdown(
        pages,
        MarkdownExport {
            title: doc.title.as_deref(),
            bilingual: config.bilingual,
            include_page_breaks: config.include_page_breaks,
        },
    )
}

/// Reflow a document and write the result directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn reflow_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    format: OutputFormat,
    config: &ReflowConfig,
) -> Result<ReflowStats, ReflowError> {
    let doc = input::load_document(input_str.as_ref(), config.download_timeout_secs).await?;
    let output = reflow_document(&doc, config).await?;
    let contents = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&output)
            .map_err(|e| ReflowError::Internal(format!("Failed to serialise output: {e}")))?,
        OutputFormat::Markdown => render_markdown(&doc, &output, config),
    };
    write_atomic(output_path.as_ref(), &contents).await?;
    Ok(output.stats)
}

/// Translate a Markdown file, optionally writing the result.
pub async fn translate_markdown_file(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &ReflowConfig,
) -> Result<MarkdownOutput, ReflowError> {
    let path = input_path.as_ref();
    let markdown = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ReflowError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            ReflowError::FileNotFound {
                path: path.to_path_buf(),
            }
        }
    })?;

    let translator = resolve_translator(config)?;
    let output = translate_markdown(&markdown, translator, config).await;
    if let Some(out) = output_path {
        write_atomic(out, &output.markdown).await?;
    }
    Ok(output)
}

/// Counts for a document without translating anything.
///
/// Does not require a translator or API key.
pub fn summarize(doc: &SourceDocument, config: &ReflowConfig) -> Result<DocumentSummary, ReflowError> {
    let selected = input::select_pages(doc, &config.pages)?;
    let mut summary = DocumentSummary {
        title: doc.title.clone(),
        pages: doc.page_count(),
        selected_pages: selected.len(),
        fragments: doc.fragment_count(),
        ..Default::default()
    };
    for (_, page) in selected {
        let eligible: Vec<_> = page.eligible_fragments().collect();
        summary.malformed_boxes += eligible.iter().filter(|(_, f)| f.bbox.is_malformed()).count();
        summary.groups += group_fragments(eligible.iter().copied(), &config.layout).len();
        summary.eligible_fragments += eligible.len();
    }
    Ok(summary)
}

/// Write `contents` to `path` through a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), ReflowError> {
    let fail = |source| ReflowError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path: PathBuf = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::measure::FontFamily;
    use crate::pipeline::translate::{PassthroughTranslator, TranslateError};
    use async_trait::async_trait;

    fn mono(text: &str, _: FontFamily, size: f32) -> f32 {
        text.chars().count() as f32 * 0.6 * size
    }

    fn frag(text: &str, y0: f32) -> TextFragment {
        TextFragment::new(text, BoundingBox::new(50.0, y0, 550.0, y0 + 12.0), 12.0)
    }

    fn page(fragments: Vec<TextFragment>) -> PageContent {
        PageContent {
            page_no: 0,
            width: 600.0,
            height: 800.0,
            fragments,
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl Translator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn translate(&self, _text: &str) -> Result<String, TranslateError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn hello_world_redistributes_across_fragments() {
        let p = page(vec![frag("Hello ", 100.0), frag("world", 114.0)]);
        let config = ReflowConfig::default();
        let out = reflow_page(&p, 1, &Fixed("你好世界"), &mono, &config).await.unwrap();
        assert_eq!(out.groups, 1);
        let texts: Vec<&str> = out.plans.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["你好", "世界"]);
        assert!(out.plans.iter().all(|p| p.font_family == FontFamily::Cjk && p.translated));
    }

    #[test]
    fn missing_plan_names_its_group() {
        let outcome = GroupOutcome {
            group: 4,
            members: 2,
            plans: Vec::new(),
            diagnostics: Vec::new(),
            failed: false,
        };
        match outcome.check_coverage(9) {
            Err(ReflowError::InvariantViolation {
                page,
                group,
                stage,
                detail,
            }) => {
                assert_eq!((page, group, stage), (9, 4, ReflowStage::Done));
                assert_eq!(detail, "0 render plans for 2 eligible fragments");
            }
            other => panic!("expected an invariant violation, got {other:?}"),
        }

        let complete = GroupOutcome {
            members: 0,
            ..outcome
        };
        assert!(complete.check_coverage(9).is_ok());
    }

    #[tokio::test]
    async fn blank_fragments_get_no_plan() {
        let p = page(vec![frag("Some text", 100.0), frag("   ", 200.0), frag("More text", 400.0)]);
        let config = ReflowConfig::default();
        let out = reflow_page(&p, 1, &PassthroughTranslator, &mono, &config).await.unwrap();
        let indices: Vec<usize> = out.plans.iter().map(|p| p.fragment_index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[tokio::test]
    async fn skipped_text_is_not_sent() {
        let p = page(vec![frag("42", 100.0)]);
        let config = ReflowConfig::default();
        let out = reflow_page(&p, 1, &Fixed("should not appear"), &mono, &config).await.unwrap();
        assert_eq!(out.plans[0].text, "42");
        assert!(!out.plans[0].translated);
        assert_eq!(out.failed_groups, 0);
    }

    #[tokio::test]
    async fn empty_translation_is_a_failure() {
        let p = page(vec![frag("Hello there", 100.0)]);
        let config = ReflowConfig::default();
        let out = reflow_page(&p, 1, &Fixed("   "), &mono, &config).await.unwrap();
        assert_eq!(out.failed_groups, 1);
        assert_eq!(out.plans[0].text, "Hello there");
        assert!(matches!(out.diagnostics[0], Diagnostic::TranslationFailed { group: 0, .. }));
    }

    #[tokio::test]
    async fn malformed_box_is_reported() {
        let mut bad = frag("Broken box", 100.0);
        bad.bbox = BoundingBox::new(500.0, 100.0, 50.0, 112.0);
        let p = page(vec![bad]);
        let config = ReflowConfig::default();
        let out = reflow_page(&p, 3, &PassthroughTranslator, &mono, &config).await.unwrap();
        assert_eq!(out.plans.len(), 1);
        assert!(out
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::DataQuality { page: 3, fragment: 0, .. })));
    }

    #[tokio::test]
    async fn atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        write_atomic(&path, "{}").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        assert!(!dir.path().join("nested/out.json.tmp").exists());
    }

    #[test]
    fn summary_counts_groups() {
        let doc = SourceDocument {
            title: None,
            pages: vec![page(vec![frag("a1", 100.0), frag("a2", 114.0), frag("b", 300.0)])],
        };
        let s = summarize(&doc, &ReflowConfig::default()).unwrap();
        assert_eq!(s.pages, 1);
        assert_eq!(s.eligible_fragments, 3);
        assert_eq!(s.groups, 2);
    }
}
