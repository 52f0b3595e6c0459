//! Streaming reflow API: emit pages as they complete.
//!
//! Unlike the eager [`crate::reflow::reflow`], which returns only after every
//! page finishes, [`reflow_stream`] yields `PageReflow` items as each page
//! completes. With `page_concurrency > 1` pages may arrive out of order (sort
//! by `page_num` if order matters). Plans within a page are always in
//! fragment order.

use crate::config::ReflowConfig;
use crate::error::ReflowError;
use crate::output::PageReflow;
use crate::page::{PageContent, SourceDocument};
use crate::pipeline::input;
use crate::pipeline::translate::resolve_translator;
use crate::reflow::{resolve_measure, run_page};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageReflow, ReflowError>> + Send>>;

/// Load a fragments document and reflow it, streaming pages as they are ready.
///
/// # Returns
/// - `Ok(PageStream)`: a stream of `Result<PageReflow, ReflowError>`
/// - `Err(ReflowError)`: fatal error (file not found, bad JSON, no translator)
pub async fn reflow_stream(
    input_str: impl AsRef<str>,
    config: &ReflowConfig,
) -> Result<PageStream, ReflowError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming reflow: {}", input_str);
    let doc = input::load_document(input_str, config.download_timeout_secs).await?;
    reflow_document_stream(doc, config)
}

/// Streaming counterpart of [`crate::reflow::reflow_document`] for an
/// already-loaded document.
pub fn reflow_document_stream(
    doc: SourceDocument,
    config: &ReflowConfig,
) -> Result<PageStream, ReflowError> {
    // ── Select pages ─────────────────────────────────────────────────────
    let selected: Vec<(usize, PageContent)> = input::select_pages(&doc, &config.pages)?
        .into_iter()
        .map(|(page_num, page)| (page_num, page.clone()))
        .collect();
    if selected.is_empty() {
        return Err(ReflowError::PageOutOfRange {
            page: 0,
            total: doc.page_count(),
        });
    }
    let total = selected.len();

    // ── Collaborators ────────────────────────────────────────────────────
    let translator = resolve_translator(config)?;
    let measure = resolve_measure(config);
    let config = Arc::new(config.clone());
    info!(
        "Streaming {} pages via '{}' translator",
        total,
        translator.name()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_reflow_start(total);
    }

    // ── Build the stream ─────────────────────────────────────────────────
    let page_concurrency = config.page_concurrency;
    let s = stream::iter(selected.into_iter().map(move |(page_num, page)| {
        let translator = Arc::clone(&translator);
        let measure = Arc::clone(&measure);
        let config = Arc::clone(&config);
        async move {
            run_page(
                &page,
                page_num,
                total,
                translator.as_ref(),
                measure.as_ref(),
                &config,
            )
            .await
        }
    }))
    .buffer_unordered(page_concurrency);

    Ok(Box::pin(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslatorKind;
    use crate::geometry::BoundingBox;
    use crate::page::TextFragment;

    fn doc(pages: usize) -> SourceDocument {
        SourceDocument {
            title: None,
            pages: (0..pages)
                .map(|i| PageContent {
                    page_no: i,
                    width: 600.0,
                    height: 800.0,
                    fragments: vec![TextFragment::new(
                        "Some body text",
                        BoundingBox::new(50.0, 100.0, 550.0, 112.0),
                        12.0,
                    )],
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn streams_every_selected_page() {
        let config = ReflowConfig::builder()
            .translator_kind(TranslatorKind::None)
            .build()
            .unwrap();
        let stream = reflow_document_stream(doc(4), &config).unwrap();
        let mut nums: Vec<usize> = stream
            .map(|r| r.unwrap().page_num)
            .collect::<Vec<_>>()
            .await;
        nums.sort_unstable();
        assert_eq!(nums, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn empty_document_is_rejected() {
        let config = ReflowConfig::builder()
            .translator_kind(TranslatorKind::None)
            .build()
            .unwrap();
        assert!(matches!(
            reflow_document_stream(doc(0), &config),
            Err(ReflowError::PageOutOfRange { .. })
        ));
    }
}
