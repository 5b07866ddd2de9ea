//! Chunked PDF assembly
//!
//! Runs select -> chunk -> process -> merge -> finalize. Any failure aborts
//! the whole run; no partial document is ever returned.

use std::collections::BTreeMap;
use std::ops::ControlFlow;

use slayer_types::AnnotationStore;
use tracing::{debug, error, info};

use super::chunk::{build_chunk, ChunkContext};
use super::merge::{global_maps, merge_chunks, ResolvedLink};
use super::overview::OverviewStyle;
use crate::config::ExportConfig;
use crate::error::{ExportError, Stage};
use crate::render::SourceDocument;

/// Which pages an export covers and whether it carries detail pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    CurrentPage { page: u32, details: bool },
    AllPages { details: bool },
}

impl ExportScope {
    pub fn with_details(&self) -> bool {
        match *self {
            ExportScope::CurrentPage { details, .. } | ExportScope::AllPages { details } => details,
        }
    }

    /// File name suffix, e.g. `_AllMaps_Interactive`
    pub fn file_suffix(&self, store: &dyn AnnotationStore) -> String {
        let mode = if self.with_details() {
            "Interactive"
        } else {
            "MapOnly"
        };
        match *self {
            ExportScope::CurrentPage { page, .. } => {
                let label = store
                    .page_label(page)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Page{}", page));
                format!("_{}_{}", label, mode)
            }
            ExportScope::AllPages { .. } => format!("_AllMaps_{}", mode),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Selected { pages: usize, chunks: usize },
    PageRendered { chunk: usize, page: u32 },
    ChunkFinished { chunk: usize, chunks: usize, pages: usize },
    Merging { chunks: usize },
}

/// Receives progress updates; returning `Break` abandons the export
pub trait ExportObserver {
    fn on_progress(&mut self, progress: &Progress) -> ControlFlow<()>;
}

impl<F> ExportObserver for F
where
    F: FnMut(&Progress) -> ControlFlow<()>,
{
    fn on_progress(&mut self, progress: &Progress) -> ControlFlow<()> {
        self(progress)
    }
}

/// Observer that never interrupts
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ExportObserver for NoProgress {
    fn on_progress(&mut self, _progress: &Progress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// The finished document and where everything ended up in it
#[derive(Debug, Clone)]
pub struct AssembledPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub chunk_page_counts: Vec<usize>,
    /// Source page to final overview page
    pub page_map: BTreeMap<u32, usize>,
    /// Dot id to final detail page
    pub detail_pages: BTreeMap<String, usize>,
    pub links: Vec<ResolvedLink>,
}

/// Split selected pages into runs of at most `size`
pub fn chunk_pages(pages: &[u32], size: usize) -> Vec<Vec<u32>> {
    pages.chunks(size.max(1)).map(<[u32]>::to_vec).collect()
}

pub struct DocumentAssembler<'a> {
    store: &'a dyn AnnotationStore,
    source: &'a dyn SourceDocument,
    config: &'a ExportConfig,
}

impl<'a> DocumentAssembler<'a> {
    pub fn new(
        store: &'a dyn AnnotationStore,
        source: &'a dyn SourceDocument,
        config: &'a ExportConfig,
    ) -> Self {
        Self {
            store,
            source,
            config,
        }
    }

    /// Pages in scope that have at least one visible dot, ascending
    pub fn select_pages(&self, scope: ExportScope) -> Vec<u32> {
        let candidates: Vec<u32> = match scope {
            ExportScope::CurrentPage { page, .. } => {
                if self.source.check_page(page).is_ok() {
                    vec![page]
                } else {
                    Vec::new()
                }
            }
            ExportScope::AllPages { .. } => (1..=self.source.page_count()).collect(),
        };
        candidates
            .into_iter()
            .filter(|&page| !self.store.visible_dots(page).is_empty())
            .collect()
    }

    /// Build the export document
    ///
    /// `created_on` is printed in detail page footers.
    pub fn assemble(
        &self,
        scope: ExportScope,
        created_on: &str,
        observer: &mut dyn ExportObserver,
    ) -> Result<AssembledPdf, ExportError> {
        self.config.validate()?;

        let pages = self.select_pages(scope);
        if pages.is_empty() {
            info!(?scope, "No pages with visible dots");
            return Err(ExportError::NothingToExport);
        }

        let chunks = chunk_pages(&pages, self.config.chunk_size);
        info!(
            pages = pages.len(),
            chunks = chunks.len(),
            chunk_size = self.config.chunk_size,
            details = scope.with_details(),
            "Assembling PDF"
        );
        checkpoint(
            observer,
            &Progress::Selected {
                pages: pages.len(),
                chunks: chunks.len(),
            },
            Stage::Chunk,
        )?;

        let ctx = ChunkContext {
            store: self.store,
            source: self.source,
            config: self.config,
            style: OverviewStyle::from_config(self.config)?,
            with_details: scope.with_details(),
            created_on: created_on.to_string(),
        };

        let mut built = Vec::with_capacity(chunks.len());
        for (index, run) in chunks.iter().enumerate() {
            let chunk = build_chunk(&ctx, index, run, observer).map_err(|e| {
                error!(stage = %Stage::Process, chunk = index, error = %e, "Chunk failed");
                e
            })?;
            debug!(
                chunk = index,
                pages = chunk.page_count,
                links = chunk.links.len(),
                "Chunk built"
            );
            checkpoint(
                observer,
                &Progress::ChunkFinished {
                    chunk: index,
                    chunks: chunks.len(),
                    pages: chunk.page_count,
                },
                Stage::Process,
            )?;
            built.push(chunk);
        }

        checkpoint(observer, &Progress::Merging { chunks: built.len() }, Stage::Merge)?;
        let merged = merge_chunks(&built).map_err(|e| {
            error!(stage = %Stage::Merge, error = %e, "Merge failed");
            e
        })?;

        let chunk_page_counts: Vec<usize> = built.iter().map(|c| c.page_count).collect();
        let expected: usize = chunk_page_counts.iter().sum();
        if merged.page_count != expected {
            return Err(ExportError::pdf(
                Stage::Finalize,
                0,
                format!("merged {} pages, chunks hold {}", merged.page_count, expected),
            ));
        }

        let (page_map, detail_pages) = global_maps(&built, &merged.chunk_offsets);
        info!(
            pages = merged.page_count,
            bytes = merged.bytes.len(),
            links = merged.links.len(),
            "PDF assembled"
        );

        Ok(AssembledPdf {
            bytes: merged.bytes,
            page_count: merged.page_count,
            chunk_page_counts,
            page_map,
            detail_pages,
            links: merged.links,
        })
    }
}

fn checkpoint(
    observer: &mut dyn ExportObserver,
    progress: &Progress,
    stage: Stage,
) -> Result<(), ExportError> {
    match observer.on_progress(progress) {
        ControlFlow::Continue(()) => Ok(()),
        ControlFlow::Break(()) => {
            info!(%stage, "Export abandoned by observer");
            Err(ExportError::Abandoned { stage })
        }
    }
}
