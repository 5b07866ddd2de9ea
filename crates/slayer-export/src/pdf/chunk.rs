//! Build one self-contained PDF per chunk of overview pages

use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;

use lopdf::{dictionary, Document, Object, ObjectId};
use slayer_types::{AnnotationStore, MarkerType};
use tracing::{debug, warn};

use super::assembler::{ExportObserver, Progress};
use super::detail::{
    decode_reference_image, draw_detail_page, DetailFooter, DETAIL_HEIGHT, DETAIL_WIDTH,
};
use super::draw::{embed_rgb_image, Fonts, ImageRef, PageCanvas};
use super::overview::{draw_overview, OverviewStyle};
use crate::config::ExportConfig;
use crate::error::{ExportError, Stage};
use crate::render::SourceDocument;

/// Link between two pages of the same chunk, by 1-based local page number
#[derive(Debug, Clone, PartialEq)]
pub struct LocalLink {
    pub from_page: usize,
    pub rect: [f64; 4],
    pub to_page: usize,
}

/// A serialized chunk plus the page bookkeeping needed to merge it
#[derive(Debug, Clone)]
pub struct ExportChunk {
    pub index: usize,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Source page to local overview page
    pub page_map: BTreeMap<u32, usize>,
    /// Dot id to local detail page
    pub detail_map: BTreeMap<String, usize>,
    pub links: Vec<LocalLink>,
}

/// Everything shared by the chunks of one export
pub struct ChunkContext<'a> {
    pub store: &'a dyn AnnotationStore,
    pub source: &'a dyn SourceDocument,
    pub config: &'a ExportConfig,
    pub style: OverviewStyle,
    pub with_details: bool,
    /// Date printed in detail page footers
    pub created_on: String,
}

struct ChunkBuilder {
    index: usize,
    doc: Document,
    pages_id: ObjectId,
    fonts: Fonts,
    page_ids: Vec<ObjectId>,
    references: HashMap<String, Option<ImageRef>>,
}

impl ChunkBuilder {
    fn new(index: usize) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let fonts = Fonts::register(&mut doc);
        Self {
            index,
            doc,
            pages_id,
            fonts,
            page_ids: Vec::new(),
            references: HashMap::new(),
        }
    }

    fn fail(&self, reason: impl std::fmt::Display) -> ExportError {
        ExportError::pdf(Stage::Process, self.index, reason)
    }

    /// Add a finished canvas as the next page; returns its local number
    fn push_page(&mut self, canvas: PageCanvas) -> Result<usize, ExportError> {
        let page_id = canvas
            .finish(&mut self.doc, self.pages_id, &self.fonts)
            .map_err(|e| self.fail(e))?;
        self.page_ids.push(page_id);
        Ok(self.page_ids.len())
    }

    /// Reference image for a marker type, embedded once per chunk
    fn reference_image(&mut self, marker: &MarkerType) -> Option<ImageRef> {
        if let Some(cached) = self.references.get(&marker.code) {
            return *cached;
        }
        let embedded = marker.reference_image.as_deref().and_then(|url| {
            let decoded = decode_reference_image(url)
                .map_err(|e| {
                    warn!(
                        marker_type = %marker.code,
                        error = %e,
                        "Reference image unusable, drawing placeholder"
                    );
                })
                .ok()?;
            embed_rgb_image(&mut self.doc, &decoded)
                .map_err(|e| {
                    warn!(
                        marker_type = %marker.code,
                        error = %e,
                        "Failed to embed reference image"
                    );
                })
                .ok()
        });
        self.references.insert(marker.code.clone(), embedded);
        embedded
    }

    fn finish(mut self) -> Result<Vec<u8>, ExportError> {
        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| ExportError::pdf(Stage::Process, self.index, e))?;
        Ok(bytes)
    }
}

/// Render the overview pages of `pages`, then their detail pages
///
/// Detail pages follow all overview pages of the chunk, grouped by source
/// page and in placement order within a page.
pub fn build_chunk(
    ctx: &ChunkContext<'_>,
    index: usize,
    pages: &[u32],
    observer: &mut dyn ExportObserver,
) -> Result<ExportChunk, ExportError> {
    let mut builder = ChunkBuilder::new(index);
    let mut page_map = BTreeMap::new();
    let mut dot_targets = Vec::new();

    for &page in pages {
        let raster = ctx
            .source
            .render(page, ctx.config.render_scale())
            .map_err(|source| ExportError::Render { page, source })?;
        let mut canvas = PageCanvas::new(f64::from(raster.width()), f64::from(raster.height()));
        let image = embed_rgb_image(&mut builder.doc, &raster).map_err(|e| builder.fail(e))?;
        drop(raster);

        let dots = ctx.store.visible_dots(page);
        let targets = draw_overview(
            &mut canvas,
            image,
            &dots,
            ctx.store.annotation_lines(page),
            ctx.store,
            &ctx.style,
        );
        let local = builder.push_page(canvas)?;
        page_map.insert(page, local);
        dot_targets.extend(targets.into_iter().map(|t| (local, t)));
        debug!(chunk = index, page, local, dots = dots.len(), "Rendered overview page");

        let progress = Progress::PageRendered { chunk: index, page };
        if let ControlFlow::Break(()) = observer.on_progress(&progress) {
            return Err(ExportError::Abandoned {
                stage: Stage::Process,
            });
        }
    }

    let mut detail_map = BTreeMap::new();
    let mut links = Vec::new();
    if ctx.with_details {
        for &page in pages {
            let Some(&back_to) = page_map.get(&page) else {
                continue;
            };
            let footer = DetailFooter {
                project_name: &ctx.config.project_name,
                created_on: &ctx.created_on,
                page_label: ctx.store.page_label(page),
            };
            for dot in ctx.store.visible_dots(page) {
                let marker = ctx.store.marker_type_or_unknown(&dot.marker_type);
                let reference = builder.reference_image(&marker);
                let mut canvas = PageCanvas::new(DETAIL_WIDTH, DETAIL_HEIGHT);
                let button = draw_detail_page(&mut canvas, dot, &marker, &footer, reference);
                let local = builder.push_page(canvas)?;
                detail_map.insert(dot.id.clone(), local);
                links.push(LocalLink {
                    from_page: local,
                    rect: button,
                    to_page: back_to,
                });
            }
        }

        for (from_page, target) in dot_targets {
            if let Some(&to_page) = detail_map.get(&target.dot_id) {
                links.push(LocalLink {
                    from_page,
                    rect: target.rect,
                    to_page,
                });
            }
        }
    }

    let page_count = builder.page_ids.len();
    let bytes = builder.finish()?;
    debug!(chunk = index, pages = page_count, bytes = bytes.len(), "Serialized chunk");

    Ok(ExportChunk {
        index,
        bytes,
        page_count,
        page_map,
        detail_map,
        links,
    })
}
