//! Boundary to the external page rasterizer

use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("Rasterization failed: {0}")]
    Rasterize(String),
}

/// The document the dots were placed on
///
/// Pages are 1-based.
pub trait SourceDocument {
    fn page_count(&self) -> u32;

    /// Page width and height in points at scale 1
    fn page_size(&self, page: u32) -> Result<(f64, f64), RenderError>;

    /// Rasterize a page at `scale` pixels per point
    fn render(&self, page: u32, scale: f64) -> Result<RgbImage, RenderError>;

    fn check_page(&self, page: u32) -> Result<(), RenderError> {
        let page_count = self.page_count();
        if page == 0 || page > page_count {
            Err(RenderError::PageOutOfRange { page, page_count })
        } else {
            Ok(())
        }
    }
}
