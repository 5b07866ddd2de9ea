//! Interactive PDF export
//!
//! Overview pages are rendered in chunks, each chunk serialized on its own
//! and merged at the end so memory stays bounded by the chunk size.

pub mod assembler;
pub mod chunk;
pub mod detail;
pub mod draw;
pub mod merge;
pub mod overview;

pub use assembler::{
    chunk_pages, AssembledPdf, DocumentAssembler, ExportObserver, ExportScope, NoProgress, Progress,
};
pub use merge::ResolvedLink;
