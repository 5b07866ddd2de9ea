//! Map annotation exports
//!
//! Turns a read-only snapshot of placed dots into three artifacts:
//! - vendor markup (`.bax`) for the review tool, one payload per shape
//! - an interactive PDF assembled in bounded chunks, with overview and detail pages
//! - a message schedule CSV
//!
//! [`ExportPipeline`] is the entry point; the modules below can also be used
//! on their own.

pub mod config;
pub mod error;
pub mod markup;
pub mod pdf;
pub mod pipeline;
pub mod render;
pub mod schedule;

pub use config::{CircleTemplate, ConfigError, ExportConfig};
pub use error::{ExportError, Stage};
pub use markup::{IdGenerator, MarkupBuilder, MarkupPage};
pub use pdf::{
    chunk_pages, AssembledPdf, DocumentAssembler, ExportObserver, ExportScope, NoProgress, Progress,
    ResolvedLink,
};
pub use pipeline::{
    file_stem, ArtifactSink, ConfirmationGate, DirectorySink, ExportPipeline, MarkupReport,
    MemorySink, PdfReport, ScheduleReport,
};
pub use render::{RenderError, SourceDocument};
pub use schedule::{write_schedule, SCHEDULE_HEADERS};
