//! Shared types for the map export pipeline
//!
//! Data model for dots, marker types and pages, the read-only snapshot
//! interface the exporters pull from, and the coordinate transform between
//! canvas placement space and PDF page space.

pub mod color;
pub mod coords;
pub mod model;
pub mod natural;
pub mod store;

pub use color::{ColorError, Rgb};
pub use coords::{to_canvas_space, to_document_space, ScaleFactor};
pub use model::{AnnotationLine, Dot, MarkerType};
pub use natural::natural_cmp;
pub use store::{AnnotationStore, ProjectSnapshot, StoreError};
