//! Vendor payload codec and text sanitizer
//!
//! - [`codec`]: patch a compressed annotation template with caller geometry,
//!   colors and text, falling back to a fixed payload instead of failing
//! - [`sanitize`]: replace characters the review tool cannot display and
//!   record every change for the audit log

pub mod codec;
pub mod error;
pub mod fields;
pub mod sanitize;
pub mod template;

pub use codec::{
    decode_payload, decode_rich_text, encode_payload, encode_with_template, try_encode,
    AnnotationPatch, DecodedAnnotation, PdfRect,
};
pub use error::CodecError;
pub use sanitize::{
    CharacterAnalysis, FieldChange, SanitizeError, Sanitized, SubstitutionTable, TextField,
};
pub use template::{Template, TemplateId, FALLBACK_PAYLOAD};
