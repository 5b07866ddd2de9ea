//! Coordinate transformation between canvas and PDF coordinate systems
//!
//! Dots are placed on a pixel canvas (origin top-left, Y down) that was
//! rendered at some scale. PDF page space has its origin at the bottom-left,
//! Y up, in points.

use serde::{Deserialize, Serialize};

/// Canvas pixels per page unit. Always strictly positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    /// Returns `None` for zero, negative or non-finite factors.
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value > 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for ScaleFactor {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        ScaleFactor::new(value).ok_or_else(|| format!("scale factor must be > 0, got {}", value))
    }
}

impl From<ScaleFactor> for f64 {
    fn from(scale: ScaleFactor) -> f64 {
        scale.0
    }
}

/// Convert canvas coordinates to PDF page coordinates
pub fn to_document_space(x: f64, y: f64, page_height: f64, scale: ScaleFactor) -> (f64, f64) {
    let doc_x = x / scale.0;
    let doc_y = page_height - (y / scale.0);
    (doc_x, doc_y)
}

/// Convert PDF page coordinates back to canvas coordinates
pub fn to_canvas_space(doc_x: f64, doc_y: f64, page_height: f64, scale: ScaleFactor) -> (f64, f64) {
    let x = doc_x * scale.0;
    let y = (page_height - doc_y) * scale.0;
    (x, y)
}
