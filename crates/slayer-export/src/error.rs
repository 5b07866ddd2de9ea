use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::render::RenderError;

/// Step of the document assembly state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Select,
    Chunk,
    Process,
    Merge,
    Finalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Select => "select",
            Stage::Chunk => "chunk",
            Stage::Process => "process",
            Stage::Merge => "merge",
            Stage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No source document is loaded")]
    NoSourceDocument,

    #[error("No annotations match the current filters")]
    NothingToExport,

    #[error("Export cancelled before any artifact was written")]
    Cancelled,

    #[error("Export abandoned during {stage}")]
    Abandoned { stage: Stage },

    #[error("Failed to render page {page}: {source}")]
    Render {
        page: u32,
        #[source]
        source: RenderError,
    },

    #[error("PDF error during {stage} (chunk {chunk}): {reason}")]
    Pdf {
        stage: Stage,
        chunk: usize,
        reason: String,
    },

    #[error("Link from page {from} to page {target} does not resolve ({page_count} pages)")]
    UnresolvedLink {
        from: usize,
        target: usize,
        page_count: usize,
    },

    #[error("Failed to write markup: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Failed to write schedule: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    pub(crate) fn pdf(stage: Stage, chunk: usize, reason: impl fmt::Display) -> Self {
        ExportError::Pdf {
            stage,
            chunk,
            reason: reason.to_string(),
        }
    }

    /// Assembly stage the error came from, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ExportError::NothingToExport => Some(Stage::Select),
            ExportError::Abandoned { stage } | ExportError::Pdf { stage, .. } => Some(*stage),
            ExportError::Render { .. } => Some(Stage::Process),
            ExportError::UnresolvedLink { .. } => Some(Stage::Merge),
            _ => None,
        }
    }

    /// Message safe to show to the person running the export
    ///
    /// Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ExportError::NoSourceDocument => "Please load a PDF first.".to_string(),
            ExportError::NothingToExport => {
                "No annotations match the current filters. Nothing was exported.".to_string()
            }
            ExportError::Cancelled => "Export cancelled.".to_string(),
            ExportError::Abandoned { .. } => "Export stopped before it finished.".to_string(),
            ExportError::Config(_) => "The export settings are invalid.".to_string(),
            _ => "An error occurred while exporting. Check the log for details.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_internals() {
        let err = ExportError::pdf(Stage::Merge, 3, "xref table corrupt at 0x1f");
        assert!(err.to_string().contains("xref"));
        assert!(!err.user_message().contains("xref"));
        assert_eq!(err.stage(), Some(Stage::Merge));
    }

    #[test]
    fn test_render_error_reports_process_stage() {
        let err = ExportError::Render {
            page: 4,
            source: RenderError::Rasterize("out of memory".into()),
        };
        assert_eq!(err.stage(), Some(Stage::Process));
        assert!(err.to_string().contains("page 4"));
        assert!(!err.user_message().contains("memory"));
    }

    #[test]
    fn test_precondition_messages() {
        assert_eq!(
            ExportError::NoSourceDocument.user_message(),
            "Please load a PDF first."
        );
        assert_eq!(ExportError::NothingToExport.stage(), Some(Stage::Select));
    }
}
