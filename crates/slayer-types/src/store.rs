//! Read-only snapshot of the annotation state the exporters consume

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AnnotationLine, Dot, MarkerType};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to parse project snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Dot {dot_id} is stored under page {stored} but claims page {claimed}")]
    PageMismatch {
        dot_id: String,
        stored: u32,
        claimed: u32,
    },

    #[error("Duplicate dot id: {0}")]
    DuplicateDot(String),

    #[error("Page numbers are 1-based, found page 0")]
    ZeroPage,
}

/// Snapshot handle over pages, dots and marker types
///
/// Exporters only ever read through this trait; they never own or mutate
/// the state behind it.
pub trait AnnotationStore {
    /// Dots on a 1-based page, in placement order
    fn dots(&self, page: u32) -> &[Dot];

    fn marker_type(&self, code: &str) -> Option<&MarkerType>;

    /// Marker type codes currently enabled in the filter panel
    fn active_filters(&self) -> BTreeSet<String>;

    fn page_label(&self, page: u32) -> Option<&str>;

    fn annotation_lines(&self, _page: u32) -> &[AnnotationLine] {
        &[]
    }

    /// Dots on a page whose marker type passes the active filters
    fn visible_dots(&self, page: u32) -> Vec<&Dot> {
        let filters = self.active_filters();
        self.dots(page)
            .iter()
            .filter(|dot| filters.contains(&dot.marker_type))
            .collect()
    }

    /// Marker type for a code, or the "unknown" stand-in
    fn marker_type_or_unknown(&self, code: &str) -> MarkerType {
        self.marker_type(code)
            .cloned()
            .unwrap_or_else(MarkerType::unknown)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub dots: Vec<Dot>,
    #[serde(default)]
    pub lines: Vec<AnnotationLine>,
}

/// In-memory snapshot, loadable from the project JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    #[serde(default)]
    pub marker_types: BTreeMap<String, MarkerType>,
    #[serde(default)]
    pub pages: BTreeMap<u32, PageData>,
    /// `None` means every marker type is visible
    #[serde(default)]
    pub active_filters: Option<BTreeSet<String>>,
}

impl ProjectSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a snapshot
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let snapshot: ProjectSnapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        let mut seen = BTreeSet::new();
        for (&page, data) in &self.pages {
            if page == 0 {
                return Err(StoreError::ZeroPage);
            }
            for dot in &data.dots {
                if dot.page != page {
                    return Err(StoreError::PageMismatch {
                        dot_id: dot.id.clone(),
                        stored: page,
                        claimed: dot.page,
                    });
                }
                if !seen.insert(dot.id.as_str()) {
                    return Err(StoreError::DuplicateDot(dot.id.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn with_marker_type(mut self, marker: MarkerType) -> Self {
        self.marker_types.insert(marker.code.clone(), marker);
        self
    }

    /// Append a dot to the page it names
    pub fn push_dot(&mut self, dot: Dot) {
        self.pages.entry(dot.page).or_default().dots.push(dot);
    }

    pub fn set_page_label(&mut self, page: u32, label: impl Into<String>) {
        self.pages.entry(page).or_default().label = Some(label.into());
    }

    pub fn push_line(&mut self, page: u32, line: AnnotationLine) {
        self.pages.entry(page).or_default().lines.push(line);
    }

    pub fn set_active_filters<I, S>(&mut self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_filters = Some(codes.into_iter().map(Into::into).collect());
    }

    pub fn dot_count(&self) -> usize {
        self.pages.values().map(|p| p.dots.len()).sum()
    }
}

impl AnnotationStore for ProjectSnapshot {
    fn dots(&self, page: u32) -> &[Dot] {
        self.pages
            .get(&page)
            .map(|p| p.dots.as_slice())
            .unwrap_or(&[])
    }

    fn marker_type(&self, code: &str) -> Option<&MarkerType> {
        self.marker_types.get(code)
    }

    fn active_filters(&self) -> BTreeSet<String> {
        match &self.active_filters {
            Some(filters) => filters.clone(),
            None => self
                .marker_types
                .keys()
                .cloned()
                .chain(
                    self.pages
                        .values()
                        .flat_map(|p| p.dots.iter().map(|d| d.marker_type.clone())),
                )
                .collect(),
        }
    }

    fn page_label(&self, page: u32) -> Option<&str> {
        self.pages.get(&page).and_then(|p| p.label.as_deref())
    }

    fn annotation_lines(&self, page: u32) -> &[AnnotationLine] {
        self.pages
            .get(&page)
            .map(|p| p.lines.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use pretty_assertions::assert_eq;

    fn dot(id: &str, page: u32, marker: &str) -> Dot {
        Dot {
            id: id.into(),
            location_number: id.into(),
            x: 10.0,
            y: 20.0,
            marker_type: marker.into(),
            message: String::new(),
            message2: String::new(),
            notes: String::new(),
            is_code_required: false,
            installed: false,
            vinyl_backer: false,
            page,
        }
    }

    fn marker(code: &str) -> MarkerType {
        MarkerType {
            code: code.into(),
            name: format!("{} name", code),
            color: Rgb::RED,
            text_color: Rgb::WHITE,
            reference_image: None,
        }
    }

    #[test]
    fn test_dots_preserve_placement_order() {
        let mut snap = ProjectSnapshot::new();
        snap.push_dot(dot("b", 1, "A"));
        snap.push_dot(dot("a", 1, "A"));
        let ids: Vec<_> = snap.dots(1).iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(snap.dots(2).is_empty());
    }

    #[test]
    fn test_visible_dots_respect_filters() {
        let mut snap = ProjectSnapshot::new()
            .with_marker_type(marker("A"))
            .with_marker_type(marker("B"));
        snap.push_dot(dot("1", 1, "A"));
        snap.push_dot(dot("2", 1, "B"));
        snap.set_active_filters(["B"]);

        let visible: Vec<_> = snap.visible_dots(1).iter().map(|d| d.id.clone()).collect();
        assert_eq!(visible, vec!["2".to_string()]);
    }

    #[test]
    fn test_no_filters_means_everything_visible_including_unknown_types() {
        let mut snap = ProjectSnapshot::new().with_marker_type(marker("A"));
        snap.push_dot(dot("1", 1, "A"));
        snap.push_dot(dot("2", 1, "GHOST"));
        assert_eq!(snap.visible_dots(1).len(), 2);
        assert_eq!(snap.marker_type_or_unknown("GHOST").code, "UNKNOWN");
    }

    #[test]
    fn test_from_json_rejects_misfiled_dot() {
        let json = r##"{
            "pages": {
                "2": { "dots": [
                    {"id":"x","locationNumber":"1","x":0,"y":0,"markerType":"A","page":1}
                ]}
            }
        }"##;
        assert!(matches!(
            ProjectSnapshot::from_json(json),
            Err(StoreError::PageMismatch { stored: 2, claimed: 1, .. })
        ));
    }

    #[test]
    fn test_from_json_rejects_duplicate_ids() {
        let mut snap = ProjectSnapshot::new();
        snap.push_dot(dot("same", 1, "A"));
        snap.push_dot(dot("same", 2, "A"));
        assert!(matches!(snap.validate(), Err(StoreError::DuplicateDot(_))));
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let mut snap = ProjectSnapshot::new().with_marker_type(marker("A"));
        snap.push_dot(dot("1", 1, "A"));
        snap.set_page_label(1, "Level 1");
        let json = serde_json::to_string(&snap).unwrap();
        let back = ProjectSnapshot::from_json(&json).unwrap();
        assert_eq!(back, snap);
        assert_eq!(back.page_label(1), Some("Level 1"));
    }
}
