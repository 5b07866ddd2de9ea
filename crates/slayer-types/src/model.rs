use serde::{Deserialize, Serialize};

use crate::color::Rgb;

/// A point marker placed on one page of the source document
///
/// Coordinates are in canvas space: pixels of the page rendered at the
/// project's canvas scale, origin top-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dot {
    #[serde(alias = "internalId")]
    pub id: String,
    pub location_number: String,
    pub x: f64,
    pub y: f64,
    pub marker_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub message2: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_code_required: bool,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub vinyl_backer: bool,
    /// 1-based page the dot belongs to
    pub page: u32,
}

impl Dot {
    /// Primary and secondary message joined for the vendor shape contents
    pub fn combined_message(&self) -> String {
        [self.message.as_str(), self.message2.as_str()]
            .into_iter()
            .filter(|m| !m.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A named, colored category shared by many dots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerType {
    pub code: String,
    pub name: String,
    pub color: Rgb,
    #[serde(default = "default_text_color")]
    pub text_color: Rgb,
    /// Reference image as a `data:image/...;base64,` URL
    #[serde(default, alias = "designReference")]
    pub reference_image: Option<String>,
}

fn default_text_color() -> Rgb {
    Rgb::WHITE
}

impl MarkerType {
    /// Stand-in for dots whose marker type is missing from the registry
    pub fn unknown() -> Self {
        Self {
            code: "UNKNOWN".to_string(),
            name: "Unknown Type".to_string(),
            color: Rgb::RED,
            text_color: Rgb::WHITE,
            reference_image: None,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} - {}", self.code, self.name)
    }
}

/// A straight overlay line drawn on a map page, in canvas space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationLine {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    #[serde(default)]
    pub color: Option<Rgb>,
}

impl AnnotationLine {
    pub fn color_or_default(&self) -> Rgb {
        self.color.unwrap_or(Rgb::RED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(message: &str, message2: &str) -> Dot {
        Dot {
            id: "d1".into(),
            location_number: "001".into(),
            x: 0.0,
            y: 0.0,
            marker_type: "A".into(),
            message: message.into(),
            message2: message2.into(),
            notes: String::new(),
            is_code_required: false,
            installed: false,
            vinyl_backer: false,
            page: 1,
        }
    }

    #[test]
    fn test_combined_message_skips_blank_parts() {
        assert_eq!(dot("Exit", "North").combined_message(), "Exit, North");
        assert_eq!(dot("Exit", "  ").combined_message(), "Exit");
        assert_eq!(dot("", "North").combined_message(), "North");
        assert_eq!(dot("", "").combined_message(), "");
    }

    #[test]
    fn test_dot_deserializes_from_app_json() {
        let json = r##"{
            "internalId": "abc",
            "locationNumber": "0042",
            "x": 120.5,
            "y": 80,
            "markerType": "T-1",
            "message": "Room 101",
            "isCodeRequired": true,
            "page": 3
        }"##;
        let dot: Dot = serde_json::from_str(json).unwrap();
        assert_eq!(dot.id, "abc");
        assert_eq!(dot.location_number, "0042");
        assert!(dot.is_code_required);
        assert!(!dot.installed);
        assert_eq!(dot.message2, "");
    }

    #[test]
    fn test_marker_type_defaults_text_color() {
        let json = r##"{"code":"A","name":"Room ID","color":"#F72020"}"##;
        let marker: MarkerType = serde_json::from_str(json).unwrap();
        assert_eq!(marker.text_color, Rgb::WHITE);
        assert_eq!(marker.display_name(), "A - Room ID");
    }
}
