//! Export settings

use std::path::Path;

use serde::{Deserialize, Serialize};
use slayer_codec::{SubstitutionTable, TemplateId};
use slayer_types::ScaleFactor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which ellipse layout the vendor markup uses for dot shapes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircleTemplate {
    #[default]
    Circle,
    /// Older layout kept for review-tool installs that expect it
    MechanicalCircle,
}

impl CircleTemplate {
    pub fn template_id(self) -> TemplateId {
        match self {
            CircleTemplate::Circle => TemplateId::Circle,
            CircleTemplate::MechanicalCircle => TemplateId::MechanicalCircle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Scale the dots were placed at (canvas pixels per point)
    pub canvas_scale: f64,
    /// Scale overview pages are rendered at; defaults to `canvas_scale`
    pub render_scale: Option<f64>,
    pub dot_size: f64,
    /// Overview pages per chunk
    pub chunk_size: usize,
    pub messages_visible: bool,
    pub show_legend: bool,
    pub show_line_endpoints: bool,
    pub author: String,
    pub project_name: String,
    pub circle_template: CircleTemplate,
    pub substitutions: SubstitutionTable,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            canvas_scale: 4.0,
            render_scale: None,
            dot_size: 1.0,
            chunk_size: 10,
            messages_visible: false,
            show_legend: true,
            show_line_endpoints: false,
            author: "Mapping Slayer".to_string(),
            project_name: "Mapping Slayer Project".to_string(),
            circle_template: CircleTemplate::Circle,
            substitutions: SubstitutionTable::revu(),
        }
    }
}

impl ExportConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ExportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        };

        positive("canvas_scale", self.canvas_scale)?;
        if let Some(scale) = self.render_scale {
            positive("render_scale", scale)?;
        }
        positive("dot_size", self.dot_size)?;
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn render_scale(&self) -> f64 {
        self.render_scale.unwrap_or(self.canvas_scale)
    }

    pub fn canvas_scale_factor(&self) -> Result<ScaleFactor, ConfigError> {
        ScaleFactor::new(self.canvas_scale)
            .ok_or_else(|| ConfigError::Invalid("canvas_scale must be positive".into()))
    }

    /// Factor mapping canvas pixels onto rendered raster pixels
    pub fn overlay_scale(&self) -> Result<ScaleFactor, ConfigError> {
        ScaleFactor::new(self.canvas_scale / self.render_scale())
            .ok_or_else(|| ConfigError::Invalid("render_scale must be positive".into()))
    }

    /// Size multiplier used by overview glyphs
    pub fn glyph_multiplier(&self) -> f64 {
        self.dot_size * 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.render_scale(), 4.0);
        assert_eq!(config.overlay_scale().unwrap().get(), 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ExportConfig::from_json(
            r#"{"chunk_size": 2, "circle_template": "mechanical_circle", "project_name": "Tower"}"#,
        )
        .unwrap();
        assert_eq!(config.chunk_size, 2);
        assert_eq!(config.circle_template.template_id(), TemplateId::MechanicalCircle);
        assert_eq!(config.project_name, "Tower");
        assert_eq!(config.author, "Mapping Slayer");
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let err = ExportConfig::from_json(r#"{"chunk_size": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_non_positive_scales() {
        assert!(ExportConfig::from_json(r#"{"canvas_scale": 0}"#).is_err());
        assert!(ExportConfig::from_json(r#"{"render_scale": -1.5}"#).is_err());
        assert!(ExportConfig::from_json(r#"{"dot_size": 0}"#).is_err());
    }

    #[test]
    fn test_rejects_self_feeding_substitutions() {
        let json = r#"{"substitutions": {"&": "and", "a": "A"}}"#;
        assert!(matches!(
            ExportConfig::from_json(json),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_overlay_scale_when_rendering_smaller() {
        let config = ExportConfig {
            render_scale: Some(2.0),
            ..ExportConfig::default()
        };
        assert_eq!(config.overlay_scale().unwrap().get(), 2.0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, r#"{"dot_size": 1.5}"#).unwrap();
        let config = ExportConfig::load(&path).unwrap();
        assert_eq!(config.dot_size, 1.5);
        assert_eq!(config.glyph_multiplier(), 3.0);
    }
}
