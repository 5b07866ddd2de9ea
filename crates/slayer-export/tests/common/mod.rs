#![allow(dead_code)]

use std::cell::Cell;

use image::{Rgb as Pixel, RgbImage};
use slayer_export::{ExportConfig, RenderError, SourceDocument};
use slayer_types::{Dot, MarkerType, ProjectSnapshot, Rgb};

/// Source document whose pages render as flat grey rasters
pub struct SolidSource {
    pub sizes: Vec<(f64, f64)>,
    /// Page that fails to render, if any
    pub broken_page: Option<u32>,
    pub renders: Cell<usize>,
}

impl SolidSource {
    pub fn new(page_count: u32) -> Self {
        Self {
            sizes: vec![(200.0, 150.0); page_count as usize],
            broken_page: None,
            renders: Cell::new(0),
        }
    }

    pub fn failing_on(mut self, page: u32) -> Self {
        self.broken_page = Some(page);
        self
    }
}

impl SourceDocument for SolidSource {
    fn page_count(&self) -> u32 {
        self.sizes.len() as u32
    }

    fn page_size(&self, page: u32) -> Result<(f64, f64), RenderError> {
        self.check_page(page)?;
        Ok(self.sizes[page as usize - 1])
    }

    fn render(&self, page: u32, scale: f64) -> Result<RgbImage, RenderError> {
        let (w, h) = self.page_size(page)?;
        if self.broken_page == Some(page) {
            return Err(RenderError::Rasterize("corrupt content stream".into()));
        }
        self.renders.set(self.renders.get() + 1);
        Ok(RgbImage::from_pixel(
            (w * scale).round() as u32,
            (h * scale).round() as u32,
            Pixel([240, 240, 240]),
        ))
    }
}

pub fn marker(code: &str, name: &str, hex: &str) -> MarkerType {
    MarkerType {
        code: code.into(),
        name: name.into(),
        color: Rgb::from_hex(hex).unwrap(),
        text_color: Rgb::WHITE,
        reference_image: None,
    }
}

pub fn dot(id: &str, page: u32, marker_type: &str) -> Dot {
    Dot {
        id: id.into(),
        location_number: id.trim_start_matches('d').into(),
        x: 50.0,
        y: 40.0,
        marker_type: marker_type.into(),
        message: format!("Room {}", id),
        message2: String::new(),
        notes: String::new(),
        is_code_required: false,
        installed: false,
        vinyl_backer: false,
        page,
    }
}

/// Snapshot with `dots_per_page[i]` dots on page `i + 1`
pub fn snapshot(dots_per_page: &[usize]) -> ProjectSnapshot {
    let mut snap = ProjectSnapshot::new()
        .with_marker_type(marker("EX", "Exit", "#F72020"))
        .with_marker_type(marker("RM", "Room", "#2060F7"));
    let mut n = 0;
    for (i, &count) in dots_per_page.iter().enumerate() {
        for j in 0..count {
            n += 1;
            let code = if j % 2 == 0 { "EX" } else { "RM" };
            snap.push_dot(dot(&format!("d{}", n), i as u32 + 1, code));
        }
    }
    snap
}

/// Small rasters keep the tests fast
pub fn config(chunk_size: usize) -> ExportConfig {
    ExportConfig {
        canvas_scale: 1.0,
        chunk_size,
        project_name: "Tower".into(),
        ..ExportConfig::default()
    }
}

/// Route log output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
