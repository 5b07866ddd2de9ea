//! Overview page overlay: legend, annotation lines and dot glyphs

use std::collections::BTreeMap;

use slayer_types::{
    natural_cmp, to_document_space, AnnotationLine, AnnotationStore, Dot, Rgb, ScaleFactor,
};

use super::draw::{Align, Font, ImageRef, PageCanvas, Paint};
use crate::config::{ConfigError, ExportConfig};

const LEGEND_PADDING: f64 = 40.0;
const LEGEND_WIDTH: f64 = 440.0;
const LEGEND_HEADER: f64 = 50.0;
const LEGEND_ITEM: f64 = 32.0;
const LEGEND_DOT_RADIUS: f64 = 10.0;

const RING_OUTER: Rgb = Rgb::new(25, 25, 25);
const RING_INNER: Rgb = Rgb::new(242, 255, 0);
const BACKER_BLUE: Rgb = Rgb::new(0, 136, 255);
const INSTALLED_GREEN: Rgb = Rgb::new(0, 255, 0);

#[derive(Debug, Clone, Copy)]
pub struct OverviewStyle {
    /// Glyph size multiplier (twice the configured dot size)
    pub multiplier: f64,
    pub show_legend: bool,
    pub messages_visible: bool,
    pub show_line_endpoints: bool,
    /// Canvas pixels per raster pixel
    pub overlay_scale: ScaleFactor,
}

impl OverviewStyle {
    pub fn from_config(config: &ExportConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            multiplier: config.glyph_multiplier(),
            show_legend: config.show_legend,
            messages_visible: config.messages_visible,
            show_line_endpoints: config.show_line_endpoints,
            overlay_scale: config.overlay_scale()?,
        })
    }

    pub fn dot_radius(&self) -> f64 {
        10.0 * self.multiplier
    }
}

/// Clickable area over one drawn dot
#[derive(Debug, Clone, PartialEq)]
pub struct DotTarget {
    pub dot_id: String,
    pub rect: [f64; 4],
}

/// Draw the page raster and every overlay, returning the dot hit areas
pub fn draw_overview(
    canvas: &mut PageCanvas,
    raster: ImageRef,
    dots: &[&Dot],
    lines: &[AnnotationLine],
    store: &dyn AnnotationStore,
    style: &OverviewStyle,
) -> Vec<DotTarget> {
    let (width, height) = (canvas.width(), canvas.height());
    canvas.image(raster, 0.0, 0.0, width, height);

    if style.show_legend && !dots.is_empty() {
        draw_legend(canvas, dots, store);
    }
    for line in lines {
        draw_line(canvas, line, style);
    }
    dots.iter()
        .map(|dot| draw_dot(canvas, dot, store, style))
        .collect()
}

fn draw_legend(canvas: &mut PageCanvas, dots: &[&Dot], store: &dyn AnnotationStore) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for dot in dots {
        *counts.entry(dot.marker_type.as_str()).or_default() += 1;
    }
    let mut codes: Vec<_> = counts.into_iter().collect();
    codes.sort_by(|a, b| natural_cmp(a.0, b.0));

    let legend_height = LEGEND_HEADER + codes.len() as f64 * LEGEND_ITEM + LEGEND_PADDING;
    let x = LEGEND_PADDING;
    let top = canvas.height() - LEGEND_PADDING;

    canvas.fill_color(Rgb::WHITE);
    canvas.stroke_color(Rgb::BLACK);
    canvas.line_width(1.0);
    canvas.rect(x, top - legend_height, LEGEND_WIDTH, legend_height, Paint::FillStroke);

    canvas.fill_color(Rgb::BLACK);
    canvas.text(
        x + LEGEND_WIDTH / 2.0,
        top - 34.0,
        "PAGE LEGEND",
        Font::Bold,
        32.0,
        Align::Center,
    );

    let mut row_y = top - LEGEND_HEADER - 20.0;
    for (code, count) in codes {
        let marker = store.marker_type_or_unknown(code);
        canvas.fill_color(marker.color);
        canvas.stroke_color(Rgb::BLACK);
        canvas.circle(x + LEGEND_PADDING, row_y, LEGEND_DOT_RADIUS, Paint::FillStroke);

        canvas.fill_color(Rgb::BLACK);
        canvas.text_middle(
            x + LEGEND_PADDING + 30.0,
            row_y,
            &format!("({}) {}", count, marker.display_name()),
            Font::Regular,
            24.0,
            Align::Left,
        );
        row_y -= LEGEND_ITEM;
    }
}

fn draw_line(canvas: &mut PageCanvas, line: &AnnotationLine, style: &OverviewStyle) {
    let height = canvas.height();
    let (x1, y1) = to_document_space(line.start_x, line.start_y, height, style.overlay_scale);
    let (x2, y2) = to_document_space(line.end_x, line.end_y, height, style.overlay_scale);
    let color = line.color_or_default();

    canvas.stroke_color(color);
    canvas.line_width(2.0 * style.multiplier);
    canvas.line(x1, y1, x2, y2);

    if style.show_line_endpoints {
        let r = 3.0 * style.multiplier;
        canvas.fill_color(color);
        canvas.circle(x1, y1, r, Paint::Fill);
        canvas.circle(x2, y2, r, Paint::Fill);
    }
}

fn draw_dot(
    canvas: &mut PageCanvas,
    dot: &Dot,
    store: &dyn AnnotationStore,
    style: &OverviewStyle,
) -> DotTarget {
    let marker = store.marker_type_or_unknown(&dot.marker_type);
    let (x, y) = to_document_space(dot.x, dot.y, canvas.height(), style.overlay_scale);
    let m = style.multiplier;
    let radius = style.dot_radius();
    let font_size = 8.0 * m;

    canvas.fill_color(marker.color);
    canvas.circle(x, y, radius, Paint::Fill);

    if dot.is_code_required {
        canvas.stroke_color(RING_OUTER);
        canvas.line_width(5.0);
        canvas.circle(x, y, radius + 2.5, Paint::Stroke);
        canvas.stroke_color(RING_INNER);
        canvas.line_width(3.0);
        canvas.circle(x, y, radius + 1.5, Paint::Stroke);
    }

    if dot.vinyl_backer {
        let size = 8.0 * m;
        let center_y = y - radius - size / 2.0;
        canvas.fill_color(BACKER_BLUE);
        canvas.stroke_color(Rgb::WHITE);
        canvas.line_width(m);
        canvas.rounded_rect(
            x - size / 2.0,
            center_y - size / 2.0,
            size,
            size,
            2.0,
            Paint::FillStroke,
        );
        canvas.fill_color(Rgb::WHITE);
        canvas.text_middle(x, center_y, "V", Font::Bold, 5.0 * m, Align::Center);
    }

    if dot.installed {
        let offset = radius * 0.7;
        canvas.stroke_color(INSTALLED_GREEN);
        canvas.line_width(3.0 * m);
        canvas.line(x - offset, y + offset, x + offset, y - offset);
    }

    canvas.fill_color(marker.text_color);
    canvas.text_middle(x, y, &dot.location_number, Font::Bold, font_size, Align::Center);

    if style.messages_visible && !dot.message.is_empty() {
        let caption_size = font_size * 1.1;
        let caption_top = y - radius - font_size * 0.5;
        canvas.fill_color(marker.color);
        canvas.text(
            x,
            caption_top - caption_size * 0.75,
            &dot.message,
            Font::Bold,
            caption_size,
            Align::Center,
        );
    }

    DotTarget {
        dot_id: dot.id.clone(),
        rect: [x - radius, y - radius, x + radius, y + radius],
    }
}
