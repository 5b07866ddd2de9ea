//! Per-dot detail page

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;
use slayer_types::{Dot, MarkerType, Rgb};
use thiserror::Error;

use super::draw::{wrap_text, Align, Font, ImageRef, PageCanvas, Paint};

/// US Letter
pub const DETAIL_WIDTH: f64 = 612.0;
pub const DETAIL_HEIGHT: f64 = 792.0;

const MARGIN: f64 = 40.0;
const INDENT: f64 = 20.0;
const BUTTON_WIDTH: f64 = 150.0;
const BUTTON_HEIGHT: f64 = 30.0;
const LINE_HEIGHT: f64 = 15.0;
const NOTES_BOX_HEIGHT: f64 = 100.0;
const REFERENCE_BOX: f64 = 240.0;
const MAX_MESSAGE_LINES: usize = 8;

const BUTTON_FILL: Rgb = Rgb::new(220, 220, 220);
const BUTTON_BORDER: Rgb = Rgb::new(153, 153, 153);
const BOX_BORDER: Rgb = Rgb::new(200, 200, 200);
const PLACEHOLDER_FILL: Rgb = Rgb::new(224, 224, 224);
const MUTED: Rgb = Rgb::new(150, 150, 150);

#[derive(Error, Debug)]
pub enum ReferenceImageError {
    #[error("Not a base64 data URL")]
    NotDataUrl,

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unsupported image: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode a `data:image/...;base64,` reference image
pub fn decode_reference_image(data_url: &str) -> Result<RgbImage, ReferenceImageError> {
    let (header, data) = data_url
        .split_once(',')
        .ok_or(ReferenceImageError::NotDataUrl)?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(ReferenceImageError::NotDataUrl);
    }
    let bytes = STANDARD.decode(data.trim())?;
    Ok(image::load_from_memory(&bytes)?.to_rgb8())
}

/// Page-level text shared by every detail page of an export
#[derive(Debug, Clone)]
pub struct DetailFooter<'a> {
    pub project_name: &'a str,
    pub created_on: &'a str,
    pub page_label: Option<&'a str>,
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

/// Lay out a detail page; returns the rect of the back button
///
/// Layout runs top-down from `MARGIN`; `top` converts to page space.
pub fn draw_detail_page(
    canvas: &mut PageCanvas,
    dot: &Dot,
    marker: &MarkerType,
    footer: &DetailFooter<'_>,
    reference: Option<ImageRef>,
) -> [f64; 4] {
    let page_height = canvas.height();
    let top = |y: f64| page_height - y;
    let content_width = canvas.width() - 2.0 * MARGIN;
    let center_x = canvas.width() / 2.0;

    let button_x = (canvas.width() - BUTTON_WIDTH) / 2.0;
    canvas.fill_color(BUTTON_FILL);
    canvas.stroke_color(BUTTON_BORDER);
    canvas.line_width(1.0);
    canvas.rounded_rect(
        button_x,
        top(MARGIN + BUTTON_HEIGHT),
        BUTTON_WIDTH,
        BUTTON_HEIGHT,
        5.0,
        Paint::FillStroke,
    );
    canvas.fill_color(Rgb::BLACK);
    canvas.text_middle(
        center_x,
        top(MARGIN + BUTTON_HEIGHT / 2.0),
        "BACK TO MAP",
        Font::Bold,
        12.0,
        Align::Center,
    );
    let button = [
        button_x,
        top(MARGIN + BUTTON_HEIGHT),
        button_x + BUTTON_WIDTH,
        top(MARGIN),
    ];

    let x = MARGIN + INDENT;
    let inner_width = content_width - 2.0 * INDENT;
    let mut y = MARGIN + 80.0;

    canvas.text(
        x,
        top(y),
        &format!("LOC# {}", dot.location_number),
        Font::Bold,
        36.0,
        Align::Left,
    );
    y += 20.0;

    canvas.fill_color(marker.color);
    canvas.circle(x + 10.0, top(y + 10.0), 10.0, Paint::Fill);
    canvas.fill_color(Rgb::BLACK);
    canvas.text(
        x + 30.0,
        top(y + 14.0),
        &format!("Marker Type: {}", marker.display_name()),
        Font::Bold,
        14.0,
        Align::Left,
    );
    y += 40.0;

    for (heading, message) in [("Message 1:", &dot.message), ("Message 2:", &dot.message2)] {
        if heading == "Message 2:" && message.trim().is_empty() {
            continue;
        }
        canvas.text(x, top(y), heading, Font::Bold, 14.0, Align::Left);
        y += 20.0;
        let lines = wrap_text(message, Font::Regular, 12.0, inner_width);
        let shown = lines.len().min(MAX_MESSAGE_LINES);
        for (i, line) in lines.iter().take(shown).enumerate() {
            canvas.text(x, top(y + i as f64 * LINE_HEIGHT), line, Font::Regular, 12.0, Align::Left);
        }
        y += shown as f64 * LINE_HEIGHT + 20.0;
    }

    canvas.text(x, top(y), "NOTES:", Font::Bold, 14.0, Align::Left);
    y += 10.0;
    canvas.stroke_color(BUTTON_FILL);
    canvas.rounded_rect(
        x,
        top(y + NOTES_BOX_HEIGHT),
        inner_width,
        NOTES_BOX_HEIGHT,
        3.0,
        Paint::Stroke,
    );
    let note_lines = wrap_text(&dot.notes, Font::Regular, 12.0, inner_width - 10.0);
    let fits = ((NOTES_BOX_HEIGHT - 12.0) / LINE_HEIGHT) as usize + 1;
    for (i, line) in note_lines.iter().take(fits).enumerate() {
        canvas.text(
            x + 5.0,
            top(y + 12.0 + i as f64 * LINE_HEIGHT),
            line,
            Font::Regular,
            12.0,
            Align::Left,
        );
    }
    y += NOTES_BOX_HEIGHT + 40.0;

    canvas.text(x, top(y), "Status:", Font::Bold, 14.0, Align::Left);
    y += 20.0;
    let statuses = [
        ("Installed?", dot.installed, 0.0, 60.0),
        ("Code Required?", dot.is_code_required, 150.0, 240.0),
        ("Vinyl Backer?", dot.vinyl_backer, 330.0, 410.0),
    ];
    for (label, value, label_x, value_x) in statuses {
        canvas.text(x + label_x, top(y), label, Font::Regular, 12.0, Align::Left);
        canvas.text(x + value_x, top(y), yes_no(value), Font::Bold, 12.0, Align::Left);
    }
    y += 40.0;

    canvas.text(x, top(y), "REFERENCE IMAGE", Font::Bold, 14.0, Align::Left);
    y += 10.0;
    let box_bottom = top(y + REFERENCE_BOX);
    canvas.stroke_color(BOX_BORDER);
    match reference {
        Some(image) => {
            canvas.rect(x, box_bottom, REFERENCE_BOX, REFERENCE_BOX, Paint::Stroke);
            let (w, h) = fit_within(image.width, image.height, REFERENCE_BOX);
            canvas.image(
                image,
                x + (REFERENCE_BOX - w) / 2.0,
                box_bottom + (REFERENCE_BOX - h) / 2.0,
                w,
                h,
            );
        }
        None => {
            canvas.fill_color(PLACEHOLDER_FILL);
            canvas.rect(x, box_bottom, REFERENCE_BOX, REFERENCE_BOX, Paint::FillStroke);
            canvas.fill_color(MUTED);
            canvas.text_middle(
                x + REFERENCE_BOX / 2.0,
                box_bottom + REFERENCE_BOX / 2.0,
                "[Reference image placeholder]",
                Font::Regular,
                10.0,
                Align::Center,
            );
        }
    }

    let footer_y = page_height - MARGIN;
    canvas.fill_color(MUTED);
    let mut footer_lines = vec![
        format!("Created with Mapping Slayer on {}", footer.created_on),
        format!("Project: {}", footer.project_name),
    ];
    if let Some(label) = footer.page_label {
        footer_lines.push(format!("Page: {}", label));
    }
    for (i, line) in footer_lines.iter().enumerate() {
        canvas.text(
            center_x,
            top(footer_y + i as f64 * 12.0),
            line,
            Font::Regular,
            9.0,
            Align::Center,
        );
    }

    button
}

/// Scale `width`x`height` to fit a square box, keeping the aspect ratio
fn fit_within(width: u32, height: u32, side: f64) -> (f64, f64) {
    let (w, h) = (f64::from(width.max(1)), f64::from(height.max(1)));
    let scale = (side / w).min(side / h);
    (w * scale, h * scale)
}
