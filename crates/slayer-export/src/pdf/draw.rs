//! Vector drawing onto one PDF page
//!
//! `PageCanvas` collects content-stream operations in PDF page space
//! (origin bottom-left) and turns them into a page object on `finish`.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use slayer_types::Rgb;

/// Control point offset for quarter-circle Bezier arcs
const KAPPA: f64 = 0.552_284_8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    Fill,
    Stroke,
    FillStroke,
}

impl Paint {
    fn operator(self) -> &'static str {
        match self {
            Paint::Fill => "f",
            Paint::Stroke => "S",
            Paint::FillStroke => "B",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// Standard Helvetica faces shared by every page of a document
#[derive(Debug, Clone, Copy)]
pub struct Fonts {
    regular: ObjectId,
    bold: ObjectId,
}

impl Fonts {
    pub fn register(doc: &mut Document) -> Self {
        let font = |base: &str| {
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => Object::Name(base.as_bytes().to_vec()),
                "Encoding" => "WinAnsiEncoding",
            }
        };
        Self {
            regular: doc.add_object(font("Helvetica")),
            bold: doc.add_object(font("Helvetica-Bold")),
        }
    }

    fn resources(&self) -> Dictionary {
        dictionary! {
            "F1" => self.regular,
            "F2" => self.bold,
        }
    }
}

/// An image XObject already added to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
}

/// Add an RGB raster as a Flate-compressed image XObject
pub fn embed_rgb_image(doc: &mut Document, image: &RgbImage) -> std::io::Result<ImageRef> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(image.as_raw())?;
    let compressed = encoder.finish()?;

    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width() as i64,
            "Height" => image.height() as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        compressed,
    )
    .with_compression(false);

    Ok(ImageRef {
        id: doc.add_object(stream),
        width: image.width(),
        height: image.height(),
    })
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

pub struct PageCanvas {
    width: f64,
    height: f64,
    ops: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
}

impl PageCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    fn op(&mut self, operator: &str, operands: Vec<Object>) {
        self.ops.push(Operation::new(operator, operands));
    }

    pub fn fill_color(&mut self, color: Rgb) {
        let [r, g, b] = color.normalized();
        self.op("rg", vec![real(r), real(g), real(b)]);
    }

    pub fn stroke_color(&mut self, color: Rgb) {
        let [r, g, b] = color.normalized();
        self.op("RG", vec![real(r), real(g), real(b)]);
    }

    pub fn line_width(&mut self, width: f64) {
        self.op("w", vec![real(width)]);
    }

    pub fn circle(&mut self, cx: f64, cy: f64, r: f64, paint: Paint) {
        let k = r * KAPPA;
        self.op("m", vec![real(cx + r), real(cy)]);
        self.curve([cx + r, cy + k, cx + k, cy + r, cx, cy + r]);
        self.curve([cx - k, cy + r, cx - r, cy + k, cx - r, cy]);
        self.curve([cx - r, cy - k, cx - k, cy - r, cx, cy - r]);
        self.curve([cx + k, cy - r, cx + r, cy - k, cx + r, cy]);
        self.op("h", vec![]);
        self.op(paint.operator(), vec![]);
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, paint: Paint) {
        self.op("re", vec![real(x), real(y), real(w), real(h)]);
        self.op(paint.operator(), vec![]);
    }

    /// Rectangle with corners rounded to radius `r`; `(x, y)` is bottom-left
    pub fn rounded_rect(&mut self, x: f64, y: f64, w: f64, h: f64, r: f64, paint: Paint) {
        let r = r.min(w / 2.0).min(h / 2.0).max(0.0);
        let k = r * KAPPA;
        let (x2, y2) = (x + w, y + h);

        self.op("m", vec![real(x + r), real(y)]);
        self.op("l", vec![real(x2 - r), real(y)]);
        self.curve([x2 - r + k, y, x2, y + r - k, x2, y + r]);
        self.op("l", vec![real(x2), real(y2 - r)]);
        self.curve([x2, y2 - r + k, x2 - r + k, y2, x2 - r, y2]);
        self.op("l", vec![real(x + r), real(y2)]);
        self.curve([x + r - k, y2, x, y2 - r + k, x, y2 - r]);
        self.op("l", vec![real(x), real(y + r)]);
        self.curve([x, y + r - k, x + r - k, y, x + r, y]);
        self.op("h", vec![]);
        self.op(paint.operator(), vec![]);
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.op("m", vec![real(x1), real(y1)]);
        self.op("l", vec![real(x2), real(y2)]);
        self.op("S", vec![]);
    }

    fn curve(&mut self, points: [f64; 6]) {
        self.op("c", points.iter().map(|&p| real(p)).collect());
    }

    /// Draw text with its baseline at `y`, in the current fill color
    pub fn text(&mut self, x: f64, y: f64, text: &str, font: Font, size: f64, align: Align) {
        if text.is_empty() {
            return;
        }
        let x = match align {
            Align::Left => x,
            Align::Center => x - text_width(text, font, size) / 2.0,
        };
        self.op("BT", vec![]);
        self.op(
            "Tf",
            vec![Object::Name(font.resource().as_bytes().to_vec()), real(size)],
        );
        self.op("Td", vec![real(x), real(y)]);
        self.op(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        );
        self.op("ET", vec![]);
    }

    /// Text vertically centered on `y`
    pub fn text_middle(&mut self, x: f64, y: f64, text: &str, font: Font, size: f64, align: Align) {
        self.text(x, y - size * 0.35, text, font, size, align);
    }

    /// Place an embedded image into the box with bottom-left `(x, y)`
    pub fn image(&mut self, image: ImageRef, x: f64, y: f64, w: f64, h: f64) {
        let name = format!("Im{}", self.images.len());
        self.op("q", vec![]);
        self.op(
            "cm",
            vec![real(w), real(0.0), real(0.0), real(h), real(x), real(y)],
        );
        self.op("Do", vec![Object::Name(name.as_bytes().to_vec())]);
        self.op("Q", vec![]);
        self.images.push((name, image.id));
    }

    /// Write the content stream and page dictionary, returning the page id
    pub fn finish(
        self,
        doc: &mut Document,
        parent: ObjectId,
        fonts: &Fonts,
    ) -> Result<ObjectId, lopdf::Error> {
        let content = Content {
            operations: self.ops,
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        let mut xobjects = Dictionary::new();
        for (name, id) in self.images {
            xobjects.set(name, Object::Reference(id));
        }

        let page = dictionary! {
            "Type" => "Page",
            "Parent" => parent,
            "MediaBox" => vec![0.into(), 0.into(), real(self.width), real(self.height)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => fonts.resources(),
                "XObject" => xobjects,
            },
        };
        Ok(doc.add_object(page))
    }
}

/// Approximate Helvetica advance width of `text` at `size`
pub fn text_width(text: &str, font: Font, size: f64) -> f64 {
    let em: f64 = text.chars().map(|c| glyph_width(c, font)).sum();
    em * size
}

fn glyph_width(c: char, font: Font) -> f64 {
    let regular = match c {
        ' ' | '.' | ',' | ':' | ';' | '!' | '\'' | '|' | 'i' | 'j' | 'l' | 'I' => 0.278,
        'f' | 't' | 'r' | '(' | ')' | '[' | ']' | '-' => 0.333,
        'm' | 'M' | 'w' => 0.833,
        'W' => 0.944,
        '0'..='9' => 0.556,
        'A'..='Z' => 0.667,
        'a'..='z' => 0.556,
        _ => 0.6,
    };
    match font {
        Font::Regular => regular,
        Font::Bold => regular * 1.06,
    }
}

/// Greedy word wrap against approximate glyph widths
///
/// Explicit newlines are kept; words wider than the line are split.
pub fn wrap_text(text: &str, font: Font, size: f64, max_width: f64) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if text_width(&candidate, font, size) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            for c in word.chars() {
                current.push(c);
                if text_width(&current, font, size) > max_width && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(c);
                }
            }
        }
        lines.push(current);
    }
    lines
}

/// Encode text for the WinAnsi-encoded standard fonts
///
/// Characters outside the encoding become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u8,
            '\t' => b' ',
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_win_ansi_maps_latin1_and_punctuation() {
        assert_eq!(encode_win_ansi("Café – “ok”"), b"Caf\xe9 \x96 \x93ok\x94".to_vec());
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "the quick brown fox jumps over the lazy dog";
        let lines = wrap_text(text, Font::Regular, 12.0, 80.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, Font::Regular, 12.0) <= 80.0, "{line}");
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_wrap_splits_long_words_and_keeps_newlines() {
        let lines = wrap_text("aaaaaaaaaaaaaaaaaaaa\nb", Font::Regular, 10.0, 30.0);
        assert!(lines.len() >= 3);
        assert_eq!(lines.last().map(String::as_str), Some("b"));
        assert_eq!(wrap_text("", Font::Regular, 10.0, 30.0), vec![String::new()]);
    }

    #[test]
    fn test_bold_is_wider() {
        let bold = text_width("LOC# 12", Font::Bold, 36.0);
        assert!(bold > text_width("LOC# 12", Font::Regular, 36.0));
    }

    #[test]
    fn test_finish_builds_page_with_resources() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let fonts = Fonts::register(&mut doc);
        let image = embed_rgb_image(&mut doc, &RgbImage::new(4, 2)).unwrap();

        let mut canvas = PageCanvas::new(200.0, 100.0);
        canvas.fill_color(Rgb::RED);
        canvas.circle(50.0, 50.0, 10.0, Paint::Fill);
        canvas.image(image, 0.0, 0.0, 200.0, 100.0);
        canvas.text(10.0, 10.0, "Hi (there)", Font::Bold, 12.0, Align::Center);
        let page_id = canvas.finish(&mut doc, pages_id, &fonts).unwrap();

        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        assert_eq!(xobjects.get(b"Im0").unwrap().as_reference().unwrap(), image.id);

        let content_id = page.get(b"Contents").unwrap().as_reference().unwrap();
        let stream = doc.get_object(content_id).unwrap().as_stream().unwrap();
        let decoded = Content::decode(&stream.content).unwrap();
        let operators: Vec<_> = decoded
            .operations
            .iter()
            .map(|op| op.operator.as_str())
            .collect();
        assert!(operators.contains(&"Do"));
        assert!(operators.contains(&"Tj"));
        assert_eq!(operators.iter().filter(|o| **o == "c").count(), 4);
    }
}
