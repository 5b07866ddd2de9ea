//! Patch, recompress and decode annotation payloads

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use crate::error::CodecError;
use crate::fields::{
    escape_literal, find_outside_strings, find_pattern, format_numbers, locate_array,
    locate_paragraph, locate_string, parse_numbers, unescape_literal, xml_escape, xml_unescape,
};
use crate::template::{Field, FieldDescriptor, FieldKind, Presence, Template, TemplateId};

/// Rectangle in page space (points, origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl PdfRect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Square of side `2 * half` around a center point
    pub fn around(cx: f64, cy: f64, half: f64) -> Self {
        Self::new(cx - half, cy - half, cx + half, cy + half)
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Values written into a template
///
/// `None` leaves the template's own value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationPatch {
    pub rect: PdfRect,
    pub fill: Option<[f64; 3]>,
    pub border: Option<[f64; 3]>,
    pub text_color: Option<[f64; 3]>,
    pub contents: Option<String>,
    pub author: Option<String>,
    /// Annotation name (`/NM`)
    pub name: Option<String>,
    /// PDF date string such as `D:20250715191154-06'00'`
    pub mod_date: Option<String>,
}

impl AnnotationPatch {
    pub fn new(rect: PdfRect) -> Self {
        Self {
            rect,
            fill: None,
            border: None,
            text_color: None,
            contents: None,
            author: None,
            name: None,
            mod_date: None,
        }
    }

    pub fn with_colors(mut self, fill: [f64; 3], border: [f64; 3]) -> Self {
        self.fill = Some(fill);
        self.border = Some(border);
        self
    }

    pub fn with_text_color(mut self, color: [f64; 3]) -> Self {
        self.text_color = Some(color);
        self
    }

    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    pub fn with_metadata(
        mut self,
        author: impl Into<String>,
        name: impl Into<String>,
        mod_date: impl Into<String>,
    ) -> Self {
        self.author = Some(author.into());
        self.name = Some(name.into());
        self.mod_date = Some(mod_date.into());
        self
    }
}

/// Owned fields read back out of a payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedAnnotation {
    pub subtype: Option<String>,
    pub rect: Option<PdfRect>,
    pub interior_color: Option<[f64; 3]>,
    pub border_color: Option<[f64; 3]>,
    pub text_color: Option<[f64; 3]>,
    pub contents: Option<String>,
    pub author: Option<String>,
    pub name: Option<String>,
}

/// Patch a built-in template
///
/// Never fails: when the template cannot be patched the fixed fallback
/// payload is returned instead.
pub fn encode_payload(template: TemplateId, patch: &AnnotationPatch) -> String {
    encode_with_template(&template.template(), patch)
}

/// Patch an arbitrary template, falling back on any failure
pub fn encode_with_template(template: &Template<'_>, patch: &AnnotationPatch) -> String {
    match try_encode(template, patch) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                template = template.name,
                error = %e,
                "Template patch failed, using fallback payload"
            );
            crate::template::FALLBACK_PAYLOAD.to_string()
        }
    }
}

/// Patch a template, surfacing the failure instead of falling back
pub fn try_encode(template: &Template<'_>, patch: &AnnotationPatch) -> Result<String, CodecError> {
    let mut buf = inflate(template.compressed_hex)?;
    check_delimiters(&buf)?;

    for descriptor in template.fields {
        apply_field(&mut buf, descriptor, patch, template)?;
    }

    check_delimiters(&buf)?;
    let payload = deflate(&buf)?;
    debug!(template = template.name, bytes = buf.len(), "Patched annotation template");
    Ok(hex::encode(payload))
}

/// Read the owned fields back out of a hex payload
pub fn decode_payload(payload: &str) -> Result<DecodedAnnotation, CodecError> {
    let buf = inflate(payload)?;
    check_delimiters(&buf)?;

    // an empty array such as the label's `/C[]` means no color
    let color = |key: &'static [u8], field: &'static str| -> Result<Option<[f64; 3]>, CodecError> {
        match locate_array(&buf, key) {
            Some(range) if !buf[range.clone()].trim_ascii().is_empty() => {
                parse_triple(&buf[range], field).map(Some)
            }
            _ => Ok(None),
        }
    };

    let rect = match locate_array(&buf, b"/Rect") {
        Some(range) => {
            let values =
                parse_numbers(&buf[range]).ok_or_else(|| malformed("Rect", "not numeric"))?;
            match values.as_slice() {
                [x1, y1, x2, y2] => Some(PdfRect::new(*x1, *y1, *x2, *y2)),
                _ => return Err(malformed("Rect", "expected 4 numbers")),
            }
        }
        None => None,
    };

    let text = |key: &'static [u8]| {
        locate_string(&buf, key)
            .map(|range| String::from_utf8_lossy(&unescape_literal(&buf[range])).into_owned())
    };

    let text_color = match locate_string(&buf, b"/DA") {
        Some(range) => Some(parse_appearance_color(&buf[range])?),
        None => None,
    };

    Ok(DecodedAnnotation {
        subtype: read_name(&buf, b"/Subtype"),
        rect,
        interior_color: color(b"/IC", "IC")?,
        border_color: color(b"/C", "C")?,
        text_color,
        contents: text(b"/Contents"),
        author: text(b"/T"),
        name: text(b"/NM"),
    })
}

fn apply_field(
    buf: &mut Vec<u8>,
    descriptor: &FieldDescriptor,
    patch: &AnnotationPatch,
    template: &Template<'_>,
) -> Result<(), CodecError> {
    let located = match descriptor.kind {
        FieldKind::NumberArray => locate_array(buf, descriptor.key),
        FieldKind::Text | FieldKind::AppearanceColor => locate_string(buf, descriptor.key),
        FieldKind::RichTextBody => {
            locate_string(buf, descriptor.key).and_then(|rc| locate_paragraph(buf, rc))
        }
        FieldKind::StyleColor => locate_string(buf, descriptor.key).and_then(|s| {
            let start = find_pattern(&buf[s.clone()], b"color:#")? + s.start + 7;
            (start + 6 <= s.end).then_some(start..start + 6)
        }),
    };

    let Some(value) = format_value(descriptor, patch) else {
        if located.is_none() && descriptor.presence == Presence::Required {
            return Err(missing(template, descriptor));
        }
        return Ok(());
    };

    match (located, descriptor.presence) {
        (Some(range), _) => {
            buf.splice(range, value.into_bytes());
        }
        (None, Presence::Optional) => {}
        (None, Presence::Required) => return Err(missing(template, descriptor)),
        (None, Presence::InsertAtAnchor) => {
            let anchor = find_outside_strings(buf, template.anchor, 0)
                .ok_or_else(|| missing(template, descriptor))?;
            let (open, close) = match descriptor.kind {
                FieldKind::NumberArray => (b'[', b']'),
                FieldKind::Text | FieldKind::AppearanceColor => (b'(', b')'),
                // only meaningful inside an existing string
                FieldKind::RichTextBody | FieldKind::StyleColor => return Ok(()),
            };
            let mut entry = descriptor.key.to_vec();
            entry.push(open);
            entry.extend_from_slice(value.as_bytes());
            entry.push(close);
            buf.splice(anchor..anchor, entry);
        }
    }
    Ok(())
}

/// Replacement bytes for a field, or `None` to keep the template's value
fn format_value(descriptor: &FieldDescriptor, patch: &AnnotationPatch) -> Option<String> {
    let color = match descriptor.field {
        Field::InteriorColor => patch.fill,
        Field::BorderColor => patch.border,
        Field::TextColor => patch.text_color,
        _ => None,
    };
    let text = match descriptor.field {
        Field::Contents => Some(patch.contents.as_deref().unwrap_or_default()),
        Field::Author => patch.author.as_deref(),
        Field::Name => patch.name.as_deref(),
        Field::ModDate => patch.mod_date.as_deref(),
        _ => None,
    };

    match descriptor.kind {
        FieldKind::NumberArray if descriptor.field == Field::Rect => {
            Some(format_numbers(&patch.rect.to_array()))
        }
        FieldKind::NumberArray => color.map(|c| format_numbers(&c)),
        FieldKind::AppearanceColor => color.map(|c| format!("{} rg", format_numbers(&c))),
        FieldKind::StyleColor => color.map(css_hex),
        FieldKind::Text => text.map(escape_literal),
        FieldKind::RichTextBody => text.map(|t| escape_literal(&xml_escape(t))),
    }
}

fn css_hex(color: [f64; 3]) -> String {
    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "{:02X}{:02X}{:02X}",
        channel(color[0]),
        channel(color[1]),
        channel(color[2])
    )
}

fn missing(template: &Template<'_>, descriptor: &FieldDescriptor) -> CodecError {
    CodecError::MissingField {
        template: template.name.to_string(),
        field: String::from_utf8_lossy(descriptor.key).into_owned(),
    }
}

fn malformed(field: &'static str, reason: &str) -> CodecError {
    CodecError::MalformedField {
        field,
        reason: reason.to_string(),
    }
}

fn check_delimiters(buf: &[u8]) -> Result<(), CodecError> {
    let trimmed = buf.trim_ascii();
    if trimmed.starts_with(b"<<") && trimmed.ends_with(b">>") {
        Ok(())
    } else {
        Err(CodecError::MissingDelimiters)
    }
}

fn inflate(payload: &str) -> Result<Vec<u8>, CodecError> {
    let compressed = hex::decode(payload.trim())?;
    if compressed.is_empty() {
        return Err(CodecError::Empty);
    }
    let mut out = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut out)
        .map_err(CodecError::Inflate)?;
    Ok(out)
}

fn deflate(buf: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(buf).map_err(CodecError::Deflate)?;
    encoder.finish().map_err(CodecError::Deflate)
}

fn parse_triple(bytes: &[u8], field: &'static str) -> Result<[f64; 3], CodecError> {
    let values = parse_numbers(bytes).ok_or_else(|| malformed(field, "not numeric"))?;
    match values.as_slice() {
        [r, g, b] => Ok([*r, *g, *b]),
        _ => Err(malformed(field, "expected 3 numbers")),
    }
}

fn parse_appearance_color(bytes: &[u8]) -> Result<[f64; 3], CodecError> {
    let end = find_pattern(bytes, b"rg").ok_or_else(|| malformed("DA", "no rg operator"))?;
    let numbers = parse_numbers(&bytes[..end]).ok_or_else(|| malformed("DA", "not numeric"))?;
    match numbers.as_slice() {
        [.., r, g, b] => Ok([*r, *g, *b]),
        _ => Err(malformed("DA", "expected 3 numbers before rg")),
    }
}

/// Value of a name entry such as `/Subtype/Circle`
fn read_name(buf: &[u8], key: &[u8]) -> Option<String> {
    let pos = find_outside_strings(buf, key, 0)? + key.len();
    let rest = buf.get(pos..)?.trim_ascii_start();
    let rest = rest.strip_prefix(b"/")?;
    let end = rest
        .iter()
        .position(|b| b.is_ascii_whitespace() || b"/[]()<>".contains(b))
        .unwrap_or(rest.len());
    Some(String::from_utf8_lossy(&rest[..end]).into_owned())
}

/// Plain text of the first rich-text paragraph, mainly for tests and tooling
pub fn decode_rich_text(payload: &str) -> Result<Option<String>, CodecError> {
    let buf = inflate(payload)?;
    Ok(locate_string(&buf, b"/RC")
        .and_then(|rc| locate_paragraph(&buf, rc))
        .map(|p| xml_unescape(&String::from_utf8_lossy(&unescape_literal(&buf[p])))))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn unit() -> impl Strategy<Value = f64> {
        0.0f64..=1.0
    }

    proptest! {
        #[test]
        fn owned_fields_roundtrip(
            x in -5000.0f64..5000.0,
            y in -5000.0f64..5000.0,
            w in 0.1f64..500.0,
            h in 0.1f64..500.0,
            fill in (unit(), unit(), unit()),
            border in (unit(), unit(), unit()),
            text in "[ -~]{0,40}",
        ) {
            let rect = PdfRect::new(x, y, x + w, y + h);
            let patch = AnnotationPatch::new(rect)
                .with_colors([fill.0, fill.1, fill.2], [border.0, border.1, border.2])
                .with_contents(text.clone());

            for id in [TemplateId::Circle, TemplateId::MechanicalCircle] {
                let decoded = decode_payload(&encode_payload(id, &patch)).unwrap();
                prop_assert_eq!(decoded.rect, Some(rect));
                prop_assert_eq!(decoded.interior_color, Some([fill.0, fill.1, fill.2]));
                prop_assert_eq!(decoded.border_color, Some([border.0, border.1, border.2]));
                prop_assert_eq!(decoded.contents.as_deref(), Some(text.as_str()));
            }
        }

        #[test]
        fn arbitrary_template_bytes_never_panic(hex_payload in "[0-9a-f]{0,64}") {
            let template = Template {
                name: "arbitrary",
                compressed_hex: &hex_payload,
                fields: TemplateId::Circle.template().fields,
                anchor: crate::template::ANCHOR,
            };
            let patch = AnnotationPatch::new(PdfRect::new(0.0, 0.0, 1.0, 1.0));
            let out = encode_with_template(&template, &patch);
            prop_assert!(decode_payload(&out).is_ok());
        }
    }
}
