//! Vendor markup (`.bax`) export
//!
//! Every page of the source document gets a `<Page>` element; each visible
//! dot becomes a free-text label annotation grouping one circle child.

use std::collections::HashSet;
use std::io::Cursor;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slayer_codec::{encode_payload, AnnotationPatch, PdfRect, TemplateId};
use slayer_types::{to_document_space, AnnotationStore, Dot, MarkerType};
use tracing::debug;

use crate::config::ExportConfig;
use crate::error::ExportError;

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ID_LEN: usize = 16;

const FREE_TEXT_TYPE: &str = "Bluebeam.PDF.Annotations.AnnotationFreeText";
const CIRCLE_TYPE: &str = "Bluebeam.PDF.Annotations.AnnotationCircle";

/// Issues annotation ids, unique within one generator
pub struct IdGenerator {
    rng: StdRng,
    issued: HashSet<String>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic ids for reproducible output
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            issued: HashSet::new(),
        }
    }

    pub fn next_id(&mut self) -> String {
        loop {
            let id: String = (0..ID_LEN)
                .map(|_| ID_ALPHABET[self.rng.gen_range(0..ID_ALPHABET.len())] as char)
                .collect();
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// One source page as it appears in the markup file
#[derive(Debug, Clone)]
pub struct MarkupPage {
    pub number: u32,
    pub label: String,
    /// Page size in points at scale 1
    pub width: f64,
    pub height: f64,
    /// Visible dots, already sanitized
    pub dots: Vec<Dot>,
}

/// `D:YYYYMMDDHHmmSS` with a UTC offset, as used inside payloads
pub fn pdf_date(now: DateTime<Utc>) -> String {
    now.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

pub struct MarkupBuilder<'a> {
    store: &'a dyn AnnotationStore,
    config: &'a ExportConfig,
    now: DateTime<Utc>,
    ids: IdGenerator,
}

impl<'a> MarkupBuilder<'a> {
    pub fn new(
        store: &'a dyn AnnotationStore,
        config: &'a ExportConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            config,
            now,
            ids: IdGenerator::new(),
        }
    }

    pub fn with_ids(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Serialize all pages to the markup document
    pub fn build(mut self, pages: &[MarkupPage]) -> Result<String, ExportError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut document = BytesStart::new("Document");
        document.push_attribute(("Version", "1"));
        writer.write_event(Event::Start(document))?;

        let mut annotations = 0;
        for page in pages {
            self.write_page(&mut writer, page)?;
            annotations += page.dots.len();
        }

        writer.write_event(Event::End(BytesEnd::new("Document")))?;
        debug!(pages = pages.len(), annotations, "Built markup document");

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes)
            .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    fn write_page<W: std::io::Write>(
        &mut self,
        writer: &mut Writer<W>,
        page: &MarkupPage,
    ) -> Result<(), ExportError> {
        let index = page.number.saturating_sub(1).to_string();
        let mut elem = BytesStart::new("Page");
        elem.push_attribute(("Index", index.as_str()));
        writer.write_event(Event::Start(elem))?;

        let height = page.height.round();
        write_simple_element(writer, "Label", &page.label)?;
        write_simple_element(writer, "Width", &page.width.round().to_string())?;
        write_simple_element(writer, "Height", &height.to_string())?;

        for (i, dot) in page.dots.iter().enumerate() {
            let marker = self.store.marker_type_or_unknown(&dot.marker_type);
            self.write_annotation(writer, page, height, i, dot, &marker)?;
        }

        writer.write_event(Event::End(BytesEnd::new("Page")))?;
        Ok(())
    }

    fn write_annotation<W: std::io::Write>(
        &mut self,
        writer: &mut Writer<W>,
        page: &MarkupPage,
        page_height: f64,
        index: usize,
        dot: &Dot,
        marker: &MarkerType,
    ) -> Result<(), ExportError> {
        let parent_id = self.ids.next_id();
        let child_id = self.ids.next_id();
        let timestamp = self.now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mod_date = pdf_date(self.now);
        let color = marker.color.to_hex();
        let combined = dot.combined_message();

        let scale = self.config.canvas_scale_factor()?;
        let (x, y) = to_document_space(dot.x, dot.y, page_height, scale);

        let label_raw = encode_payload(
            TemplateId::FreeTextLabel,
            &AnnotationPatch::new(PdfRect::around(x, y, 20.0 * self.config.dot_size))
                .with_text_color(marker.text_color.normalized())
                .with_contents(dot.location_number.as_str())
                .with_metadata(self.config.author.as_str(), parent_id.as_str(), mod_date.as_str()),
        );
        let circle_raw = encode_payload(
            self.config.circle_template.template_id(),
            &AnnotationPatch::new(PdfRect::around(x, y, 10.0 * self.config.dot_size))
                .with_colors(marker.color.normalized(), marker.color.normalized())
                .with_contents(combined.as_str())
                .with_metadata(self.config.author.as_str(), child_id.as_str(), mod_date.as_str()),
        );

        writer.write_event(Event::Start(BytesStart::new("Annotation")))?;
        write_simple_element(writer, "Page", &page.label)?;
        write_simple_element(writer, "Contents", &dot.location_number)?;
        write_simple_element(writer, "ModDate", &timestamp)?;
        write_simple_element(writer, "Color", &color)?;
        write_simple_element(writer, "Type", "FreeText")?;
        write_simple_element(writer, "ID", &parent_id)?;
        write_simple_element(writer, "TypeInternal", FREE_TEXT_TYPE)?;
        write_simple_element(writer, "Raw", &label_raw)?;
        write_simple_element(writer, "Index", &(index * 2 + 1).to_string())?;
        write_custom(writer, dot)?;
        write_simple_element(writer, "Subject", &marker.display_name())?;
        write_simple_element(writer, "CreationDate", &timestamp)?;
        write_simple_element(writer, "Author", &self.config.author)?;

        writer.write_event(Event::Start(BytesStart::new("GroupChildren")))?;
        writer.write_event(Event::Start(BytesStart::new("Child")))?;
        write_simple_element(writer, "Page", &page.label)?;
        write_simple_element(writer, "Contents", &combined)?;
        write_simple_element(writer, "ModDate", &timestamp)?;
        write_simple_element(writer, "Color", &color)?;
        write_simple_element(writer, "Type", "Circle")?;
        write_simple_element(writer, "ID", &child_id)?;
        write_simple_element(writer, "TypeInternal", CIRCLE_TYPE)?;
        write_simple_element(writer, "Raw", &circle_raw)?;
        write_simple_element(writer, "Index", &(index * 2).to_string())?;
        write_custom(writer, dot)?;
        write_simple_element(writer, "Subject", "Ellipse")?;
        write_simple_element(writer, "CreationDate", &timestamp)?;
        write_simple_element(writer, "Author", &self.config.author)?;
        write_simple_element(writer, "Parent", &parent_id)?;
        writer.write_event(Event::End(BytesEnd::new("Child")))?;
        writer.write_event(Event::End(BytesEnd::new("GroupChildren")))?;

        writer.write_event(Event::End(BytesEnd::new("Annotation")))?;
        Ok(())
    }
}

fn write_custom<W: std::io::Write>(writer: &mut Writer<W>, dot: &Dot) -> Result<(), ExportError> {
    writer.write_event(Event::Start(BytesStart::new("Custom")))?;
    write_simple_element(writer, "Room_Name", &dot.message)?;
    writer.write_event(Event::Empty(BytesStart::new("Room_Number")))?;
    write_simple_element(writer, "Notes", &dot.notes)?;
    writer.write_event(Event::Empty(BytesStart::new("Classification")))?;
    writer.write_event(Event::End(BytesEnd::new("Custom")))?;
    Ok(())
}

fn write_simple_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> Result<(), ExportError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use slayer_codec::decode_payload;
    use slayer_types::{ProjectSnapshot, Rgb};

    fn dot(id: &str, location: &str, message: &str) -> Dot {
        Dot {
            id: id.into(),
            location_number: location.into(),
            x: 400.0,
            y: 800.0,
            marker_type: "EX".into(),
            message: message.into(),
            message2: "North".into(),
            notes: "a < b".into(),
            is_code_required: false,
            installed: false,
            vinyl_backer: false,
            page: 1,
        }
    }

    fn store() -> ProjectSnapshot {
        ProjectSnapshot::new().with_marker_type(MarkerType {
            code: "EX".into(),
            name: "Exit".into(),
            color: Rgb::new(0xF7, 0x20, 0x20),
            text_color: Rgb::WHITE,
            reference_image: None,
        })
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 15, 19, 11, 54).unwrap()
    }

    #[test]
    fn test_ids_are_unique_and_well_formed() {
        let mut ids = IdGenerator::seeded(7);
        let issued: Vec<String> = (0..200).map(|_| ids.next_id()).collect();
        let unique: HashSet<_> = issued.iter().collect();
        assert_eq!(unique.len(), 200);
        assert!(issued
            .iter()
            .all(|id| id.len() == 16 && id.bytes().all(|b| ID_ALPHABET.contains(&b))));
    }

    #[test]
    fn test_seeded_ids_repeat() {
        let a: Vec<_> = {
            let mut ids = IdGenerator::seeded(42);
            (0..4).map(|_| ids.next_id()).collect()
        };
        let mut ids = IdGenerator::seeded(42);
        let b: Vec<_> = (0..4).map(|_| ids.next_id()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pdf_date() {
        assert_eq!(pdf_date(now()), "D:20250715191154+00'00'");
    }

    #[test]
    fn test_document_structure() {
        let store = store();
        let config = ExportConfig::default();
        let pages = vec![
            MarkupPage {
                number: 1,
                label: "L1".into(),
                width: 612.4,
                height: 792.0,
                dots: vec![dot("a", "001", "Exit"), dot("b", "002", "Stair")],
            },
            MarkupPage {
                number: 2,
                label: "2".into(),
                width: 612.0,
                height: 792.0,
                dots: vec![],
            },
        ];

        let xml = MarkupBuilder::new(&store, &config, now())
            .with_ids(IdGenerator::seeded(1))
            .build(&pages)
            .unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(xml.contains(r#"<Document Version="1">"#));
        assert!(xml.contains(r#"<Page Index="0">"#));
        assert!(xml.contains(r#"<Page Index="1">"#));
        assert!(xml.contains("<Width>612</Width>"));
        assert_eq!(xml.matches("<Annotation>").count(), 2);
        assert!(xml.contains("<Index>1</Index>"));
        assert!(xml.contains("<Index>3</Index>"));
        assert!(xml.contains("<Contents>Exit, North</Contents>"));
        assert!(xml.contains("<Notes>a &lt; b</Notes>"));
        assert!(xml.contains("<Subject>EX - Exit</Subject>"));
        assert!(xml.contains("<Color>#F72020</Color>"));
        assert!(xml.contains("<ModDate>2025-07-15T19:11:54.000Z</ModDate>"));
    }

    #[test]
    fn test_circle_payload_is_centered_on_dot() {
        let store = store();
        let config = ExportConfig::default();
        let pages = vec![MarkupPage {
            number: 1,
            label: "1".into(),
            width: 612.0,
            height: 792.0,
            dots: vec![dot("a", "001", "Exit")],
        }];
        let xml = MarkupBuilder::new(&store, &config, now())
            .with_ids(IdGenerator::seeded(3))
            .build(&pages)
            .unwrap();

        let raws: Vec<&str> = xml
            .split("<Raw>")
            .skip(1)
            .filter_map(|s| s.split("</Raw>").next())
            .collect();
        assert_eq!(raws.len(), 2);

        // canvas (400, 800) at scale 4 is (100, 592) in page space
        let circle = decode_payload(raws[1]).unwrap();
        assert_eq!(circle.rect, Some(PdfRect::around(100.0, 592.0, 10.0)));
        assert_eq!(circle.contents.as_deref(), Some("Exit, North"));

        let label = decode_payload(raws[0]).unwrap();
        assert_eq!(label.rect, Some(PdfRect::around(100.0, 592.0, 20.0)));
        assert_eq!(label.contents.as_deref(), Some("001"));
    }
}
