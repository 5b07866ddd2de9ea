//! Message schedule CSV

use std::io::Write;

use slayer_types::{natural_cmp, AnnotationStore, Dot};

use crate::error::ExportError;

pub const SCHEDULE_HEADERS: [&str; 11] = [
    "MARKER TYPE CODE",
    "MARKER TYPE NAME",
    "MESSAGE 1",
    "MESSAGE 2",
    "LOCATION NUMBER",
    "MAP PAGE",
    "PAGE LABEL",
    "CODE REQUIRED",
    "VINYL BACKER",
    "INSTALLED",
    "NOTES",
];

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

/// Order rows by marker code, then location number, both naturally
pub fn sort_for_schedule(dots: &mut [&Dot]) {
    dots.sort_by(|a, b| {
        natural_cmp(&a.marker_type, &b.marker_type)
            .then_with(|| natural_cmp(&a.location_number, &b.location_number))
    });
}

/// Write the schedule for `dots`; returns the number of data rows
pub fn write_schedule<W: Write>(
    writer: W,
    dots: &[&Dot],
    store: &dyn AnnotationStore,
) -> Result<usize, ExportError> {
    let mut rows: Vec<&Dot> = dots.to_vec();
    sort_for_schedule(&mut rows);

    let mut csv_writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);
    csv_writer.write_record(SCHEDULE_HEADERS)?;

    for dot in &rows {
        let marker = store.marker_type_or_unknown(&dot.marker_type);
        let location = format!("'{}'", dot.location_number);
        let page = dot.page.to_string();
        csv_writer.write_record([
            marker.code.as_str(),
            marker.name.as_str(),
            dot.message.as_str(),
            dot.message2.as_str(),
            location.as_str(),
            page.as_str(),
            store.page_label(dot.page).unwrap_or(""),
            yes_no(dot.is_code_required),
            yes_no(dot.vinyl_backer),
            yes_no(dot.installed),
            dot.notes.as_str(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use slayer_types::{MarkerType, ProjectSnapshot, Rgb};

    fn dot(id: &str, marker: &str, location: &str, page: u32) -> Dot {
        Dot {
            id: id.into(),
            location_number: location.into(),
            x: 0.0,
            y: 0.0,
            marker_type: marker.into(),
            message: format!("Msg \"{}\"", id),
            message2: String::new(),
            notes: "n1, n2".into(),
            is_code_required: id == "a",
            installed: false,
            vinyl_backer: true,
            page,
        }
    }

    fn marker(code: &str) -> MarkerType {
        MarkerType {
            code: code.into(),
            name: format!("{} sign", code),
            color: Rgb::RED,
            text_color: Rgb::WHITE,
            reference_image: None,
        }
    }

    #[test]
    fn test_rows_sorted_naturally() {
        let dots = [
            dot("a", "A10", "2", 1),
            dot("b", "A2", "10", 2),
            dot("c", "A2", "9", 1),
        ];
        let refs: Vec<&Dot> = dots.iter().collect();
        let mut sorted = refs.clone();
        sort_for_schedule(&mut sorted);
        let order: Vec<&str> = sorted.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_output_format() {
        let mut store = ProjectSnapshot::new().with_marker_type(marker("A2"));
        store.set_page_label(1, "Ground");
        let dots = [dot("a", "A2", "007", 1)];
        let refs: Vec<&Dot> = dots.iter().collect();

        let mut out = Vec::new();
        let rows = write_schedule(&mut out, &refs, &store).unwrap();
        assert_eq!(rows, 1);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "\"MARKER TYPE CODE\",\"MARKER TYPE NAME\",\"MESSAGE 1\",\"MESSAGE 2\",\"LOCATION NUMBER\",\"MAP PAGE\",\"PAGE LABEL\",\"CODE REQUIRED\",\"VINYL BACKER\",\"INSTALLED\",\"NOTES\""
        );
        assert_eq!(
            lines[1],
            "\"A2\",\"A2 sign\",\"Msg \"\"a\"\"\",\"\",\"'007'\",\"1\",\"Ground\",\"YES\",\"YES\",\"NO\",\"n1, n2\""
        );
    }
}
