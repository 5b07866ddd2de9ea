use pretty_assertions::assert_eq;
use slayer_codec::{
    decode_payload, decode_rich_text, encode_payload, AnnotationPatch, PdfRect, SubstitutionTable,
    TemplateId,
};
use slayer_types::{Dot, Rgb};

fn exit_dot() -> Dot {
    Dot {
        id: "dot_17".into(),
        location_number: "0104".into(),
        x: 310.0,
        y: 220.0,
        marker_type: "EX".into(),
        message: "Exit (North) & Stair <B>".into(),
        message2: "Level 2 & 3".into(),
        notes: String::new(),
        is_code_required: true,
        installed: false,
        vinyl_backer: false,
        page: 1,
    }
}

#[test]
fn test_every_template_yields_a_decodable_payload() {
    let patch = AnnotationPatch::new(PdfRect::around(40.0, 40.0, 10.0))
        .with_colors([0.0, 0.5, 1.0], [0.0, 0.0, 0.0])
        .with_text_color([1.0, 1.0, 1.0])
        .with_contents("0104");

    for template in [
        TemplateId::Circle,
        TemplateId::MechanicalCircle,
        TemplateId::FreeTextLabel,
    ] {
        let payload = encode_payload(template, &patch);
        assert!(
            payload.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')),
            "{} payload is not lowercase hex",
            template.name()
        );
        let decoded = decode_payload(&payload).unwrap();
        assert_eq!(decoded.rect, Some(PdfRect::new(30.0, 30.0, 50.0, 50.0)));
        assert_eq!(decoded.contents.as_deref(), Some("0104"));
    }
}

#[test]
fn test_sanitized_message_survives_encoding() {
    let clean = SubstitutionTable::revu().sanitize_dot(&exit_dot());
    assert_eq!(clean.message, "Exit (North) and Stair (less than)B>");
    assert_eq!(clean.message2, "Level 2 and 3");

    let color = Rgb::from_hex("#F72020").unwrap().normalized();
    let patch = AnnotationPatch::new(PdfRect::around(310.0, 572.0, 10.0))
        .with_colors(color, color)
        .with_contents(&clean.message)
        .with_metadata("Mapping Slayer", "Q7W2E9R4T1Y6U3I8", "D:20250715191154+00'00'");
    let payload = encode_payload(TemplateId::Circle, &patch);

    let decoded = decode_payload(&payload).unwrap();
    assert_eq!(decoded.contents.as_deref(), Some(clean.message.as_str()));
    assert_eq!(decoded.name.as_deref(), Some("Q7W2E9R4T1Y6U3I8"));
    assert_eq!(
        decode_rich_text(&payload).unwrap().as_deref(),
        Some(clean.message.as_str())
    );
}

#[test]
fn test_analysis_reports_message2_changes() {
    let dots = [exit_dot()];
    let analysis = SubstitutionTable::revu().analyze(dots.iter());
    let fields: Vec<&str> = analysis.changes.iter().map(|c| c.field.name()).collect();
    assert_eq!(fields.len(), 2);
    assert!(analysis.all_replacements().contains_key(&'&'));
    assert!(analysis.all_replacements().contains_key(&'<'));
}
