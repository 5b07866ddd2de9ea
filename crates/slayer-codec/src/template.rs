//! Compressed annotation templates and their mutable-field tables
//!
//! Each template is the zlib-compressed body of one annotation dictionary as
//! exported by the review tool. The descriptor table lists the fields the
//! codec owns; anything not listed is carried through untouched.

/// Substituted when a template cannot be patched
///
/// Inflates to
/// `<</Subtype/Circle/Subj(Ellipse)/Rect[0 0 20 20]/Contents()/F 4/C[1 0 0]/BS<</W 1/S/S/Type/Border>>>>`.
pub const FALLBACK_PAYLOAD: &str = concat!(
    "78dab3b1d10f2e4d2aa92c48d577ce2c4ace490571b3345c7372320b8a5335f58352934ba20d140c",
    "148c402856df393faf2435afa4584353df4dc144df39da10280714770ab6b1d10f5730d40f06c21090",
    "714ef94529a9457640000028b41def",
);

/// Revu 2018 ellipse: carries `/RC` and `/Contents`, no `/IC`
const CIRCLE_HEX: &str = concat!(
    "789c8d91514fc2301485ff4ab317b7077adb8e39474689db5ce28306874113e2431957c16c6c590b",
    "8c7f6f8198a84fa6e9c3e93d6dbf7b4f1c43912d180dc88ffd06cf58b749d2f40b1146940b11127f",
    "784d83c017c4673ebd094f2721a75670eb7637aaf64d832b0fd20e95d934db4c1974b39160226021",
    "0f78c4f9d01fb0eb2bc6ae3c2852379ef47545f6d869eb1e3b9c326722e365b33a125bd8ea51ffae",
    "c6ceda98760470381ca8d5b4e93e40976bac1558395829a3c0de048758392a9badc1ad793eb63876",
    "0cf606d6a6ae2eb5dbe9fdfcfbafa4dae112553dcdf202f73b0bc96f2e2edd623976041596e682f1",
    "0be1e09f09781445d09fdf96712b0d6a436ad45a7d20e1c28fa195319c3a911ecc76cb4ff7aeaa36",
    "ad460f1e1fdc7cfe9266b3f953916759f69a3f9e2dc62243bae9ca0aa1c0d2fc6feee9a55fedfe25",
    "f020274348178c30627dc9ccc6fc4238ccec3a4d0792a65b6127253cfcc928187e6724e517dc669d",
    "67",
);

/// Older ellipse layout: carries `/IC`, no `/Contents`
const MECHANICAL_CIRCLE_HEX: &str = concat!(
    "789c8d90dd6a835010845fc5bbe845dd5d3d1e3d2508f127554c62a3b6a5482e6c7aa0b6268a31d0",
    "be7dd5d0fb32b0ccc232cb37cb25c47e89ba436473662ba8a370d01486315966a3e538c601b2a044",
    "65d6010a79ea3caffd2e893353b71da110138e8e8ea910e7b66e2253c83248b78418afd50fd9c873",
    "a50f7d7df9aa34f07b590d757b0eaa41aac1bd818685641211b309ef902f10171ae4d7b74f356c9a",
    "babb480db2021efaf6da413cba34df27c52a4bc2a74d18edf308bc3cf6dbe67a9a22ab52d5666d43",
    "3f5aed627fb5b9edeb34d20eb0dbaa5e922679b00fd7c5b3f798c6aff3afe1a793e0d7fdb19190c9",
    "e3f03fb6b5c2602a8f0b24c1e9568f978f9de6a38a29d36bfb77d9c38b82ae0bdb3f5e66108a7158",
    "7768cdbcaefb0b571b6584",
);

/// Free-text box holding the location number
const FREE_TEXT_LABEL_HEX: &str = concat!(
    "78dabd52cd6ee230107e152b3d901cc8d829741737b80222a41ea82a82760f888349a64956ce8f1c",
    "43e0edeb24dbc3f601d6a339cccc373f9f67c210f6d19192414e707077b2698a2a23b19277d41e6c",
    "344a53d455240dba110f6830a73fd89c2d189b3d4ee9d384d28907fb8d1bbedc4a45aea85b8b5e3a",
    "cca7ce8b08cf757a273650b5fcf621974e6e4cc301baaef3adedd73a8336c9b19460cd692a8d049b",
    "090eb1264feaca60650ef706978ec19b81dc946a8cadde5f7f7df55aab0b9e5196efd1768fd78b1d",
    "92fd1c516d83c9d209fcc04e435a7357b6d087adca272b5d4845dea4d67537218c36e699f42da652",
    "1559c513db17f55fd775f495459a2a7c26a5d45951f1a04f514585d31c8b2c379c317fdefb925ad5",
    "9a3f6c87e78cecff61de3d0ec4d962b180db4049848da09485d08810fa3f131e44b13b8c4afedbac",
    "1ec497f31f77ab11c9c116f3e06de7aebebd0164ec4aa0c7f530d863628e8c5232e86cd0136cc6ed",
    "b5ae25e6c196cc60733c41b47219e945671eace33084d84abf6258d73a450dbf09150276df8e6d3e",
    "fb3a36213e01fd3ad7ef",
);

/// Field the anchor-inserted entries are placed in front of
pub const ANCHOR: &[u8] = b"/F ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    Circle,
    MechanicalCircle,
    FreeTextLabel,
}

impl TemplateId {
    pub fn name(self) -> &'static str {
        match self {
            TemplateId::Circle => "circle",
            TemplateId::MechanicalCircle => "mechanical_circle",
            TemplateId::FreeTextLabel => "free_text_label",
        }
    }

    pub fn template(self) -> Template<'static> {
        match self {
            TemplateId::Circle => Template {
                name: self.name(),
                compressed_hex: CIRCLE_HEX,
                fields: CIRCLE_FIELDS,
                anchor: ANCHOR,
            },
            TemplateId::MechanicalCircle => Template {
                name: self.name(),
                compressed_hex: MECHANICAL_CIRCLE_HEX,
                fields: MECHANICAL_CIRCLE_FIELDS,
                anchor: ANCHOR,
            },
            TemplateId::FreeTextLabel => Template {
                name: self.name(),
                compressed_hex: FREE_TEXT_LABEL_HEX,
                fields: FREE_TEXT_LABEL_FIELDS,
                anchor: ANCHOR,
            },
        }
    }
}

/// A compressed template plus the table describing its owned fields
#[derive(Debug, Clone, Copy)]
pub struct Template<'a> {
    pub name: &'a str,
    pub compressed_hex: &'a str,
    pub fields: &'a [FieldDescriptor],
    pub anchor: &'a [u8],
}

/// Value a descriptor takes from the patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Rect,
    InteriorColor,
    BorderColor,
    TextColor,
    Contents,
    Author,
    Name,
    ModDate,
}

/// How the bytes of a field are bounded and formatted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `/Key[n n n]`
    NumberArray,
    /// `/Key(escaped text)`
    Text,
    /// Body of the first `<p>` inside `/Key(...)`
    RichTextBody,
    /// `/Key(r g b rg)`
    AppearanceColor,
    /// The `color:#RRGGBB` declaration inside `/Key(...)`
    StyleColor,
}

/// What happens when a field is not in the template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Missing means the template is unusable
    Required,
    /// Missing is fine, nothing is written
    Optional,
    /// Missing fields are written in front of the anchor
    InsertAtAnchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub field: Field,
    pub key: &'static [u8],
    pub kind: FieldKind,
    pub presence: Presence,
}

const fn field(
    field: Field,
    key: &'static [u8],
    kind: FieldKind,
    presence: Presence,
) -> FieldDescriptor {
    FieldDescriptor {
        field,
        key,
        kind,
        presence,
    }
}

use Field::*;
use FieldKind::*;
use Presence::*;

static CIRCLE_FIELDS: &[FieldDescriptor] = &[
    field(Rect, b"/Rect", NumberArray, Required),
    field(Rect, b"/TempBBox", NumberArray, Optional),
    field(BorderColor, b"/C", NumberArray, Required),
    field(InteriorColor, b"/IC", NumberArray, InsertAtAnchor),
    field(Contents, b"/Contents", Text, InsertAtAnchor),
    field(Contents, b"/RC", RichTextBody, Optional),
    field(Author, b"/T", Text, Optional),
    field(Name, b"/NM", Text, Optional),
    field(ModDate, b"/M", Text, Optional),
];

static MECHANICAL_CIRCLE_FIELDS: &[FieldDescriptor] = &[
    field(Rect, b"/Rect", NumberArray, Required),
    field(Rect, b"/TempBBox", NumberArray, Optional),
    field(BorderColor, b"/C", NumberArray, Required),
    field(InteriorColor, b"/IC", NumberArray, InsertAtAnchor),
    field(Contents, b"/Contents", Text, InsertAtAnchor),
    field(Author, b"/T", Text, Optional),
    field(Name, b"/NM", Text, Optional),
    field(ModDate, b"/M", Text, Optional),
];

static FREE_TEXT_LABEL_FIELDS: &[FieldDescriptor] = &[
    field(Rect, b"/Rect", NumberArray, Required),
    field(Contents, b"/Contents", Text, Required),
    field(Contents, b"/RC", RichTextBody, Optional),
    field(TextColor, b"/DA", AppearanceColor, InsertAtAnchor),
    field(TextColor, b"/DS", StyleColor, Optional),
    field(TextColor, b"/RC", StyleColor, Optional),
    field(Author, b"/T", Text, Optional),
    field(Name, b"/NM", Text, Optional),
    field(ModDate, b"/M", Text, Optional),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn inflate(hex_payload: &str) -> Vec<u8> {
        let bytes = hex::decode(hex_payload).unwrap();
        let mut out = Vec::new();
        flate2::read::ZlibDecoder::new(bytes.as_slice())
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_all_templates_inflate_to_dictionaries() {
        for id in [
            TemplateId::Circle,
            TemplateId::MechanicalCircle,
            TemplateId::FreeTextLabel,
        ] {
            let body = inflate(id.template().compressed_hex);
            assert!(body.starts_with(b"<<"), "{} start", id.name());
            assert!(body.ends_with(b">>"), "{} end", id.name());
            assert!(crate::fields::find_pattern(&body, ANCHOR).is_some());
        }
    }

    #[test]
    fn test_fallback_payload_is_valid() {
        let body = inflate(FALLBACK_PAYLOAD);
        assert!(body.starts_with(b"<</Subtype/Circle"));
        assert!(body.ends_with(b">>"));
    }

    #[test]
    fn test_circle_layouts_differ_in_owned_fields() {
        let circle = inflate(CIRCLE_HEX);
        let mechanical = inflate(MECHANICAL_CIRCLE_HEX);
        assert!(crate::fields::locate_array(&circle, b"/IC").is_none());
        assert!(crate::fields::locate_string(&circle, b"/Contents").is_some());
        assert!(crate::fields::locate_array(&mechanical, b"/IC").is_some());
        assert!(crate::fields::locate_string(&mechanical, b"/Contents").is_none());
    }
}
