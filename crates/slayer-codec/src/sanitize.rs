//! Character substitution for text the review tool cannot display
//!
//! Sanitizing is a pure pass: dots are never modified in place, and every
//! substitution is recorded so the caller can confirm and log it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use slayer_types::Dot;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SanitizeError {
    #[error("Substitution key must be a single character, got {0:?}")]
    InvalidKey(String),

    #[error("Replacement for '{key}' contains '{conflict}', which is itself substituted")]
    NotIdempotent { key: char, conflict: char },
}

/// Character → replacement table
///
/// Replacements never contain a key of the table, so sanitizing twice gives
/// the same text as sanitizing once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct SubstitutionTable {
    entries: BTreeMap<char, String>,
}

impl Default for SubstitutionTable {
    fn default() -> Self {
        Self::revu()
    }
}

impl SubstitutionTable {
    pub fn new<I, S>(entries: I) -> Result<Self, SanitizeError>
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        let entries: BTreeMap<char, String> =
            entries.into_iter().map(|(c, r)| (c, r.into())).collect();

        for (&key, replacement) in &entries {
            if let Some(conflict) = replacement.chars().find(|c| entries.contains_key(c)) {
                return Err(SanitizeError::NotIdempotent { key, conflict });
            }
        }
        Ok(Self { entries })
    }

    /// `&` → `and`, `<` → `(less than)`
    pub fn revu() -> Self {
        Self {
            entries: BTreeMap::from([
                ('&', "and".to_string()),
                ('<', "(less than)".to_string()),
            ]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (char, &str)> {
        self.entries.iter().map(|(c, r)| (*c, r.as_str()))
    }

    pub fn sanitize(&self, text: &str) -> Sanitized {
        let mut out = String::with_capacity(text.len());
        let mut applied: BTreeMap<char, String> = BTreeMap::new();

        for c in text.chars() {
            match self.entries.get(&c) {
                Some(replacement) => {
                    out.push_str(replacement);
                    applied.entry(c).or_insert_with(|| replacement.clone());
                }
                None => out.push(c),
            }
        }

        Sanitized {
            text: out,
            replacements: applied.into_iter().collect(),
        }
    }

    /// Copy of `dot` with every free-text field sanitized
    pub fn sanitize_dot(&self, dot: &Dot) -> Dot {
        let mut clean = dot.clone();
        for field in TextField::ALL {
            let sanitized = self.sanitize(field.read(dot)).text;
            *field.write(&mut clean) = sanitized;
        }
        clean
    }

    /// Scan dots for characters this table would change
    pub fn analyze<'a, I>(&self, dots: I) -> CharacterAnalysis
    where
        I: IntoIterator<Item = &'a Dot>,
    {
        let mut changes = Vec::new();
        for dot in dots {
            for field in TextField::ALL {
                let original = field.read(dot);
                let result = self.sanitize(original);
                if result.changed() {
                    changes.push(FieldChange {
                        dot_id: dot.id.clone(),
                        location_number: dot.location_number.clone(),
                        page: dot.page,
                        field,
                        original: original.to_string(),
                        sanitized: result.text,
                        replacements: result.replacements,
                    });
                }
            }
        }
        CharacterAnalysis { changes }
    }
}

impl TryFrom<BTreeMap<String, String>> for SubstitutionTable {
    type Error = SanitizeError;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut entries = Vec::with_capacity(map.len());
        for (key, replacement) in map {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => entries.push((c, replacement)),
                _ => return Err(SanitizeError::InvalidKey(key)),
            }
        }
        Self::new(entries)
    }
}

impl From<SubstitutionTable> for BTreeMap<String, String> {
    fn from(table: SubstitutionTable) -> Self {
        table
            .entries
            .into_iter()
            .map(|(c, r)| (c.to_string(), r))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub text: String,
    /// Each substituted character once, in character order
    pub replacements: Vec<(char, String)>,
}

impl Sanitized {
    pub fn changed(&self) -> bool {
        !self.replacements.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextField {
    Message,
    Message2,
    Notes,
}

impl TextField {
    pub const ALL: [TextField; 3] = [TextField::Message, TextField::Message2, TextField::Notes];

    pub fn name(self) -> &'static str {
        match self {
            TextField::Message => "message",
            TextField::Message2 => "message2",
            TextField::Notes => "notes",
        }
    }

    fn read(self, dot: &Dot) -> &str {
        match self {
            TextField::Message => &dot.message,
            TextField::Message2 => &dot.message2,
            TextField::Notes => &dot.notes,
        }
    }

    fn write(self, dot: &mut Dot) -> &mut String {
        match self {
            TextField::Message => &mut dot.message,
            TextField::Message2 => &mut dot.message2,
            TextField::Notes => &mut dot.notes,
        }
    }
}

/// One changed field on one dot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub dot_id: String,
    pub location_number: String,
    pub page: u32,
    pub field: TextField,
    pub original: String,
    pub sanitized: String,
    pub replacements: Vec<(char, String)>,
}

/// Result of scanning a set of dots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterAnalysis {
    pub changes: Vec<FieldChange>,
}

impl CharacterAnalysis {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Distinct substitutions across all changes
    pub fn all_replacements(&self) -> BTreeMap<char, String> {
        self.changes
            .iter()
            .flat_map(|c| c.replacements.iter().cloned())
            .collect()
    }

    /// Plain-text audit log written next to the export
    pub fn render_log(&self, project: &str, generated_on: &str) -> String {
        let mut log = format!(
            "MAPPING SLAYER - CHARACTER CHANGES FOR REVU EXPORT\n\
             Generated on: {}\n\
             Project: {}\n\
             \n\
             The following characters were changed for Revu compatibility:\n\n",
            generated_on, project
        );

        for change in &self.changes {
            let pairs = change
                .replacements
                .iter()
                .map(|(c, r)| format!("'{}' → '{}'", c, r))
                .collect::<Vec<_>>()
                .join(", ");
            log.push_str(&format!(
                "Location: {} ({})\nDot ID: {}\nOriginal: {}\nModified: {}\nChanges: {}\n\n",
                change.location_number,
                change.field.name(),
                change.dot_id,
                change.original,
                change.sanitized,
                pairs
            ));
        }
        log
    }
}
