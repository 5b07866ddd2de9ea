//! Byte-level field matching inside an inflated annotation dictionary
//!
//! The payloads are single PDF dictionaries such as
//! `<</Subtype/Circle/Rect[1 2 3 4]/Contents(text)/F 4/C[1 0 0]>>`.
//! Only the handful of fields the codec owns are located; everything else is
//! left byte-for-byte as the template had it. Key matching skips over
//! literal strings so text inside `/Contents(...)` can never be mistaken for
//! a field.

use std::ops::Range;

/// Find pattern in bytes
pub fn find_pattern(bytes: &[u8], pattern: &[u8]) -> Option<usize> {
    if pattern.is_empty() || pattern.len() > bytes.len() {
        return None;
    }
    bytes
        .windows(pattern.len())
        .position(|window| window == pattern)
}

/// Find `pattern` at or after `from`, ignoring matches inside literal strings
pub fn find_outside_strings(bytes: &[u8], pattern: &[u8], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if depth > 0 {
            match b {
                b'\\' => i += 1,
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ => {}
            }
        } else if b == b'(' {
            depth = 1;
        } else if i >= from && bytes[i..].starts_with(pattern) {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Position of the opening delimiter of `key`'s value
///
/// `key` must be followed (after optional whitespace) by `open`, so `/C`
/// matches `/C[0 0 1]` but not `/Contents(..)` or `/CreationDate(..)`.
fn locate_value_start(bytes: &[u8], key: &[u8], open: u8) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = find_outside_strings(bytes, key, from) {
        let mut j = pos + key.len();
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j < bytes.len() && bytes[j] == open {
            return Some(j);
        }
        from = pos + 1;
    }
    None
}

/// Inner range of a numeric array field such as `/Rect[...]`
pub fn locate_array(bytes: &[u8], key: &[u8]) -> Option<Range<usize>> {
    let open = locate_value_start(bytes, key, b'[')?;
    let close = bytes[open..].iter().position(|&b| b == b']')? + open;
    Some(open + 1..close)
}

/// Inner range of a literal string field such as `/Contents(...)`
pub fn locate_string(bytes: &[u8], key: &[u8]) -> Option<Range<usize>> {
    let open = locate_value_start(bytes, key, b'(')?;
    let close = string_end(bytes, open)?;
    Some(open + 1..close)
}

/// Index of the `)` closing the literal string opened at `open`
pub fn string_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Inner range of the first `<p ...>` element inside a rich-text string
pub fn locate_paragraph(bytes: &[u8], rich_text: Range<usize>) -> Option<Range<usize>> {
    let body = &bytes[rich_text.clone()];
    let tag = find_pattern(body, b"<p")?;
    let start = body[tag..].iter().position(|&b| b == b'>')? + tag + 1;
    let end = find_pattern(&body[start..], b"</p>")? + start;
    Some(rich_text.start + start..rich_text.start + end)
}

/// Escape the characters that delimit a PDF literal string
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '(' | ')' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Undo literal-string escaping (`\(`, `\)`, `\\`, `\n`, octal, ...)
pub fn unescape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' || i + 1 >= bytes.len() {
            out.push(b);
            i += 1;
            continue;
        }
        let next = bytes[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'\n' => {}
            b'\r' => {
                if bytes.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'0'..=b'7' => {
                let mut value = (next - b'0') as u32;
                let mut digits = 1;
                while digits < 3 {
                    match bytes.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            other => out.push(other),
        }
    }
    out
}

pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn xml_unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Space-separated numbers using the shortest exact representation
pub fn format_numbers(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_numbers(bytes: &[u8]) -> Option<Vec<f64>> {
    let text = std::str::from_utf8(bytes).ok()?;
    text.split_whitespace().map(|t| t.parse().ok()).collect()
}
