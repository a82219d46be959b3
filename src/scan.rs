/// UUID detection in page text and label construction
use crate::tenants::{TenantDirectory, UNKNOWN_TENANT, normalize_uuid};
use regex::Regex;
use std::sync::OnceLock;

/// A UUID found in a piece of text
#[derive(Debug, Clone, PartialEq)]
pub struct UuidMatch {
    /// Byte offsets into the scanned text
    pub start: usize,
    pub end: usize,
    /// Lowercase hyphenated form
    pub uuid: String,
}

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        )
        .expect("UUID pattern compiles")
    })
}

fn is_uuid_char(c: char) -> bool {
    c.is_ascii_hexdigit() || c == '-'
}

/// Find every canonical 8-4-4-4-12 UUID in `text`.
///
/// Matches glued to further hex digits or hyphens are skipped, so a UUID
/// prefix inside a longer token is never reported.
pub fn find_uuids(text: &str) -> Vec<UuidMatch> {
    uuid_pattern()
        .find_iter(text)
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            !before.is_some_and(is_uuid_char) && !after.is_some_and(is_uuid_char)
        })
        .filter_map(|m| {
            Some(UuidMatch {
                start: m.start(),
                end: m.end(),
                uuid: normalize_uuid(m.as_str())?,
            })
        })
        .collect()
}

/// Distinct UUIDs in order of first appearance
pub fn unique_uuids(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in find_uuids(text) {
        if !seen.contains(&m.uuid) {
            seen.push(m.uuid);
        }
    }
    seen
}

/// Visible label text appended after the annotated content
pub fn format_label(names: &[String]) -> String {
    format!(" ({})", names.join(", "))
}

/// Label for one element's text, or None when there is nothing to show.
///
/// Unknown UUIDs are labelled with [`UNKNOWN_TENANT`] only when
/// `annotate_unknown` is set.
pub fn label_for_text(
    text: &str,
    directory: &TenantDirectory,
    annotate_unknown: bool,
) -> Option<String> {
    let mut names: Vec<String> = Vec::new();

    for uuid in unique_uuids(text) {
        let name = match directory.lookup(&uuid) {
            Some(name) => name,
            None if annotate_unknown => UNKNOWN_TENANT,
            None => continue,
        };
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    if names.is_empty() {
        None
    } else {
        Some(format_label(&names))
    }
}
