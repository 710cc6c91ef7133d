//! Object label extraction for `object-detected` events.

use std::sync::OnceLock;

use regex::Regex;

use crate::storage::types::RawEvent;

fn confidence_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+\d+%$").expect("confidence pattern compiles"))
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(cell\s?phone|\bmobile\b|^phone$|smart\s?phone|iphone|android)")
            .expect("phone pattern compiles")
    })
}

fn notes_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(book|notebook|paper|diary|notes|sheet)").expect("notes pattern compiles")
    })
}

/// Lower-cased object labels carried by `event`.
///
/// A non-empty `objects` list wins; otherwise `details` is split on commas and
/// each part loses a trailing confidence suffix such as ` 92%`.
pub fn object_labels(event: &RawEvent) -> Vec<String> {
    if let Some(objects) = event.objects.as_ref().filter(|o| !o.is_empty()) {
        return objects.iter().map(|s| s.trim().to_lowercase()).collect();
    }
    event
        .details
        .split(',')
        .map(|part| {
            let lowered = part.trim().to_lowercase();
            confidence_suffix().replace(&lowered, "").into_owned()
        })
        .filter(|label| !label.is_empty())
        .collect()
}

pub fn is_phone_label(label: &str) -> bool {
    phone_pattern().is_match(&label.to_lowercase())
}

pub fn is_notes_label(label: &str) -> bool {
    notes_pattern().is_match(&label.to_lowercase())
}
