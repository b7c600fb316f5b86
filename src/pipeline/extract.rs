//! Deterministic date and agency extraction.
//!
//! A secondary source of truth next to the model: regex over the raw input
//! for dates, a closed list of known institutions for the sender. When both
//! the model and this extraction produce a value, the deterministic one
//! wins — generative extraction of exact fields is the less trustworthy of
//! the two.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Institutions recognized as document senders / complaint addressees.
pub const KNOWN_AGENCIES: &[&str] = &[
    "ФССП",
    "Роспотребнадзор",
    "Прокуратура",
    "Роскомнадзор",
    "Росреестр",
    "ФНС",
    "МВД",
    "Государственная жилищная инспекция",
    "Трудовая инспекция",
    "Администрация города",
];

static DOTTED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2})\.(\d{2})\.(\d{4})\b").expect("static regex"));

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("static regex"));

/// First `DD.MM.YYYY` or `YYYY-MM-DD` occurrence in the text, if any parses
/// to a real calendar date.
pub fn extract_document_date(text: &str) -> Option<NaiveDate> {
    for capture in DOTTED_DATE.captures_iter(text) {
        let (day, month, year) = (capture[1].parse(), capture[2].parse(), capture[3].parse());
        if let (Ok(day), Ok(month), Ok(year)) = (day, month, year) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date);
            }
        }
    }
    for capture in ISO_DATE.captures_iter(text) {
        let (year, month, day) = (capture[1].parse(), capture[2].parse(), capture[3].parse());
        if let (Ok(year), Ok(month), Ok(day)) = (year, month, day) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date);
            }
        }
    }
    None
}

/// Parse a model-reported date string in either accepted format.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d.%m.%Y"))
        .ok()
}

/// First known institution mentioned in the text, canonical spelling.
pub fn extract_sender_agency(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    KNOWN_AGENCIES
        .iter()
        .find(|agency| lowered.contains(&agency.to_lowercase()))
        .map(|agency| agency.to_string())
}
