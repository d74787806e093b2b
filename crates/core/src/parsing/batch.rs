use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::intent::{ShipmentIntent, DOMESTIC_COUNTRY};
use crate::parsing::row;

static EMAIL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").expect("email shape regex should be valid")
});

static US_ZIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{5}(?:-\d{4})?$").expect("zip regex should be valid"));

/// One record of a batch with the 1-based number of its first physical line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub line_number: usize,
    pub text: String,
}

/// Splits raw batch text into records.
///
/// Full tab-delimited rows are one record per line. Anything else is free text,
/// where records are separated by blank lines. Header rows and `#` comment
/// lines are dropped.
pub fn split_records(text: &str) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut block_start = 0;

    fn flush(block: &mut Vec<&str>, start: usize, records: &mut Vec<RawRecord>) {
        if !block.is_empty() {
            records.push(RawRecord { line_number: start, text: block.join("\n") });
            block.clear();
        }
    }

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = line.trim_end_matches('\r');
        let trimmed = line.trim();

        if trimmed.starts_with('#') {
            continue;
        }
        if row::is_tabular(line) {
            flush(&mut block, block_start, &mut records);
            if !row::is_header_row(line) && !trimmed.is_empty() {
                records.push(RawRecord { line_number, text: line.to_string() });
            }
            continue;
        }
        if trimmed.is_empty() {
            flush(&mut block, block_start, &mut records);
            continue;
        }
        if block.is_empty() {
            block_start = line_number;
        }
        block.push(trimmed);
    }
    flush(&mut block, block_start, &mut records);

    records
}

/// Checks a parsed intent for the fields a label purchase cannot do without.
pub fn validate_intent(intent: &ShipmentIntent) -> Vec<String> {
    let mut errors = Vec::new();
    let destination = &intent.destination;

    let required = [
        ("recipient name", intent.recipient.name.as_str()),
        ("street1", destination.street1.as_str()),
        ("city", destination.city.as_str()),
        ("zip", destination.zip.as_str()),
        ("country", destination.country.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(format!("{field} is required"));
        }
    }

    let country = destination.country.trim();
    let alpha_two = country.len() == 2 && country.chars().all(|ch| ch.is_ascii_uppercase());
    if !country.is_empty() && !alpha_two {
        errors.push(format!("country `{country}` is not a two-letter ISO code"));
    }
    let zip = destination.zip.trim();
    if country == DOMESTIC_COUNTRY && !zip.is_empty() && !US_ZIP.is_match(zip) {
        errors.push(format!("zip `{zip}` is not a valid US ZIP code"));
    }

    if let Some(email) = intent.recipient.email.as_deref() {
        if !EMAIL_SHAPE.is_match(email.trim()) {
            errors.push(format!("email `{email}` does not look like an email address"));
        }
    }

    let has_contents =
        intent.contents.as_deref().map(|value| !value.trim().is_empty()).unwrap_or(false);
    if intent.is_international() && !has_contents {
        errors.push("contents are required for international shipments".to_string());
    }

    errors
}
