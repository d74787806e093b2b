//! Weight and dimension strings as people actually type them.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::intent::Dimensions;
use crate::parsing::ParseError;

pub const MIN_INCHES: f64 = 0.1;
pub const MAX_INCHES: f64 = 999.0;

const OUNCES_PER_POUND: f64 = 16.0;
const OUNCES_PER_KILOGRAM: f64 = 35.273_961_95;
const OUNCES_PER_GRAM: f64 = 0.035_273_961_95;

/// Bare numbers at or below this are read as pounds, above it as ounces.
const BARE_POUNDS_CEILING: f64 = 10.0;

static WEIGHT_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?|\.\d+)\s*(kilograms?|kgs?|pounds?|lbs?|ounces?|oz|grams?|g)\b")
        .expect("weight token regex should be valid")
});

/// A unit glued to the next amount, as in `4lb5oz`.
static UNIT_THEN_DIGIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z])(\d)").expect("unit boundary regex should be valid"));

static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").expect("number regex should be valid"));

static DIMENSION_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:x|×|\*|\bby\b)\s*").expect("dimension separator regex should be valid")
});

static INCH_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:inches|inch|in\b\.?|"|'')"#).expect("inch suffix regex should be valid")
});

static INCH_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+(?:\.\d+)?)(?:[\s-]+(\d+)/(\d+))?|(\d+)/(\d+)|(\.\d+))$")
        .expect("inch value regex should be valid")
});

/// Locates a `L x W x H` token inside arbitrary text.
pub(crate) static DIMENSION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    let number = r#"\d+(?:\.\d+)?(?:[ -]\d+/\d+)?\s*(?:in\b|")?"#;
    Regex::new(&format!(r"(?i){number}\s*(?:x|×|\*|\bby\b)\s*{number}\s*(?:x|×|\*|\bby\b)\s*{number}"))
        .expect("dimension token regex should be valid")
});

/// Parses a weight string into ounces.
///
/// Every unit token found is converted and summed, so `"4 lb 5 oz"` is 69 oz.
/// Only when no unit token is present does a bare number get read by magnitude.
pub fn parse_weight_oz(input: &str) -> Result<f64, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::MissingField { field: "weight" });
    }

    let spaced = separate_units(trimmed);
    let mut total = 0.0;
    let mut matched = false;
    for captures in WEIGHT_TOKEN.captures_iter(&spaced) {
        let amount = parse_number("weight", &captures[1])?;
        total += amount * ounces_per_unit(&captures[2]);
        matched = true;
    }

    let ounces = if matched { total } else { bare_weight_oz(trimmed)? };
    if ounces <= 0.0 || !ounces.is_finite() {
        return Err(ParseError::Malformed {
            field: "weight",
            value: trimmed.to_string(),
            reason: "weight must be greater than zero".to_string(),
        });
    }

    Ok(ounces)
}

/// True when the text carries at least one explicit weight unit.
pub fn has_weight_unit(input: &str) -> bool {
    WEIGHT_TOKEN.is_match(&separate_units(input))
}

pub(crate) fn strip_weight_tokens(input: &str) -> String {
    WEIGHT_TOKEN.replace_all(&separate_units(input), " ").into_owned()
}

fn separate_units(input: &str) -> Cow<'_, str> {
    UNIT_THEN_DIGIT.replace_all(input, "$1 $2")
}

fn bare_weight_oz(input: &str) -> Result<f64, ParseError> {
    let token = BARE_NUMBER.find(input).ok_or_else(|| ParseError::Malformed {
        field: "weight",
        value: input.to_string(),
        reason: "no number found (expected e.g. `2 lb`, `12 oz`, `1.5 kg`)".to_string(),
    })?;
    let value = parse_number("weight", token.as_str())?;

    if value <= BARE_POUNDS_CEILING {
        Ok(value * OUNCES_PER_POUND)
    } else {
        Ok(value)
    }
}

fn ounces_per_unit(unit: &str) -> f64 {
    let unit = unit.to_ascii_lowercase();
    if unit.starts_with('k') {
        OUNCES_PER_KILOGRAM
    } else if unit.starts_with('l') || unit.starts_with('p') {
        OUNCES_PER_POUND
    } else if unit.starts_with('g') {
        OUNCES_PER_GRAM
    } else {
        1.0
    }
}

/// Parses `L x W x H` in inches.
///
/// Accepts `x`, `×`, `*` and `by` as separators, inch suffixes, and fractional
/// inches such as `11 1/2`. Each side must fall within [0.1, 999].
pub fn parse_dimensions(input: &str) -> Result<Dimensions, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::MissingField { field: "dimensions" });
    }

    let without_units = INCH_SUFFIX.replace_all(trimmed, " ");
    let parts: Vec<&str> = DIMENSION_SEPARATOR.split(without_units.trim()).collect();
    if parts.len() != 3 {
        return Err(ParseError::Malformed {
            field: "dimensions",
            value: trimmed.to_string(),
            reason: format!(
                "expected exactly three numbers as LENGTHxWIDTHxHEIGHT, found {}",
                parts.len()
            ),
        });
    }

    let mut sides = [0.0_f64; 3];
    for (side, part) in sides.iter_mut().zip(parts) {
        let value = parse_inches(part).ok_or_else(|| ParseError::Malformed {
            field: "dimensions",
            value: trimmed.to_string(),
            reason: format!("`{}` is not a number of inches", part.trim()),
        })?;
        if !(MIN_INCHES..=MAX_INCHES).contains(&value) {
            return Err(ParseError::Malformed {
                field: "dimensions",
                value: trimmed.to_string(),
                reason: format!("{value} is outside the allowed range {MIN_INCHES}..={MAX_INCHES} inches"),
            });
        }
        *side = value;
    }

    Ok(Dimensions { length: sides[0], width: sides[1], height: sides[2] })
}

fn parse_inches(part: &str) -> Option<f64> {
    let captures = INCH_VALUE.captures(part.trim())?;

    if let Some(whole) = captures.get(1) {
        let mut value: f64 = whole.as_str().parse().ok()?;
        if let (Some(numerator), Some(denominator)) = (captures.get(2), captures.get(3)) {
            value += fraction(numerator.as_str(), denominator.as_str())?;
        }
        return Some(value);
    }
    if let (Some(numerator), Some(denominator)) = (captures.get(4), captures.get(5)) {
        return fraction(numerator.as_str(), denominator.as_str());
    }
    captures.get(6).and_then(|decimal| decimal.as_str().parse().ok())
}

fn fraction(numerator: &str, denominator: &str) -> Option<f64> {
    let numerator: f64 = numerator.parse().ok()?;
    let denominator: f64 = denominator.parse().ok()?;
    (denominator > 0.0).then(|| numerator / denominator)
}

fn parse_number(field: &'static str, value: &str) -> Result<f64, ParseError> {
    value.parse::<f64>().map_err(|_| ParseError::Malformed {
        field,
        value: value.to_string(),
        reason: "not a number".to_string(),
    })
}
