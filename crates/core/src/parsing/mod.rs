//! Line Parser
//!
//! Turns one tab-delimited spreadsheet row or one block of free text into a
//! [`ShipmentIntent`], and a whole batch into per-record [`ValidationResult`]s.

pub mod batch;
pub mod free_text;
pub mod row;
pub mod units;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::intent::{Dimensions, ShipmentIntent, ValidationResult};

pub use batch::{split_records, validate_intent, RawRecord};
pub use units::{parse_dimensions, parse_weight_oz};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("record is empty")]
    Empty,
    #[error("row has {found} tab-separated columns, expected at least {expected}")]
    TooFewColumns { found: usize, expected: usize },
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("malformed {field} `{value}`: {reason}")]
    Malformed { field: &'static str, value: String, reason: String },
}

/// What to do when a dimension string cannot be resolved.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DimensionPolicy {
    /// Fail the line with an explanatory message.
    Strict,
    /// Substitute a default box instead of failing.
    Lenient { default: Dimensions },
}

impl DimensionPolicy {
    pub fn resolve(&self, raw: Option<&str>) -> Result<Dimensions, ParseError> {
        let raw = raw.map(str::trim).unwrap_or_default();
        match (self, parse_dimensions(raw)) {
            (_, Ok(dimensions)) => Ok(dimensions),
            (Self::Strict, Err(error)) => Err(error),
            (Self::Lenient { default }, Err(error)) => {
                debug!(
                    event_name = "parsing.dimensions.defaulted",
                    raw,
                    error = %error,
                    "using default box size"
                );
                Ok(*default)
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct LineParser {
    policy: DimensionPolicy,
}

impl LineParser {
    pub fn new(policy: DimensionPolicy) -> Self {
        Self { policy }
    }

    pub fn strict() -> Self {
        Self::new(DimensionPolicy::Strict)
    }

    pub fn policy(&self) -> &DimensionPolicy {
        &self.policy
    }

    /// Parses one record, picking the tabular or free-text reader by shape.
    pub fn parse_record(&self, record: &str) -> Result<ShipmentIntent, ParseError> {
        if record.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        if row::is_tabular(record) {
            row::parse_row(record, &self.policy)
        } else {
            free_text::parse_free_text(record, &self.policy)
        }
    }

    pub fn validate_record(&self, record: &RawRecord) -> ValidationResult {
        match self.parse_record(&record.text) {
            Ok(intent) => {
                let errors = validate_intent(&intent);
                if errors.is_empty() {
                    ValidationResult::accepted(record.line_number, intent, record.text.clone())
                } else {
                    ValidationResult::rejected(
                        record.line_number,
                        Some(intent),
                        errors,
                        record.text.clone(),
                    )
                }
            }
            Err(error) => ValidationResult::rejected(
                record.line_number,
                None,
                vec![error.to_string()],
                record.text.clone(),
            ),
        }
    }

    /// Validates every record of a raw batch, in input order.
    pub fn validate_batch(&self, text: &str) -> Vec<ValidationResult> {
        split_records(text).iter().map(|record| self.validate_record(record)).collect()
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::strict()
    }
}

/// Maps common country spellings to ISO 3166 alpha-2 codes; empty means `US`.
pub fn normalize_country(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('.');
    let lowered = trimmed.to_ascii_lowercase();
    let code = match lowered.as_str() {
        "" | "us" | "usa" | "u.s" | "u.s.a" | "united states" | "united states of america"
        | "america" => "US",
        "ca" | "can" | "canada" => "CA",
        "gb" | "uk" | "u.k" | "united kingdom" | "great britain" | "england" | "scotland"
        | "wales" => "GB",
        "au" | "aus" | "australia" => "AU",
        "de" | "germany" | "deutschland" => "DE",
        "fr" | "france" => "FR",
        "mx" | "mexico" | "méxico" => "MX",
        "jp" | "japan" => "JP",
        "ie" | "ireland" => "IE",
        "nl" | "netherlands" | "holland" => "NL",
        "nz" | "new zealand" => "NZ",
        "it" | "italy" => "IT",
        "es" | "spain" => "ES",
        "se" | "sweden" => "SE",
        "ch" | "switzerland" => "CH",
        "pr" | "puerto rico" => "PR",
        _ if trimmed.len() == 2 && trimmed.chars().all(|ch| ch.is_ascii_alphabetic()) => {
            return trimmed.to_ascii_uppercase();
        }
        _ => return trimmed.to_string(),
    };
    code.to_string()
}

pub(crate) fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "y" | "yes" | "true" | "1" | "x")
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_country, parse_flag, DimensionPolicy, LineParser, ParseError};
    use crate::domain::intent::Dimensions;

    #[test]
    fn pasted_block_with_a_tab_parses_as_free_text() {
        let text = "Ann Lee\n1 Elm St\t\nAustin, TX 78701\n2 lb\t6x6x6";
        let results = LineParser::strict().validate_batch(text);

        assert_eq!(results.len(), 1);
        assert!(results[0].valid, "{:?}", results[0].errors);
        let intent = results[0].intent.as_ref().expect("intent");
        assert_eq!(intent.destination.street1, "1 Elm St");
        assert_eq!(intent.parcel.weight_oz, 32.0);
    }

    #[test]
    fn strict_policy_propagates_dimension_errors() {
        let error = DimensionPolicy::Strict.resolve(Some("12 x 10")).expect_err("two sides");
        assert!(matches!(error, ParseError::Malformed { field: "dimensions", .. }));
    }

    #[test]
    fn lenient_policy_substitutes_default_box() {
        let default = Dimensions { length: 10.0, width: 8.0, height: 4.0 };
        let policy = DimensionPolicy::Lenient { default };

        assert_eq!(policy.resolve(None).expect("missing"), default);
        assert_eq!(policy.resolve(Some("huge")).expect("garbage"), default);
        assert_eq!(policy.resolve(Some("6x6x6")).expect("valid").length, 6.0);
    }

    #[test]
    fn countries_normalize_to_alpha_two() {
        assert_eq!(normalize_country(""), "US");
        assert_eq!(normalize_country("United Kingdom"), "GB");
        assert_eq!(normalize_country("ca"), "CA");
        assert_eq!(normalize_country("br"), "BR");
        assert_eq!(normalize_country("Narnia"), "Narnia");
    }

    #[test]
    fn flags_accept_spreadsheet_spellings() {
        assert!(parse_flag("Y"));
        assert!(parse_flag(" x "));
        assert!(!parse_flag("no"));
        assert!(!parse_flag(""));
    }
}
