use crate::domain::intent::{Address, Parcel, Recipient, ShipmentIntent};
use crate::parsing::units::parse_weight_oz;
use crate::parsing::{non_empty, normalize_country, parse_flag, DimensionPolicy, ParseError};

pub const MIN_COLUMNS: usize = 16;

const ORIGIN: usize = 0;
const CARRIER: usize = 1;
const GIVEN_NAME: usize = 2;
const FAMILY_NAME: usize = 3;
const PHONE: usize = 4;
const EMAIL: usize = 5;
const STREET1: usize = 6;
const STREET2: usize = 7;
const CITY: usize = 8;
const STATE: usize = 9;
const ZIP: usize = 10;
const COUNTRY: usize = 11;
const RESIDENTIAL: usize = 12;
const DIMENSIONS: usize = 13;
const WEIGHT: usize = 14;
const CONTENTS: usize = 15;

/// Single-line records with enough tabs for a full row. A stray tab pasted into
/// free text does not make a row.
pub fn is_tabular(line: &str) -> bool {
    !line.trim_end().contains('\n') && line.matches('\t').count() >= MIN_COLUMNS - 1
}

pub fn is_header_row(line: &str) -> bool {
    line.split('\t')
        .nth(WEIGHT)
        .map(|column| column.trim().to_ascii_lowercase().starts_with("weight"))
        .unwrap_or(false)
}

pub fn parse_row(line: &str, policy: &DimensionPolicy) -> Result<ShipmentIntent, ParseError> {
    let columns: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    if columns.len() < MIN_COLUMNS {
        return Err(ParseError::TooFewColumns { found: columns.len(), expected: MIN_COLUMNS });
    }
    let column = |index: usize| cell(&columns, index);

    let name = [column(GIVEN_NAME), column(FAMILY_NAME)]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        return Err(ParseError::MissingField { field: "recipient name" });
    }

    let street1 = non_empty(column(STREET1)).ok_or(ParseError::MissingField { field: "street1" })?;
    let city = non_empty(column(CITY)).ok_or(ParseError::MissingField { field: "city" })?;
    let weight_oz = parse_weight_oz(column(WEIGHT))?;
    let dimensions = policy.resolve(Some(column(DIMENSIONS)))?;

    Ok(ShipmentIntent {
        origin_hint: non_empty(column(ORIGIN)).map(|hint| hint.to_ascii_uppercase()),
        carrier_preference: non_empty(column(CARRIER)),
        recipient: Recipient {
            name,
            company: None,
            phone: non_empty(column(PHONE)),
            email: non_empty(column(EMAIL)),
        },
        destination: Address {
            street1,
            street2: non_empty(column(STREET2)),
            city,
            state: column(STATE).to_string(),
            zip: column(ZIP).to_string(),
            country: normalize_country(column(COUNTRY)),
        },
        residential: parse_flag(column(RESIDENTIAL)),
        parcel: Parcel { dimensions, weight_oz },
        contents: non_empty(column(CONTENTS)),
    })
}

fn cell<'a>(columns: &[&'a str], index: usize) -> &'a str {
    columns.get(index).map(|value| value.trim()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{is_header_row, is_tabular, parse_row};
    use crate::domain::intent::Dimensions;
    use crate::parsing::{DimensionPolicy, ParseError};

    fn row(columns: &[&str]) -> String {
        columns.join("\t")
    }

    fn sample() -> Vec<&'static str> {
        vec![
            "ca",
            "USPS",
            "Ada",
            "Lovelace",
            "555-010-2000",
            "ada@example.com",
            "12 Analytical Way",
            "",
            "London",
            "",
            "N1 9GU",
            "United Kingdom",
            "y",
            "11 1/2 x 8 x 4",
            "4 lb 5 oz",
            "(2) Jeans HTS: 6203.42.4011 ($25 each)",
        ]
    }

    #[test]
    fn parses_full_row() {
        let line = row(&sample());
        assert!(is_tabular(&line));

        let intent = parse_row(&line, &DimensionPolicy::Strict).expect("valid row");
        assert_eq!(intent.origin_hint.as_deref(), Some("CA"));
        assert_eq!(intent.recipient.name, "Ada Lovelace");
        assert_eq!(intent.destination.country, "GB");
        assert_eq!(intent.destination.street2, None);
        assert!(intent.residential);
        assert!(intent.is_international());
        assert_eq!(intent.parcel.weight_oz, 69.0);
        assert_eq!(intent.parcel.dimensions.length, 11.5);
        assert_eq!(intent.contents.as_deref(), Some("(2) Jeans HTS: 6203.42.4011 ($25 each)"));
    }

    #[test]
    fn a_stray_tab_does_not_make_a_row() {
        assert!(!is_tabular("Ann Lee\tmobile 512 555 0100"));
        assert!(!is_tabular("a\tb\tc"));
        assert!(is_tabular(&vec![""; 16].join("\t")));
    }

    #[test]
    fn short_rows_report_column_count() {
        let error = parse_row("a\tb\tc", &DimensionPolicy::Strict).expect_err("short");
        assert_eq!(error, ParseError::TooFewColumns { found: 3, expected: 16 });
    }

    #[test]
    fn bad_dimensions_fail_strict_but_default_when_lenient() {
        let mut columns = sample();
        columns[13] = "big box";
        let line = row(&columns);

        assert!(parse_row(&line, &DimensionPolicy::Strict).is_err());

        let default = Dimensions { length: 12.0, width: 10.0, height: 8.0 };
        let intent = parse_row(&line, &DimensionPolicy::Lenient { default }).expect("lenient");
        assert_eq!(intent.parcel.dimensions, default);
    }

    #[test]
    fn missing_street_names_the_field() {
        let mut columns = sample();
        columns[6] = " ";
        let error = parse_row(&row(&columns), &DimensionPolicy::Strict).expect_err("street");
        assert_eq!(error, ParseError::MissingField { field: "street1" });
    }

    #[test]
    fn header_rows_are_recognised() {
        let mut columns = sample();
        columns[14] = "Weight (oz)";
        assert!(is_header_row(&row(&columns)));
        assert!(!is_header_row(&row(&sample())));
    }
}
