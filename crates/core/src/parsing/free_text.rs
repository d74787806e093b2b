//! Free-form shipment blocks, e.g. pasted from an email or a chat message.
//!
//! Metadata (email, phone, box size, weight, labelled fields) is located
//! heuristically anywhere in the block. Whatever is left is read as a postal
//! address block: name, optional company, street lines, city line, country.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::intent::{Address, Parcel, Recipient, ShipmentIntent};
use crate::parsing::units::{has_weight_unit, parse_weight_oz, strip_weight_tokens, DIMENSION_TOKEN};
use crate::parsing::{non_empty, normalize_country, DimensionPolicy, ParseError};

const MAX_ADDRESS_LINES: usize = 6;

const COMPANY_KEYWORDS: &[&str] = &[
    "inc", "llc", "ltd", "corp", "corporation", "co", "company", "gmbh", "limited", "group",
    "studio", "studios", "shop", "store", "boutique", "llp", "plc", "enterprises", "industries",
    "holdings", "labs", "pty", "bv", "ag",
];

const STRAY_LABELS: &[&str] =
    &["tel", "ph", "phone", "mobile", "cell", "email", "e-mail", "weight", "wt", "dims", "box"];

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex should be valid")
});

static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\(?\d[\d\s().-]{7,}\d").expect("phone regex should be valid"));

static LABELLED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z .-]{0,20}?)\s*:\s*(.*)$").expect("label regex should be valid")
});

static CONTENTS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(\s*\d+\s*\)").expect("contents regex should be valid"));

/// `City, State ZIP`
static CITY_STATE_ZIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<city>[^,]+),\s*(?P<state>[A-Za-z][A-Za-z .]*?)\.?\s+(?P<zip>[A-Za-z0-9][A-Za-z0-9 -]{2,9})$")
        .expect("city line regex should be valid")
});

/// `City ST 12345` without a comma.
static CITY_CODE_ZIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<city>.+?)\s+(?P<state>[A-Z]{2,3})\s+(?P<zip>\d{4,5}(?:-\d{4})?)$")
        .expect("compact city line regex should be valid")
});

/// `City, POSTCODE`
static CITY_ZIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<city>[^,]+),\s*(?P<zip>[A-Za-z0-9][A-Za-z0-9 -]{1,9})$")
        .expect("city postcode regex should be valid")
});

#[derive(Debug, Default)]
struct Scan {
    email: Option<String>,
    phone: Option<String>,
    dimensions: Option<String>,
    weight: Option<String>,
    contents: Option<String>,
    carrier: Option<String>,
    origin: Option<String>,
    name: Option<String>,
    country: Option<String>,
    address_lines: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
struct CityLine {
    city: String,
    state: String,
    zip: String,
}

pub fn parse_free_text(block: &str, policy: &DimensionPolicy) -> Result<ShipmentIntent, ParseError> {
    let scan = scan_block(block);

    let mut lines = scan.address_lines.iter().take(MAX_ADDRESS_LINES).map(String::as_str);
    let name = match scan.name.clone() {
        Some(name) => name,
        None => lines.next().map(str::to_string).ok_or(ParseError::MissingField { field: "recipient name" })?,
    };
    let rest: Vec<&str> = lines.collect();

    let mut cursor = 0;
    let company = match rest.first() {
        Some(line) if rest.len() > 2 && looks_like_company(line) => {
            cursor = 1;
            Some(line.to_string())
        }
        _ => None,
    };

    let street1 = rest
        .get(cursor)
        .map(|line| line.to_string())
        .ok_or(ParseError::MissingField { field: "street1" })?;
    cursor += 1;

    let (city_index, city_line) = rest
        .iter()
        .enumerate()
        .skip(cursor)
        .find_map(|(index, line)| parse_city_line(line).map(|parsed| (index, parsed)))
        .ok_or(ParseError::MissingField { field: "city/state/zip" })?;

    let street2 = non_empty(&rest[cursor..city_index].join(", "));
    let country = scan
        .country
        .as_deref()
        .or_else(|| rest.get(city_index + 1).copied())
        .map(normalize_country)
        .unwrap_or_else(|| normalize_country(""));

    let weight_oz = parse_weight_oz(scan.weight.as_deref().unwrap_or_default())?;
    let dimensions = policy.resolve(scan.dimensions.as_deref())?;
    let residential = company.is_none();

    Ok(ShipmentIntent {
        origin_hint: scan.origin.map(|origin| origin.to_ascii_uppercase()),
        carrier_preference: scan.carrier,
        recipient: Recipient { name, company, phone: scan.phone, email: scan.email },
        destination: Address {
            street1,
            street2,
            city: city_line.city,
            state: city_line.state,
            zip: city_line.zip,
            country,
        },
        residential,
        parcel: Parcel { dimensions, weight_oz },
        contents: scan.contents,
    })
}

fn scan_block(block: &str) -> Scan {
    let mut scan = Scan::default();

    for line in block.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if apply_label(&mut scan, line) {
            continue;
        }
        if CONTENTS_LINE.is_match(line) {
            scan.contents.get_or_insert_with(|| line.to_string());
            continue;
        }

        let mut rest = line.to_string();

        if let Some(found) = EMAIL.find(&rest).map(|m| (m.range(), m.as_str().to_string())) {
            scan.email.get_or_insert(found.1);
            rest.replace_range(found.0, " ");
        }

        let phone = PHONE
            .find_iter(&rest)
            .find(|m| looks_like_phone(m.as_str()))
            .map(|m| (m.range(), m.as_str().trim().to_string()));
        if let Some((range, phone)) = phone {
            scan.phone.get_or_insert(phone);
            rest.replace_range(range, " ");
        }

        if let Some(found) = DIMENSION_TOKEN.find(&rest).map(|m| (m.range(), m.as_str().to_string())) {
            scan.dimensions.get_or_insert(found.1);
            rest.replace_range(found.0, " ");
        }

        // A weight line holds nothing but unit tokens and at most a label, so
        // `500 G St NW` stays a street.
        if scan.weight.is_none() && has_weight_unit(&rest) {
            let stripped = strip_weight_tokens(&rest);
            if is_leftover(&stripped) {
                scan.weight = Some(rest.clone());
                rest = stripped;
            }
        }

        if is_leftover(&rest) {
            continue;
        }
        let rest = trim_separators(&rest);
        scan.address_lines.push(rest.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    scan
}

fn trim_separators(text: &str) -> &str {
    text.trim_matches(|ch: char| ch.is_whitespace() || ",;|-:".contains(ch))
}

/// Nothing left on the line but separators or a dangling label.
fn is_leftover(text: &str) -> bool {
    let text = trim_separators(text);
    text.is_empty() || STRAY_LABELS.contains(&text.to_ascii_lowercase().as_str())
}

/// Routes a `Key: value` line to its field. Unknown keys are left for the address block.
fn apply_label(scan: &mut Scan, line: &str) -> bool {
    let Some(captures) = LABELLED.captures(line) else {
        return false;
    };
    let value = captures[2].trim().to_string();
    let slot = match captures[1].trim().to_ascii_lowercase().as_str() {
        "carrier" | "service" => &mut scan.carrier,
        "from" | "origin" | "ship from" | "warehouse" => &mut scan.origin,
        "contents" | "items" | "description" | "customs" | "goods" => &mut scan.contents,
        "weight" | "wt" => &mut scan.weight,
        "dimensions" | "dims" | "box" | "size" | "parcel" => &mut scan.dimensions,
        "phone" | "tel" | "mobile" | "cell" => &mut scan.phone,
        "email" | "e-mail" => &mut scan.email,
        "name" | "recipient" | "ship to" | "to" => &mut scan.name,
        "country" => &mut scan.country,
        _ => return false,
    };
    if !value.is_empty() {
        *slot = Some(value);
    }
    true
}

fn looks_like_phone(candidate: &str) -> bool {
    let digits = candidate.chars().filter(char::is_ascii_digit).count();
    let international = candidate.trim_start().starts_with('+');
    (10..=15).contains(&digits) || (international && (8..=15).contains(&digits))
}

fn looks_like_company(line: &str) -> bool {
    line.split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| COMPANY_KEYWORDS.contains(&word.to_ascii_lowercase().as_str()))
}

fn parse_city_line(line: &str) -> Option<CityLine> {
    if let Some(captures) = CITY_STATE_ZIP.captures(line) {
        return Some(CityLine {
            city: captures["city"].trim().to_string(),
            state: captures["state"].trim().to_string(),
            zip: captures["zip"].trim().to_string(),
        });
    }
    if let Some(captures) = CITY_CODE_ZIP.captures(line) {
        return Some(CityLine {
            city: captures["city"].trim().trim_end_matches(',').to_string(),
            state: captures["state"].to_string(),
            zip: captures["zip"].to_string(),
        });
    }
    CITY_ZIP.captures(line).and_then(|captures| {
        let zip = captures["zip"].trim();
        zip.chars().any(|ch| ch.is_ascii_digit()).then(|| CityLine {
            city: captures["city"].trim().to_string(),
            state: String::new(),
            zip: zip.to_string(),
        })
    })
}
