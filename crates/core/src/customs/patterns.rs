//! Regex tables for reading item lists out of a contents description.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rust_decimal::Decimal;

/// Provider limit for a customs item description.
pub const MAX_DESCRIPTION_CHARS: usize = 45;

const AMOUNT: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?";

static TARIFF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:hts|hs|tariff)(?:\s*code)?\s*[:#]?\s*(?P<code>\d{4}(?:\.\d{2,4}){0,3})")
        .expect("tariff regex should be valid")
});

static MONEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\$\s*(?P<amount>{AMOUNT})")).expect("money regex should be valid")
});

static MULTI_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\(\s*(?P<qty>\d+)\s*\)\s*(?P<desc>[^()$]+?)\s*\(\s*\$\s*(?P<value>{AMOUNT})\s*(?:each|ea\.?|/\s*ea)?\s*\)"
    ))
    .expect("multi-item regex should be valid")
});

/// One item read from a structured description, before weight and tariff are assigned.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedItem {
    pub quantity: u32,
    pub description: String,
    pub unit_value: Decimal,
}

/// A single-item shape and the function that reads its captures.
pub struct ItemPattern {
    pub name: &'static str,
    regex: Regex,
    extract: fn(&Captures<'_>) -> Option<ParsedItem>,
}

impl ItemPattern {
    fn new(name: &'static str, pattern: &str, extract: fn(&Captures<'_>) -> Option<ParsedItem>) -> Self {
        let regex = Regex::new(pattern).expect("single-item regex should be valid");
        Self { name, regex, extract }
    }

    pub fn apply(&self, text: &str) -> Option<ParsedItem> {
        self.regex.captures(text).and_then(|captures| (self.extract)(&captures))
    }
}

/// Tried in order; the first pattern that yields an item wins.
pub static SINGLE_ITEM_PATTERNS: Lazy<Vec<ItemPattern>> = Lazy::new(|| {
    vec![
        ItemPattern::new(
            "quantity_first",
            &format!(
                r"(?i)^\s*\(?\s*(?P<qty>\d+)\s*\)?\s*(?:x|×|pcs?\.?|pieces?|units?)?\s+(?P<desc>.+?)\s*(?:@\s*)?\(?\s*\$\s*(?P<value>{AMOUNT})\s*(?:each|ea\.?|/\s*ea)?\s*\)?\s*$"
            ),
            extract_with_quantity,
        ),
        ItemPattern::new(
            "value_first",
            &format!(
                r"(?i)^\s*\$\s*(?P<value>{AMOUNT})\s*(?:each|ea\.?)?\s+(?:(?:worth\s+)?of\s+)?(?P<desc>.+?)(?:\s*(?:x|×)\s*(?P<qty>\d+))?\s*$"
            ),
            extract_value_first,
        ),
        ItemPattern::new(
            "quantity_last",
            &format!(
                r"(?i)^\s*(?P<desc>[^$]+?)\s*(?:@\s*)?\(?\s*\$\s*(?P<value>{AMOUNT})\s*(?:each|ea\.?)?\s*\)?\s*(?:x|×|qty:?)\s*(?P<qty>\d+)\s*$"
            ),
            extract_with_quantity,
        ),
    ]
});

/// Returns the first tariff code found after an `HTS`, `HS` or `tariff` label.
pub fn extract_tariff(text: &str) -> Option<String> {
    TARIFF.captures(text).map(|captures| captures["code"].to_string())
}

/// Removes tariff labels and codes so they do not leak into descriptions.
pub fn strip_tariff(text: &str) -> String {
    TARIFF.replace_all(text, " ").into_owned()
}

/// First `$amount` in the text, thousands separators allowed.
pub fn first_money(text: &str) -> Option<Decimal> {
    MONEY.captures(text).and_then(|captures| parse_amount(&captures["amount"]))
}

/// Every `(qty) description ($value each)` segment, in order.
pub fn multi_items(text: &str) -> Vec<ParsedItem> {
    MULTI_ITEM.captures_iter(text).filter_map(|captures| extract_with_quantity(&captures)).collect()
}

pub fn single_item(text: &str) -> Option<(&'static str, ParsedItem)> {
    SINGLE_ITEM_PATTERNS
        .iter()
        .find_map(|pattern| pattern.apply(text).map(|item| (pattern.name, item)))
}

/// Collapses whitespace, trims separators, and cuts to the provider limit.
pub fn clean_description(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|ch: char| ch.is_whitespace() || ",;:-".contains(ch));
    trimmed.chars().take(MAX_DESCRIPTION_CHARS).collect::<String>().trim_end().to_string()
}

fn extract_with_quantity(captures: &Captures<'_>) -> Option<ParsedItem> {
    let quantity: u32 = captures.name("qty")?.as_str().parse().ok()?;
    build(quantity, captures)
}

fn extract_value_first(captures: &Captures<'_>) -> Option<ParsedItem> {
    let quantity = match captures.name("qty") {
        Some(quantity) => quantity.as_str().parse().ok()?,
        None => 1,
    };
    build(quantity, captures)
}

fn build(quantity: u32, captures: &Captures<'_>) -> Option<ParsedItem> {
    let description = clean_description(captures.name("desc")?.as_str());
    let unit_value = parse_amount(captures.name("value")?.as_str())?;
    if quantity == 0 || description.is_empty() {
        return None;
    }
    Some(ParsedItem { quantity, description, unit_value })
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    raw.replace(',', "").parse::<Decimal>().ok()
}
