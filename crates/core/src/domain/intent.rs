use serde::{Deserialize, Serialize};

pub const DOMESTIC_COUNTRY: &str = "US";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street1: String,
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl Address {
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.street1.clone()];
        if let Some(street2) = self.street2.as_ref().filter(|value| !value.is_empty()) {
            parts.push(street2.clone());
        }
        parts.push(format!("{}, {} {}", self.city, self.state, self.zip).trim().to_string());
        parts.push(self.country.clone());
        parts.join(", ")
    }
}

/// Parcel measurements: inches for the box, ounces for the weight.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub dimensions: Dimensions,
    pub weight_oz: f64,
}

/// One parsed input line. Immutable once it has passed validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShipmentIntent {
    pub origin_hint: Option<String>,
    pub carrier_preference: Option<String>,
    pub recipient: Recipient,
    pub destination: Address,
    pub residential: bool,
    pub parcel: Parcel,
    pub contents: Option<String>,
}

impl ShipmentIntent {
    pub fn is_international(&self) -> bool {
        !self.destination.country.eq_ignore_ascii_case(DOMESTIC_COUNTRY)
    }

    /// The carrier the caller asked for, ignoring "no preference" spellings.
    pub fn preferred_carrier(&self) -> Option<&str> {
        normalize_carrier_preference(self.carrier_preference.as_deref())
    }
}

pub fn normalize_carrier_preference(value: Option<&str>) -> Option<&str> {
    let value = value?.trim();
    match value.to_ascii_lowercase().as_str() {
        "" | "any" | "cheapest" | "best" | "-" => None,
        _ => Some(value),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub line_number: usize,
    pub valid: bool,
    pub intent: Option<ShipmentIntent>,
    pub errors: Vec<String>,
    pub raw: String,
}

impl ValidationResult {
    pub fn accepted(line_number: usize, intent: ShipmentIntent, raw: impl Into<String>) -> Self {
        Self { line_number, valid: true, intent: Some(intent), errors: Vec::new(), raw: raw.into() }
    }

    pub fn rejected(
        line_number: usize,
        intent: Option<ShipmentIntent>,
        errors: Vec<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self { line_number, valid: false, intent, errors, raw: raw.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_carrier_preference, Address};

    #[test]
    fn no_preference_spellings_collapse_to_none() {
        assert_eq!(normalize_carrier_preference(Some("  Cheapest ")), None);
        assert_eq!(normalize_carrier_preference(Some("")), None);
        assert_eq!(normalize_carrier_preference(None), None);
        assert_eq!(normalize_carrier_preference(Some("USPS")), Some("USPS"));
    }

    #[test]
    fn one_line_skips_empty_second_street() {
        let address = Address {
            street1: "1 Main St".to_string(),
            street2: Some(String::new()),
            city: "Austin".to_string(),
            state: "TX".to_string(),
            zip: "78701".to_string(),
            country: "US".to_string(),
        };

        assert_eq!(address.one_line(), "1 Main St, Austin, TX 78701, US");
    }
}
