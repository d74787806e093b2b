use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Declared value at or above which the automatic exemption code is not legal.
pub const COMPLIANCE_THRESHOLD_USD: Decimal = Decimal::from_parts(2500, 0, 0, false, 0);

/// Maximum number of line items the provider accepts on one declaration.
pub const MAX_CUSTOMS_ITEMS: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomsLineItem {
    pub description: String,
    pub quantity: u32,
    pub unit_value: Decimal,
    pub weight_oz: f64,
    pub tariff_code: String,
    pub origin_country: String,
}

impl CustomsLineItem {
    /// `None` when the line total does not fit in a `Decimal`.
    pub fn checked_total_value(&self) -> Option<Decimal> {
        self.unit_value.checked_mul(Decimal::from(self.quantity))
    }

    pub fn total_value(&self) -> Decimal {
        self.unit_value.saturating_mul(Decimal::from(self.quantity))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceSource {
    Automatic,
    CallerSupplied,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceCode {
    pub code: String,
    pub source: ComplianceSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentsType {
    Merchandise,
    Gift,
    Documents,
    ReturnedGoods,
    Sample,
    Other,
}

impl ContentsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merchandise => "merchandise",
            Self::Gift => "gift",
            Self::Documents => "documents",
            Self::ReturnedGoods => "returned_goods",
            Self::Sample => "sample",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomsDeclaration {
    pub items: Vec<CustomsLineItem>,
    pub signer: String,
    pub certified: bool,
    pub contents_type: ContentsType,
    pub restriction_type: String,
    pub restriction_comments: Option<String>,
    pub non_delivery_option: String,
    pub compliance: ComplianceCode,
}

impl CustomsDeclaration {
    pub fn checked_total_value(&self) -> Option<Decimal> {
        self.items.iter().try_fold(Decimal::ZERO, |total, item| {
            item.checked_total_value().and_then(|value| total.checked_add(value))
        })
    }

    pub fn total_value(&self) -> Decimal {
        self.items.iter().fold(Decimal::ZERO, |total, item| total.saturating_add(item.total_value()))
    }

    pub fn total_weight_oz(&self) -> f64 {
        self.items.iter().map(|item| item.weight_oz).sum()
    }
}
