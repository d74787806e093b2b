//! Customs Inferencer
//!
//! Reads a free-form contents description plus the parcel weight and produces
//! customs line items and a compliance code. Structured item lists are tried
//! first, then single-item shapes, then a keyword heuristic.

pub mod cache;
pub mod categories;
pub mod patterns;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CustomsConfig;
use crate::domain::customs::{
    ComplianceCode, ComplianceSource, CustomsDeclaration, CustomsLineItem, COMPLIANCE_THRESHOLD_USD,
    MAX_CUSTOMS_ITEMS,
};

pub use cache::CustomsCache;
pub use categories::{classify, Category, DEFAULT_CATEGORY};
pub use patterns::ParsedItem;

/// Share of the parcel weight attributed to goods; the rest is packaging.
pub const GOODS_WEIGHT_FRACTION: f64 = 0.88;

const HEAVY_PARCEL_LB: f64 = 2.0;
const ESTIMATE_CAP_MULTIPLIER: i64 = 3;
const OUNCES_PER_POUND: f64 = 16.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomsRequest {
    pub contents: String,
    pub weight_oz: f64,
    pub declared_value: Option<Decimal>,
    pub compliance_code: Option<String>,
}

impl CustomsRequest {
    pub fn new(contents: impl Into<String>, weight_oz: f64) -> Self {
        Self { contents: contents.into(), weight_oz, declared_value: None, compliance_code: None }
    }

    pub fn with_declared_value(mut self, value: Decimal) -> Self {
        self.declared_value = Some(value);
        self
    }

    pub fn with_compliance_code(mut self, code: impl Into<String>) -> Self {
        self.compliance_code = Some(code.into());
        self
    }

    fn caller_code(&self) -> Option<&str> {
        self.compliance_code.as_deref().map(str::trim).filter(|code| !code.is_empty())
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum CustomsError {
    #[error("contents description is required to build a customs declaration")]
    MissingContents,
    #[error(
        "declared value ${total} is at or above the ${threshold} export threshold; file the \
         shipment through AES to obtain an ITN and supply it as the compliance code"
    )]
    ComplianceCodeRequired { total: Decimal, threshold: Decimal },
    #[error("declared value is too large to represent; check the item prices and quantities")]
    DeclaredValueOutOfRange,
}

/// How the line items were read from the description.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractionSource {
    MultiItem,
    SingleItem(&'static str),
    Heuristic,
}

#[derive(Clone, Debug)]
pub struct CustomsInferencer {
    config: CustomsConfig,
}

impl CustomsInferencer {
    pub fn new(config: CustomsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CustomsConfig {
        &self.config
    }

    pub fn infer(&self, request: &CustomsRequest) -> Result<CustomsDeclaration, CustomsError> {
        let contents = request.contents.trim();
        if contents.is_empty() {
            return Err(CustomsError::MissingContents);
        }

        let (source, items) = self.extract_items(contents, request);
        let total = items
            .iter()
            .try_fold(Decimal::ZERO, |total, item| {
                item.checked_total_value().and_then(|value| total.checked_add(value))
            })
            .ok_or(CustomsError::DeclaredValueOutOfRange)?;
        let compliance = self.compliance(total, request)?;

        debug!(
            event_name = "customs.inferred",
            source = ?source,
            items = items.len(),
            total = %total,
            compliance = %compliance.code,
            "customs declaration inferred"
        );

        Ok(CustomsDeclaration {
            items,
            signer: self.config.signer.clone(),
            certified: self.config.certified,
            contents_type: self.config.contents_type,
            restriction_type: self.config.restriction_type.clone(),
            restriction_comments: None,
            non_delivery_option: self.config.non_delivery_option.clone(),
            compliance,
        })
    }

    fn extract_items(
        &self,
        contents: &str,
        request: &CustomsRequest,
    ) -> (ExtractionSource, Vec<CustomsLineItem>) {
        let tariff = patterns::extract_tariff(contents);
        let text = patterns::strip_tariff(contents);
        let goods_weight = request.weight_oz * GOODS_WEIGHT_FRACTION;

        let mut parsed = patterns::multi_items(&text);
        if parsed.len() >= 2 {
            if parsed.len() > MAX_CUSTOMS_ITEMS {
                warn!(
                    event_name = "customs.items.capped",
                    found = parsed.len(),
                    kept = MAX_CUSTOMS_ITEMS,
                    "dropping customs items beyond the provider limit"
                );
                parsed.truncate(MAX_CUSTOMS_ITEMS);
            }
            let tariff = tariff.unwrap_or_else(|| DEFAULT_CATEGORY.tariff_code.to_string());
            let weights = apportion_weight(&parsed, goods_weight);
            let items = parsed
                .into_iter()
                .zip(weights)
                .map(|(item, weight_oz)| self.line_item(item, weight_oz, &tariff))
                .collect();
            return (ExtractionSource::MultiItem, items);
        }

        if let Some((name, item)) = patterns::single_item(&text) {
            let tariff = tariff.unwrap_or_else(|| DEFAULT_CATEGORY.tariff_code.to_string());
            let item = self.line_item(item, round_weight(goods_weight), &tariff);
            return (ExtractionSource::SingleItem(name), vec![item]);
        }

        let category = categories::classify(&text);
        let unit_value = patterns::first_money(&text)
            .or(request.declared_value)
            .unwrap_or_else(|| estimate_value(category, request.weight_oz));
        let description = Some(patterns::clean_description(&text))
            .filter(|description| !description.is_empty())
            .unwrap_or_else(|| category.description.to_string());
        let tariff = tariff.unwrap_or_else(|| category.tariff_code.to_string());
        let item = self.line_item(
            ParsedItem { quantity: 1, description, unit_value },
            round_weight(goods_weight),
            &tariff,
        );
        (ExtractionSource::Heuristic, vec![item])
    }

    fn line_item(&self, item: ParsedItem, weight_oz: f64, tariff: &str) -> CustomsLineItem {
        CustomsLineItem {
            description: item.description,
            quantity: item.quantity,
            unit_value: item.unit_value.round_dp(2),
            weight_oz,
            tariff_code: tariff.to_string(),
            origin_country: self.config.origin_country.clone(),
        }
    }

    fn compliance(
        &self,
        total: Decimal,
        request: &CustomsRequest,
    ) -> Result<ComplianceCode, CustomsError> {
        if let Some(code) = request.caller_code() {
            return Ok(ComplianceCode {
                code: code.to_string(),
                source: ComplianceSource::CallerSupplied,
            });
        }
        if total >= COMPLIANCE_THRESHOLD_USD {
            return Err(CustomsError::ComplianceCodeRequired {
                total,
                threshold: COMPLIANCE_THRESHOLD_USD,
            });
        }
        Ok(ComplianceCode {
            code: self.config.automatic_code.clone(),
            source: ComplianceSource::Automatic,
        })
    }
}

/// Splits the goods weight across items in proportion to each item's value.
fn apportion_weight(items: &[ParsedItem], goods_weight: f64) -> Vec<f64> {
    let values: Vec<f64> = items
        .iter()
        .map(|item| {
            item.unit_value.saturating_mul(Decimal::from(item.quantity)).to_f64().unwrap_or(0.0)
        })
        .collect();
    let total: f64 = values.iter().sum();

    if total <= 0.0 {
        let quantity: f64 = items.iter().map(|item| f64::from(item.quantity)).sum();
        return items
            .iter()
            .map(|item| round_weight(goods_weight * f64::from(item.quantity) / quantity))
            .collect();
    }

    values.iter().map(|value| round_weight(goods_weight * value / total)).collect()
}

/// Category base value, scaled up for parcels heavier than two pounds.
fn estimate_value(category: Category, weight_oz: f64) -> Decimal {
    let base = category.base_value();
    let weight_lb = weight_oz / OUNCES_PER_POUND;
    if weight_lb <= HEAVY_PARCEL_LB {
        return base;
    }

    let cap = base.saturating_mul(Decimal::from(ESTIMATE_CAP_MULTIPLIER));
    Decimal::from_f64(weight_lb / HEAVY_PARCEL_LB)
        .and_then(|scale| base.checked_mul(scale))
        .map_or(cap, |value| value.min(cap))
        .round_dp(2)
}

fn round_weight(weight_oz: f64) -> f64 {
    (weight_oz * 100.0).round() / 100.0
}
