use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::intent::ShipmentIntent;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShipmentId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateId(pub String);

impl std::fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub id: RateId,
    pub carrier: String,
    pub service: String,
    pub cost: Decimal,
    pub currency: String,
    pub delivery_days: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSummary {
    pub carrier: String,
    pub service: String,
    pub cost: Decimal,
    pub currency: String,
}

impl From<&Rate> for RateSummary {
    fn from(rate: &Rate) -> Self {
        Self {
            carrier: rate.carrier.clone(),
            service: rate.service.clone(),
            cost: rate.cost,
            currency: rate.currency.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedLabel {
    pub tracking_code: String,
    pub label_url: Option<String>,
    pub rate: Option<RateSummary>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    QuoteOnly,
    QuoteAndPurchase,
    Purchase,
}

impl BatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteOnly => "quote_only",
            Self::QuoteAndPurchase => "quote_and_purchase",
            Self::Purchase => "purchase",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Error,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Parse,
    Compliance,
    GatewayTimeout,
    GatewayRateLimited,
    Gateway,
    RateSelection,
    Cancelled,
    Internal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Compliance => "compliance",
            Self::GatewayTimeout => "gateway_timeout",
            Self::GatewayRateLimited => "gateway_rate_limited",
            Self::Gateway => "gateway",
            Self::RateSelection => "rate_selection",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

/// Per-line result of a gateway run. Built once, never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShipmentOutcome {
    pub line_number: usize,
    pub status: OutcomeStatus,
    pub shipment_id: Option<ShipmentId>,
    pub tracking_code: Option<String>,
    pub label_url: Option<String>,
    pub rate: Option<RateSummary>,
    pub rates: Vec<Rate>,
    pub error: Option<String>,
    pub error_class: Option<ErrorClass>,
    pub recipient: String,
    pub destination: String,
}

impl ShipmentOutcome {
    pub fn quoted(
        line_number: usize,
        echo: &OutcomeEcho,
        shipment_id: ShipmentId,
        rates: Vec<Rate>,
        selected: Option<RateSummary>,
    ) -> Self {
        Self {
            line_number,
            status: OutcomeStatus::Success,
            shipment_id: Some(shipment_id),
            tracking_code: None,
            label_url: None,
            rate: selected,
            rates,
            error: None,
            error_class: None,
            recipient: echo.recipient.clone(),
            destination: echo.destination.clone(),
        }
    }

    pub fn purchased(
        line_number: usize,
        echo: &OutcomeEcho,
        shipment_id: ShipmentId,
        label: PurchasedLabel,
    ) -> Self {
        Self {
            line_number,
            status: OutcomeStatus::Success,
            shipment_id: Some(shipment_id),
            tracking_code: Some(label.tracking_code),
            label_url: label.label_url,
            rate: label.rate,
            rates: Vec::new(),
            error: None,
            error_class: None,
            recipient: echo.recipient.clone(),
            destination: echo.destination.clone(),
        }
    }

    pub fn failed(
        line_number: usize,
        echo: &OutcomeEcho,
        shipment_id: Option<ShipmentId>,
        error_class: ErrorClass,
        error: impl Into<String>,
    ) -> Self {
        Self {
            line_number,
            status: OutcomeStatus::Error,
            shipment_id,
            tracking_code: None,
            label_url: None,
            rate: None,
            rates: Vec::new(),
            error: Some(error.into()),
            error_class: Some(error_class),
            recipient: echo.recipient.clone(),
            destination: echo.destination.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Recipient and destination text echoed on every outcome for human review.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeEcho {
    pub recipient: String,
    pub destination: String,
}

impl From<&ShipmentIntent> for OutcomeEcho {
    fn from(intent: &ShipmentIntent) -> Self {
        let recipient = match &intent.recipient.company {
            Some(company) => format!("{} ({company})", intent.recipient.name),
            None => intent.recipient.name.clone(),
        };
        Self { recipient, destination: intent.destination.one_line() }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorClass, OutcomeEcho, OutcomeStatus, ShipmentId, ShipmentOutcome};

    #[test]
    fn status_round_trips_through_text() {
        for status in [OutcomeStatus::Success, OutcomeStatus::Error] {
            assert_eq!(OutcomeStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OutcomeStatus::parse("pending"), None);
    }

    #[test]
    fn failed_outcome_keeps_line_number_and_class() {
        let echo = OutcomeEcho { recipient: "Ada".to_string(), destination: "x".to_string() };
        let outcome = ShipmentOutcome::failed(
            7,
            &echo,
            Some(ShipmentId("shp_1".to_string())),
            ErrorClass::GatewayTimeout,
            "timed out",
        );

        assert_eq!(outcome.line_number, 7);
        assert!(!outcome.is_success());
        assert_eq!(outcome.error_class.map(|class| class.as_str()), Some("gateway_timeout"));
    }
}
