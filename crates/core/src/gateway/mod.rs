//! Gateway boundary: everything the engine needs from a shipping provider.

pub mod blocking;
pub mod retry;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ShipFromAddress;
use crate::domain::customs::{CustomsDeclaration, CustomsLineItem};
use crate::domain::intent::{Address, Parcel, ShipmentIntent};
use crate::domain::shipment::{ErrorClass, PurchasedLabel, Rate, RateId, ShipmentId};

pub use blocking::{BlockingCarrierClient, BlockingGateway};
pub use retry::{call_with_retry, RetryPolicy};

/// Opaque provider id for a customs item or declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomsReference(pub String);

/// A named party plus postal address, as the provider wants it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Address,
}

impl Party {
    pub fn recipient(intent: &ShipmentIntent) -> Self {
        Self {
            name: intent.recipient.name.clone(),
            company: intent.recipient.company.clone(),
            phone: intent.recipient.phone.clone(),
            email: intent.recipient.email.clone(),
            address: intent.destination.clone(),
        }
    }
}

impl From<&ShipFromAddress> for Party {
    fn from(origin: &ShipFromAddress) -> Self {
        Self {
            name: origin.name.clone(),
            company: origin.company.clone(),
            phone: origin.phone.clone(),
            email: origin.email.clone(),
            address: Address {
                street1: origin.street1.clone(),
                street2: origin.street2.clone(),
                city: origin.city.clone(),
                state: origin.state.clone(),
                zip: origin.zip.clone(),
                country: origin.country.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub to: Party,
    pub from: Party,
    pub parcel: Parcel,
    pub residential: bool,
    pub customs: Option<CustomsReference>,
    pub carrier_accounts: Vec<String>,
    /// Caller reference echoed by the provider; the batch line number.
    pub reference: Option<String>,
}

/// A provider shipment with its rates and, once bought, its label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuotedShipment {
    pub id: ShipmentId,
    pub rates: Vec<Rate>,
    pub label: Option<PurchasedLabel>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOperation {
    CreateCustomsItem,
    CreateCustomsInfo,
    CreateShipment,
    RetrieveShipment,
    BuyShipment,
}

impl GatewayOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateCustomsItem => "create_customs_item",
            Self::CreateCustomsInfo => "create_customs_info",
            Self::CreateShipment => "create_shipment",
            Self::RetrieveShipment => "retrieve_shipment",
            Self::BuyShipment => "buy_shipment",
        }
    }
}

impl fmt::Display for GatewayOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum GatewayError {
    #[error("provider rate limit reached during {operation}: {message}")]
    RateLimited { operation: GatewayOperation, message: String, retry_after: Option<Duration> },
    #[error("{operation} timed out after {}s", after.as_secs_f64())]
    Timeout { operation: GatewayOperation, after: Duration },
    #[error("provider rejected {operation} (HTTP {status}): {message}")]
    Rejected { operation: GatewayOperation, status: u16, message: String },
    #[error("transport failure during {operation}: {message}")]
    Transport { operation: GatewayOperation, message: String },
    #[error("unexpected provider response for {operation}: {message}")]
    Decode { operation: GatewayOperation, message: String },
}

impl GatewayError {
    pub fn error_class(&self) -> ErrorClass {
        match self {
            Self::RateLimited { .. } => ErrorClass::GatewayRateLimited,
            Self::Timeout { .. } => ErrorClass::GatewayTimeout,
            Self::Rejected { .. } | Self::Transport { .. } | Self::Decode { .. } => {
                ErrorClass::Gateway
            }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Provider operations used by the bulk engine. Implementations must be cheap
/// to share across tasks; the engine holds them behind an `Arc`.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn create_customs_item(
        &self,
        item: &CustomsLineItem,
    ) -> Result<CustomsReference, GatewayError>;

    async fn create_customs_info(
        &self,
        declaration: &CustomsDeclaration,
        items: &[CustomsReference],
    ) -> Result<CustomsReference, GatewayError>;

    async fn create_shipment(&self, request: &ShipmentRequest)
        -> Result<QuotedShipment, GatewayError>;

    async fn retrieve_shipment(&self, id: &ShipmentId) -> Result<QuotedShipment, GatewayError>;

    async fn buy_shipment(
        &self,
        id: &ShipmentId,
        rate: &RateId,
    ) -> Result<PurchasedLabel, GatewayError>;
}
