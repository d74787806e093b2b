//! Offline provider used for dry runs and demos.
//!
//! Behaves like a synchronous SDK: every call blocks for the configured latency
//! and answers deterministically from an in-memory store. Wrap it in
//! [`bulkship_core::gateway::BlockingGateway`] to drive it from the engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rust_decimal::Decimal;

use bulkship_core::domain::customs::{CustomsDeclaration, CustomsLineItem};
use bulkship_core::domain::shipment::{PurchasedLabel, Rate, RateId, RateSummary, ShipmentId};
use bulkship_core::gateway::{
    BlockingCarrierClient, CustomsReference, GatewayError, GatewayOperation, QuotedShipment,
    ShipmentRequest,
};

/// (carrier, service, base cents, cents per pound, transit days)
const TARIFFS: [(&str, &str, i64, i64, u32); 3] = [
    ("USPS", "Priority", 540, 45, 3),
    ("UPS", "Ground", 810, 55, 4),
    ("FedEx", "Home Delivery", 890, 60, 2),
];
const INTERNATIONAL_SURCHARGE_CENTS: i64 = 1_800;
const INTERNATIONAL_EXTRA_DAYS: u32 = 5;

#[derive(Debug, Default)]
pub struct SandboxCarrier {
    latency: Duration,
    sequence: AtomicU64,
    shipments: Mutex<HashMap<ShipmentId, QuotedShipment>>,
}

impl SandboxCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_sandbox_{:06}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn pause(&self) {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
    }

    fn rates(id: &ShipmentId, request: &ShipmentRequest) -> Vec<Rate> {
        let pounds = (request.parcel.weight_oz / 16.0).ceil().max(1.0) as i64;
        let international = !request.to.address.country.eq_ignore_ascii_case("US");

        TARIFFS
            .iter()
            .map(|(carrier, service, base, per_pound, days)| {
                let mut cents = base + per_pound * pounds;
                let mut transit = *days;
                if international {
                    cents += INTERNATIONAL_SURCHARGE_CENTS;
                    transit += INTERNATIONAL_EXTRA_DAYS;
                }
                if request.residential && *carrier != "USPS" {
                    cents += 125;
                }
                Rate {
                    id: RateId(format!("rate_{}_{}", id.0, carrier.to_ascii_lowercase())),
                    carrier: carrier.to_string(),
                    service: service.to_string(),
                    cost: Decimal::new(cents, 2),
                    currency: "USD".to_string(),
                    delivery_days: Some(transit),
                }
            })
            .collect()
    }
}

fn rejected(operation: GatewayOperation, status: u16, message: String) -> GatewayError {
    GatewayError::Rejected { operation, status, message }
}

impl BlockingCarrierClient for SandboxCarrier {
    fn create_customs_item(&self, item: &CustomsLineItem) -> Result<CustomsReference, GatewayError> {
        self.pause();
        if item.quantity == 0 || item.description.trim().is_empty() {
            return Err(rejected(
                GatewayOperation::CreateCustomsItem,
                422,
                "customs item needs a description and a positive quantity".to_string(),
            ));
        }
        Ok(CustomsReference(self.next_id("cstitem")))
    }

    fn create_customs_info(
        &self,
        declaration: &CustomsDeclaration,
        items: &[CustomsReference],
    ) -> Result<CustomsReference, GatewayError> {
        self.pause();
        if items.is_empty() || declaration.compliance.code.trim().is_empty() {
            return Err(rejected(
                GatewayOperation::CreateCustomsInfo,
                422,
                "customs info needs at least one item and an EEL/PFC code".to_string(),
            ));
        }
        Ok(CustomsReference(self.next_id("cstinfo")))
    }

    fn create_shipment(&self, request: &ShipmentRequest) -> Result<QuotedShipment, GatewayError> {
        self.pause();
        let international = !request.to.address.country.eq_ignore_ascii_case("US");
        if international && request.customs.is_none() {
            return Err(rejected(
                GatewayOperation::CreateShipment,
                422,
                format!("customs info is required to ship to {}", request.to.address.country),
            ));
        }

        let id = ShipmentId(self.next_id("shp"));
        let shipment =
            QuotedShipment { id: id.clone(), rates: Self::rates(&id, request), label: None };
        self.shipments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, shipment.clone());
        Ok(shipment)
    }

    fn retrieve_shipment(&self, id: &ShipmentId) -> Result<QuotedShipment, GatewayError> {
        self.pause();
        self.shipments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| {
                rejected(GatewayOperation::RetrieveShipment, 404, format!("shipment {id} not found"))
            })
    }

    fn buy_shipment(&self, id: &ShipmentId, rate: &RateId) -> Result<PurchasedLabel, GatewayError> {
        self.pause();
        let mut shipments = self.shipments.lock().unwrap_or_else(PoisonError::into_inner);
        let shipment = shipments.get_mut(id).ok_or_else(|| {
            rejected(GatewayOperation::BuyShipment, 404, format!("shipment {id} not found"))
        })?;
        if shipment.label.is_some() {
            return Err(rejected(
                GatewayOperation::BuyShipment,
                422,
                format!("shipment {id} has already been purchased"),
            ));
        }
        let selected = shipment.rates.iter().find(|candidate| &candidate.id == rate).ok_or_else(
            || rejected(GatewayOperation::BuyShipment, 422, format!("rate {} is not on {id}", rate.0)),
        )?;

        let label = PurchasedLabel {
            tracking_code: format!("SBX{}", id.0.trim_start_matches("shp_sandbox_")),
            label_url: Some(format!("https://sandbox.bulkship.invalid/labels/{}.png", id.0)),
            rate: Some(RateSummary::from(selected)),
        };
        shipment.label = Some(label.clone());
        Ok(label)
    }
}
