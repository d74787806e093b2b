//! JSON bodies exchanged with the EasyPost-style REST API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bulkship_core::domain::customs::{CustomsDeclaration, CustomsLineItem};
use bulkship_core::domain::intent::Parcel;
use bulkship_core::domain::shipment::{PurchasedLabel, Rate, RateId, RateSummary, ShipmentId};
use bulkship_core::gateway::{CustomsReference, Party, QuotedShipment, ShipmentRequest};

#[derive(Debug, Serialize)]
pub(crate) struct CustomsItemEnvelope<'a> {
    pub customs_item: CustomsItemBody<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CustomsItemBody<'a> {
    pub description: &'a str,
    pub quantity: u32,
    /// Total value of the line, not the unit value.
    pub value: Decimal,
    pub weight: f64,
    pub hs_tariff_number: &'a str,
    pub origin_country: &'a str,
}

impl<'a> From<&'a CustomsLineItem> for CustomsItemEnvelope<'a> {
    fn from(item: &'a CustomsLineItem) -> Self {
        Self {
            customs_item: CustomsItemBody {
                description: &item.description,
                quantity: item.quantity,
                value: item.total_value(),
                weight: item.weight_oz,
                hs_tariff_number: &item.tariff_code,
                origin_country: &item.origin_country,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CustomsInfoEnvelope<'a> {
    pub customs_info: CustomsInfoBody<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CustomsInfoBody<'a> {
    pub customs_certify: bool,
    pub customs_signer: &'a str,
    pub contents_type: &'static str,
    pub restriction_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restriction_comments: Option<&'a str>,
    pub non_delivery_option: &'a str,
    pub eel_pfc: &'a str,
    pub customs_items: Vec<IdRef<'a>>,
}

impl<'a> CustomsInfoEnvelope<'a> {
    pub fn new(declaration: &'a CustomsDeclaration, items: &'a [CustomsReference]) -> Self {
        Self {
            customs_info: CustomsInfoBody {
                customs_certify: declaration.certified,
                customs_signer: &declaration.signer,
                contents_type: declaration.contents_type.as_str(),
                restriction_type: &declaration.restriction_type,
                restriction_comments: declaration.restriction_comments.as_deref(),
                non_delivery_option: &declaration.non_delivery_option,
                eel_pfc: &declaration.compliance.code,
                customs_items: items.iter().map(|item| IdRef { id: &item.0 }).collect(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct IdRef<'a> {
    pub id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ShipmentEnvelope<'a> {
    pub shipment: ShipmentBody<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ShipmentBody<'a> {
    pub to_address: AddressBody<'a>,
    pub from_address: AddressBody<'a>,
    pub parcel: ParcelBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customs_info: Option<IdRef<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier_accounts: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<&'a str>,
}

impl<'a> From<&'a ShipmentRequest> for ShipmentEnvelope<'a> {
    fn from(request: &'a ShipmentRequest) -> Self {
        Self {
            shipment: ShipmentBody {
                to_address: AddressBody::new(&request.to, Some(request.residential)),
                from_address: AddressBody::new(&request.from, None),
                parcel: ParcelBody::from(&request.parcel),
                customs_info: request.customs.as_ref().map(|customs| IdRef { id: &customs.0 }),
                carrier_accounts: (!request.carrier_accounts.is_empty())
                    .then_some(request.carrier_accounts.as_slice()),
                reference: request.reference.as_deref(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AddressBody<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<&'a str>,
    pub street1: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street2: Option<&'a str>,
    pub city: &'a str,
    pub state: &'a str,
    pub zip: &'a str,
    pub country: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residential: Option<bool>,
}

impl<'a> AddressBody<'a> {
    fn new(party: &'a Party, residential: Option<bool>) -> Self {
        let address = &party.address;
        Self {
            name: &party.name,
            company: party.company.as_deref(),
            street1: &address.street1,
            street2: address.street2.as_deref(),
            city: &address.city,
            state: &address.state,
            zip: &address.zip,
            country: &address.country,
            phone: party.phone.as_deref(),
            email: party.email.as_deref(),
            residential,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ParcelBody {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub weight: f64,
}

impl From<&Parcel> for ParcelBody {
    fn from(parcel: &Parcel) -> Self {
        Self {
            length: parcel.dimensions.length,
            width: parcel.dimensions.width,
            height: parcel.dimensions.height,
            weight: parcel.weight_oz,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct BuyBody<'a> {
    pub rate: IdRef<'a>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShipmentResponse {
    pub id: String,
    #[serde(default)]
    pub rates: Vec<RateResponse>,
    #[serde(default)]
    pub tracking_code: Option<String>,
    #[serde(default)]
    pub postage_label: Option<PostageLabel>,
    #[serde(default)]
    pub selected_rate: Option<RateResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateResponse {
    pub id: String,
    pub carrier: String,
    pub service: String,
    pub rate: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub delivery_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostageLabel {
    #[serde(default)]
    pub label_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl From<RateResponse> for Rate {
    fn from(rate: RateResponse) -> Self {
        Self {
            id: RateId(rate.id),
            carrier: rate.carrier,
            service: rate.service,
            cost: rate.rate,
            currency: rate.currency,
            delivery_days: rate.delivery_days,
        }
    }
}

impl ShipmentResponse {
    /// The label, when the shipment has been bought.
    pub fn label(&self) -> Option<PurchasedLabel> {
        let tracking_code = self.tracking_code.as_deref().filter(|code| !code.is_empty())?;
        Some(PurchasedLabel {
            tracking_code: tracking_code.to_string(),
            label_url: self.postage_label.as_ref().and_then(|label| label.label_url.clone()),
            rate: self.selected_rate.as_ref().map(|rate| RateSummary {
                carrier: rate.carrier.clone(),
                service: rate.service.clone(),
                cost: rate.rate,
                currency: rate.currency.clone(),
            }),
        })
    }
}

impl From<ShipmentResponse> for QuotedShipment {
    fn from(response: ShipmentResponse) -> Self {
        let label = response.label();
        Self {
            id: ShipmentId(response.id),
            rates: response.rates.into_iter().map(Rate::from).collect(),
            label,
        }
    }
}

impl ErrorEnvelope {
    /// Provider message for a failed call, falling back to the raw body.
    pub fn message(self, raw: &str) -> String {
        match self.error {
            Some(ErrorBody { message: Some(message), code }) => match code {
                Some(code) => format!("{code}: {message}"),
                None => message,
            },
            _ if raw.trim().is_empty() => "no error details returned".to_string(),
            _ => raw.trim().chars().take(300).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{ErrorEnvelope, ShipmentEnvelope, ShipmentResponse};
    use bulkship_core::domain::intent::{Address, Dimensions, Parcel};
    use bulkship_core::gateway::{CustomsReference, Party, QuotedShipment, ShipmentRequest};

    fn party(name: &str, country: &str) -> Party {
        Party {
            name: name.to_string(),
            company: None,
            phone: Some("5125550100".to_string()),
            email: None,
            address: Address {
                street1: "1 Elm St".to_string(),
                street2: None,
                city: "Austin".to_string(),
                state: "TX".to_string(),
                zip: "78701".to_string(),
                country: country.to_string(),
            },
        }
    }

    #[test]
    fn shipment_body_flags_residential_recipient_and_links_customs() {
        let request = ShipmentRequest {
            to: party("Ann Lee", "GB"),
            from: party("Warehouse", "US"),
            parcel: Parcel {
                dimensions: Dimensions { length: 12.0, width: 10.0, height: 4.0 },
                weight_oz: 32.0,
            },
            residential: true,
            customs: Some(CustomsReference("cstinfo_1".to_string())),
            carrier_accounts: Vec::new(),
            reference: Some("line-4".to_string()),
        };

        let body = serde_json::to_value(ShipmentEnvelope::from(&request)).expect("serializable");

        assert_eq!(body["shipment"]["to_address"]["residential"], json!(true));
        assert!(body["shipment"]["from_address"].get("residential").is_none());
        assert_eq!(body["shipment"]["customs_info"]["id"], json!("cstinfo_1"));
        assert_eq!(body["shipment"]["parcel"]["weight"], json!(32.0));
        assert!(body["shipment"].get("carrier_accounts").is_none());
        assert_eq!(body["shipment"]["reference"], json!("line-4"));
    }

    #[test]
    fn purchased_shipment_decodes_label_and_rates() {
        let response: ShipmentResponse = serde_json::from_value(json!({
            "id": "shp_1",
            "tracking_code": "9400100000000000000000",
            "postage_label": {"label_url": "https://labels.test/shp_1.png"},
            "selected_rate": {"id": "rate_1", "carrier": "USPS", "service": "Priority",
                              "rate": "7.25", "currency": "USD", "delivery_days": 2},
            "rates": [
                {"id": "rate_1", "carrier": "USPS", "service": "Priority", "rate": "7.25",
                 "currency": "USD", "delivery_days": 2},
                {"id": "rate_2", "carrier": "UPS", "service": "Ground", "rate": "9.10",
                 "delivery_days": null}
            ]
        }))
        .expect("valid shipment");

        let shipment = QuotedShipment::from(response);
        let label = shipment.label.expect("purchased");

        assert_eq!(shipment.rates.len(), 2);
        assert_eq!(shipment.rates[1].cost, Decimal::new(910, 2));
        assert_eq!(shipment.rates[1].currency, "USD");
        assert_eq!(label.label_url.as_deref(), Some("https://labels.test/shp_1.png"));
        assert_eq!(label.rate.map(|rate| rate.carrier), Some("USPS".to_string()));
    }

    #[test]
    fn unpurchased_shipment_has_no_label() {
        let response: ShipmentResponse =
            serde_json::from_value(json!({"id": "shp_2", "tracking_code": null, "rates": []}))
                .expect("valid shipment");

        assert!(QuotedShipment::from(response).label.is_none());
    }

    #[test]
    fn error_messages_prefer_provider_body() {
        let envelope: ErrorEnvelope = serde_json::from_value(json!({
            "error": {"code": "ADDRESS.VERIFY.FAILURE", "message": "Unable to verify address."}
        }))
        .expect("valid error");

        assert_eq!(envelope.message(""), "ADDRESS.VERIFY.FAILURE: Unable to verify address.");
        assert_eq!(ErrorEnvelope::default().message("  gateway exploded "), "gateway exploded");
        assert_eq!(ErrorEnvelope::default().message(""), "no error details returned");
    }
}
