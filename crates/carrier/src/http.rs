use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use bulkship_core::config::CarrierConfig;
use bulkship_core::domain::customs::{CustomsDeclaration, CustomsLineItem};
use bulkship_core::domain::shipment::{PurchasedLabel, RateId, ShipmentId};
use bulkship_core::gateway::{
    CustomsReference, Gateway, GatewayError, GatewayOperation, QuotedShipment, ShipmentRequest,
};

use crate::wire::{
    BuyBody, CustomsInfoEnvelope, CustomsItemEnvelope, ErrorEnvelope, IdRef, IdResponse,
    ShipmentEnvelope, ShipmentResponse,
};
use crate::CarrierError;

/// Async REST client for an EasyPost-style shipping API.
pub struct HttpCarrierGateway {
    client: Client,
    base_url: String,
    api_key: SecretString,
    timeout: Duration,
}

impl HttpCarrierGateway {
    pub fn new(config: &CarrierConfig) -> Result<Self, CarrierError> {
        let api_key = config.require_credentials()?.clone();
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bulkship/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| CarrierError::Client(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{path}", self.base_url))
            .basic_auth(self.api_key.expose_secret(), None::<&str>)
    }

    async fn send<B, T>(
        &self,
        operation: GatewayOperation,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(event_name = "carrier.http.request", operation = operation.as_str(), path, "sending");
        let response = request.send().await.map_err(|error| self.transport(operation, error))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failure(operation, response).await);
        }

        response.json::<T>().await.map_err(|error| GatewayError::Decode {
            operation,
            message: format!("could not decode {status} response: {error}"),
        })
    }

    fn transport(&self, operation: GatewayOperation, error: reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout { operation, after: self.timeout }
        } else {
            GatewayError::Transport { operation, message: error.to_string() }
        }
    }
}

async fn failure(operation: GatewayOperation, response: Response) -> GatewayError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let raw = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&raw).unwrap_or_default().message(&raw);

    warn!(
        event_name = "carrier.http.error_status",
        operation = operation.as_str(),
        status = status.as_u16(),
        error = %message,
        "provider returned an error status"
    );

    if status == StatusCode::TOO_MANY_REQUESTS {
        GatewayError::RateLimited { operation, message, retry_after }
    } else {
        GatewayError::Rejected { operation, status: status.as_u16(), message }
    }
}

#[async_trait]
impl Gateway for HttpCarrierGateway {
    async fn create_customs_item(
        &self,
        item: &CustomsLineItem,
    ) -> Result<CustomsReference, GatewayError> {
        let body = CustomsItemEnvelope::from(item);
        let created: IdResponse = self
            .send(GatewayOperation::CreateCustomsItem, Method::POST, "customs_items", Some(&body))
            .await?;
        Ok(CustomsReference(created.id))
    }

    async fn create_customs_info(
        &self,
        declaration: &CustomsDeclaration,
        items: &[CustomsReference],
    ) -> Result<CustomsReference, GatewayError> {
        let body = CustomsInfoEnvelope::new(declaration, items);
        let created: IdResponse = self
            .send(GatewayOperation::CreateCustomsInfo, Method::POST, "customs_infos", Some(&body))
            .await?;
        Ok(CustomsReference(created.id))
    }

    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> Result<QuotedShipment, GatewayError> {
        let body = ShipmentEnvelope::from(request);
        let shipment: ShipmentResponse = self
            .send(GatewayOperation::CreateShipment, Method::POST, "shipments", Some(&body))
            .await?;
        Ok(shipment.into())
    }

    async fn retrieve_shipment(&self, id: &ShipmentId) -> Result<QuotedShipment, GatewayError> {
        let shipment: ShipmentResponse = self
            .send::<(), _>(
                GatewayOperation::RetrieveShipment,
                Method::GET,
                &format!("shipments/{id}"),
                None,
            )
            .await?;
        Ok(shipment.into())
    }

    async fn buy_shipment(
        &self,
        id: &ShipmentId,
        rate: &RateId,
    ) -> Result<PurchasedLabel, GatewayError> {
        let body = BuyBody { rate: IdRef { id: &rate.0 } };
        let shipment: ShipmentResponse = self
            .send(GatewayOperation::BuyShipment, Method::POST, &format!("shipments/{id}/buy"), Some(&body))
            .await?;
        shipment.label().ok_or_else(|| GatewayError::Decode {
            operation: GatewayOperation::BuyShipment,
            message: format!("purchase of {id} returned no tracking code"),
        })
    }
}
