//! Concrete provider gateways for the bulk shipment engine.

pub mod http;
pub mod sandbox;
mod wire;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use bulkship_core::config::{AppConfig, CarrierMode, ConfigError};
use bulkship_core::gateway::{BlockingGateway, Gateway};

pub use http::HttpCarrierGateway;
pub use sandbox::SandboxCarrier;

#[derive(Debug, Error)]
pub enum CarrierError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not build provider client: {0}")]
    Client(String),
}

/// Builds the gateway selected by `carrier.mode`.
pub fn gateway_from_config(config: &AppConfig) -> Result<Arc<dyn Gateway>, CarrierError> {
    let gateway: Arc<dyn Gateway> = match config.carrier.mode {
        CarrierMode::Http => Arc::new(HttpCarrierGateway::new(&config.carrier)?),
        CarrierMode::Sandbox => {
            Arc::new(BlockingGateway::new(SandboxCarrier::new(), config.bulk.blocking_workers))
        }
    };

    info!(
        event_name = "carrier.gateway.ready",
        mode = config.carrier.mode.as_str(),
        base_url = %config.carrier.base_url,
        "provider gateway ready"
    );
    Ok(gateway)
}
