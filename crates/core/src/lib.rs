pub mod aggregate;
pub mod bulk;
pub mod config;
pub mod customs;
pub mod domain;
pub mod errors;
pub mod gateway;
pub mod parsing;

pub use aggregate::summarize;
pub use bulk::{
    BatchPhase, BatchReport, BulkError, BulkExecutionEngine, CustomsOverride, LineIntent,
    ProgressReport, ProgressSink, PurchaseRequest,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use customs::{CustomsError, CustomsInferencer, CustomsRequest};
pub use domain::customs::CustomsDeclaration;
pub use domain::intent::{ShipmentIntent, ValidationResult};
pub use domain::shipment::{
    BatchMode, ErrorClass, OutcomeStatus, PurchasedLabel, Rate, ShipmentId, ShipmentOutcome,
};
pub use domain::summary::{BatchId, BatchSummary};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use gateway::{BlockingCarrierClient, BlockingGateway, Gateway, GatewayError};
pub use parsing::{DimensionPolicy, LineParser, ParseError};
