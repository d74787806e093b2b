use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::shipment::BatchMode;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub String);

impl BatchId {
    pub fn generate() -> Self {
        Self(format!("batch_{}", Uuid::new_v4().simple()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierBreakdown {
    pub count: usize,
    pub cost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedLine {
    pub line_number: usize,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub mode: BatchMode,
    pub attempted: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_cost: Decimal,
    pub average_cost: Decimal,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub throughput_per_sec: f64,
    pub by_carrier: BTreeMap<String, CarrierBreakdown>,
    pub validation_errors: Vec<RejectedLine>,
}
