//! Bulk Execution Engine
//!
//! Drives one provider workflow per validated line with bounded concurrency.
//! Phase A creates shipments and collects rates. Phase B picks a rate and buys
//! a label, optionally re-declaring customs first. Every line ends as exactly
//! one [`ShipmentOutcome`], returned in input order.

pub mod progress;
pub mod selection;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::aggregate;
use crate::config::{AppConfig, BulkConfig, ShipFromConfig};
use crate::customs::{CustomsCache, CustomsError, CustomsInferencer, CustomsRequest};
use crate::domain::intent::{normalize_carrier_preference, ShipmentIntent, ValidationResult};
use crate::domain::shipment::{
    BatchMode, ErrorClass, OutcomeEcho, PurchasedLabel, RateSummary, ShipmentId, ShipmentOutcome,
};
use crate::domain::summary::{BatchId, BatchSummary};
use crate::gateway::{
    call_with_retry, CustomsReference, Gateway, GatewayError, GatewayOperation, Party,
    QuotedShipment, RetryPolicy, ShipmentRequest,
};
use crate::parsing::LineParser;

pub use progress::{
    chunk_size, BatchPhase, NoopProgressSink, ProgressReport, ProgressSink, ProgressTracker,
};
pub use selection::{select_rate, RateSelectionError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BulkError {
    #[error("batch has no valid lines ({rejected} rejected)")]
    NoValidLines { rejected: usize },
}

/// A validated intent and the line it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineIntent {
    pub line_number: usize,
    pub intent: ShipmentIntent,
}

/// Replacement customs inputs for a Phase B purchase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomsOverride {
    #[serde(default)]
    pub compliance_code: Option<String>,
    #[serde(default)]
    pub declared_value: Option<Decimal>,
    #[serde(default)]
    pub contents: Option<String>,
}

/// One line of Phase B input, usually produced from a Phase A outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub line_number: usize,
    pub shipment_id: ShipmentId,
    #[serde(default)]
    pub preferred_carrier: Option<String>,
    #[serde(default)]
    pub intent: Option<ShipmentIntent>,
    #[serde(default)]
    pub customs_override: Option<CustomsOverride>,
}

impl PurchaseRequest {
    /// Builds the follow-up purchase for a successful quote.
    pub fn from_quote(outcome: &ShipmentOutcome, intent: &ShipmentIntent) -> Option<Self> {
        let shipment_id = outcome.shipment_id.clone().filter(|_| outcome.is_success())?;
        Some(Self {
            line_number: outcome.line_number,
            shipment_id,
            preferred_carrier: intent.carrier_preference.clone(),
            intent: Some(intent.clone()),
            customs_override: None,
        })
    }

    fn preferred_carrier(&self) -> Option<&str> {
        normalize_carrier_preference(self.preferred_carrier.as_deref()).or_else(|| {
            self.intent.as_ref().and_then(ShipmentIntent::preferred_carrier)
        })
    }

    fn echo(&self) -> OutcomeEcho {
        self.intent.as_ref().map(OutcomeEcho::from).unwrap_or_default()
    }
}

/// Everything `run_batch` produced: the summary, per-line outcomes in input
/// order, and the lines rejected before any provider call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub outcomes: Vec<ShipmentOutcome>,
    pub rejected: Vec<ValidationResult>,
}

pub struct BulkExecutionEngine {
    gateway: Arc<dyn Gateway>,
    config: BulkConfig,
    retry: RetryPolicy,
    customs: CustomsInferencer,
    ship_from: ShipFromConfig,
    carrier_accounts: Vec<String>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl BulkExecutionEngine {
    pub fn new(gateway: Arc<dyn Gateway>, config: BulkConfig) -> Self {
        let retry = RetryPolicy::from(&config);
        Self {
            gateway,
            config,
            retry,
            customs: CustomsInferencer::new(Default::default()),
            ship_from: ShipFromConfig::default(),
            carrier_accounts: Vec::new(),
            progress: Arc::new(NoopProgressSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_app_config(gateway: Arc<dyn Gateway>, config: &AppConfig) -> Self {
        Self::new(gateway, config.bulk.clone())
            .with_customs(CustomsInferencer::new(config.customs.clone()))
            .with_ship_from(config.ship_from.clone())
            .with_carrier_accounts(config.carrier.carrier_accounts.clone())
    }

    pub fn with_customs(mut self, customs: CustomsInferencer) -> Self {
        self.customs = customs;
        self
    }

    pub fn with_ship_from(mut self, ship_from: ShipFromConfig) -> Self {
        self.ship_from = ship_from;
        self
    }

    pub fn with_carrier_accounts(mut self, carrier_accounts: Vec<String>) -> Self {
        self.carrier_accounts = carrier_accounts;
        self
    }

    pub fn with_progress_sink(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Phase A: create a shipment per line and return its rates. Nothing is bought.
    pub async fn quote_batch(&self, lines: Vec<LineIntent>) -> Vec<ShipmentOutcome> {
        let context = self.context();
        self.run_phase(BatchPhase::Quote, lines, context, quote_line).await
    }

    /// Phase B: select a rate and buy a label for each previously quoted shipment.
    pub async fn purchase_batch(&self, requests: Vec<PurchaseRequest>) -> Vec<ShipmentOutcome> {
        let context = self.context();
        let jobs = requests.into_iter().map(|request| PurchaseJob { request, quoted: None }).collect();
        self.run_phase(BatchPhase::Purchase, jobs, context, purchase_line).await
    }

    /// Parse, validate, quote and (unless quote-only) purchase a raw batch.
    ///
    /// Fails only when no line survives validation; every other problem is
    /// reported on the line it belongs to.
    pub async fn run_batch(
        &self,
        text: &str,
        mode: BatchMode,
        parser: &LineParser,
    ) -> Result<BatchReport, BulkError> {
        self.run_validated(parser.validate_batch(text), mode).await
    }

    /// Same as [`Self::run_batch`] for records the caller already validated.
    pub async fn run_validated(
        &self,
        results: Vec<ValidationResult>,
        mode: BatchMode,
    ) -> Result<BatchReport, BulkError> {
        let batch_id = BatchId::generate();
        let started_at = Utc::now();

        let (accepted, rejected): (Vec<_>, Vec<_>) =
            results.into_iter().partition(|result| result.valid);
        let lines: Vec<LineIntent> = accepted
            .into_iter()
            .filter_map(|result| {
                let line_number = result.line_number;
                result.intent.map(|intent| LineIntent { line_number, intent })
            })
            .collect();

        if lines.is_empty() {
            warn!(
                event_name = "bulk.batch.no_valid_lines",
                batch_id = %batch_id.0,
                rejected = rejected.len(),
                "no valid lines in batch"
            );
            return Err(BulkError::NoValidLines { rejected: rejected.len() });
        }

        self.log_started(&batch_id, mode, lines.len(), rejected.len());
        let context = self.context();
        let quotes =
            self.run_phase(BatchPhase::Quote, lines.clone(), Arc::clone(&context), quote_line).await;

        let outcomes = match mode {
            BatchMode::QuoteOnly => quotes,
            BatchMode::QuoteAndPurchase | BatchMode::Purchase => {
                self.purchase_quoted(lines, quotes, context).await
            }
        };

        Ok(self.finish(batch_id, mode, started_at, outcomes, rejected))
    }

    /// Phase B as a standalone batch, summarised like any other run.
    pub async fn run_purchases(&self, requests: Vec<PurchaseRequest>) -> BatchReport {
        let batch_id = BatchId::generate();
        let started_at = Utc::now();
        self.log_started(&batch_id, BatchMode::Purchase, requests.len(), 0);

        let outcomes = self.purchase_batch(requests).await;
        self.finish(batch_id, BatchMode::Purchase, started_at, outcomes, Vec::new())
    }

    fn log_started(&self, batch_id: &BatchId, mode: BatchMode, lines: usize, rejected: usize) {
        info!(
            event_name = "bulk.batch.started",
            batch_id = %batch_id.0,
            mode = mode.as_str(),
            lines,
            rejected,
            max_concurrency = self.config.max_concurrency,
            "bulk batch started"
        );
    }

    fn finish(
        &self,
        batch_id: BatchId,
        mode: BatchMode,
        started_at: DateTime<Utc>,
        outcomes: Vec<ShipmentOutcome>,
        rejected: Vec<ValidationResult>,
    ) -> BatchReport {
        let summary =
            aggregate::summarize(batch_id, mode, &outcomes, &rejected, started_at, Utc::now());
        info!(
            event_name = "bulk.batch.finished",
            batch_id = %summary.batch_id.0,
            attempted = summary.attempted,
            successful = summary.successful,
            failed = summary.failed,
            total_cost = %summary.total_cost,
            duration_secs = summary.duration_secs,
            "bulk batch finished"
        );
        BatchReport { summary, outcomes, rejected }
    }

    /// Phase B over the successful quotes; failed quotes pass through unchanged.
    async fn purchase_quoted(
        &self,
        lines: Vec<LineIntent>,
        quotes: Vec<ShipmentOutcome>,
        context: Arc<LineContext>,
    ) -> Vec<ShipmentOutcome> {
        let mut slots: Vec<Option<ShipmentOutcome>> = Vec::with_capacity(quotes.len());
        let mut positions = Vec::new();
        let mut jobs = Vec::new();

        for (line, quote) in lines.into_iter().zip(quotes) {
            match PurchaseRequest::from_quote(&quote, &line.intent) {
                Some(request) => {
                    let quoted = quote.shipment_id.clone().map(|id| QuotedShipment {
                        id,
                        rates: quote.rates.clone(),
                        label: None,
                    });
                    positions.push(slots.len());
                    slots.push(None);
                    jobs.push(PurchaseJob { request, quoted });
                }
                None => slots.push(Some(quote)),
            }
        }

        let purchased = self.run_phase(BatchPhase::Purchase, jobs, context, purchase_line).await;
        for (position, outcome) in positions.into_iter().zip(purchased) {
            slots[position] = Some(outcome);
        }
        slots.into_iter().flatten().collect()
    }

    fn context(&self) -> Arc<LineContext> {
        Arc::new(LineContext {
            gateway: Arc::clone(&self.gateway),
            config: self.config.clone(),
            retry: self.retry.clone(),
            customs: self.customs.clone(),
            cache: CustomsCache::new(),
            ship_from: self.ship_from.clone(),
            carrier_accounts: self.carrier_accounts.clone(),
            cancel: self.cancel.clone(),
        })
    }

    /// Runs `work` for every item, chunk by chunk, with at most
    /// `max_concurrency` lines holding a permit at once.
    async fn run_phase<I, W, Fut>(
        &self,
        phase: BatchPhase,
        items: Vec<I>,
        context: Arc<LineContext>,
        work: W,
    ) -> Vec<ShipmentOutcome>
    where
        I: PhaseItem,
        W: Fn(Arc<LineContext>, I) -> Fut + Copy + Send + 'static,
        Fut: Future<Output = ShipmentOutcome> + Send + 'static,
    {
        let total = items.len();
        let concurrency = self.config.max_concurrency.max(1);
        let chunk = chunk_size(total, concurrency, self.config.progress_step_percent);
        let permits = Arc::new(Semaphore::new(concurrency));
        let mut tracker = ProgressTracker::new(phase, total);
        let mut outcomes = Vec::with_capacity(total);
        let mut pending = items.into_iter().peekable();

        while pending.peek().is_some() {
            let (lines, handles): (Vec<_>, Vec<_>) = pending
                .by_ref()
                .take(chunk)
                .map(|item| {
                    let line_number = item.line_number();
                    let echo = item.echo();
                    let permits = Arc::clone(&permits);
                    let context = Arc::clone(&context);
                    let task_echo = echo.clone();

                    let handle = tokio::spawn(async move {
                        let permit = tokio::select! {
                            biased;
                            _ = context.cancel.cancelled() => None,
                            permit = permits.acquire_owned() => permit.ok(),
                        };
                        let Some(_permit) = permit else {
                            return cancelled_outcome(line_number, &task_echo);
                        };
                        if context.cancel.is_cancelled() {
                            return cancelled_outcome(line_number, &task_echo);
                        }
                        work(context, item).await
                    });
                    ((line_number, echo), handle)
                })
                .unzip();

            for ((line_number, echo), joined) in lines.into_iter().zip(join_all(handles).await) {
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(join_error) => {
                        error!(
                            event_name = "bulk.line.panicked",
                            phase = phase.as_str(),
                            line_number,
                            error = %join_error,
                            "line worker did not complete"
                        );
                        ShipmentOutcome::failed(
                            line_number,
                            &echo,
                            None,
                            ErrorClass::Internal,
                            format!("line worker did not complete: {join_error}"),
                        )
                    }
                };
                tracker.record(outcome.is_success());
                outcomes.push(outcome);
            }

            let report = tracker.snapshot();
            info!(
                event_name = "bulk.progress",
                phase = phase.as_str(),
                completed = report.completed,
                total = report.total,
                succeeded = report.succeeded,
                failed = report.failed,
                percent = report.percent,
                throughput_per_sec = report.throughput_per_sec,
                eta_secs = report.eta_secs.unwrap_or_default(),
                "bulk progress"
            );
            self.progress.report(&report);
        }

        outcomes
    }
}

trait PhaseItem: Send + 'static {
    fn line_number(&self) -> usize;
    fn echo(&self) -> OutcomeEcho;
}

impl PhaseItem for LineIntent {
    fn line_number(&self) -> usize {
        self.line_number
    }

    fn echo(&self) -> OutcomeEcho {
        OutcomeEcho::from(&self.intent)
    }
}

struct PurchaseJob {
    request: PurchaseRequest,
    /// Rates already known from Phase A in the same run; skips the retrieve.
    quoted: Option<QuotedShipment>,
}

impl PhaseItem for PurchaseJob {
    fn line_number(&self) -> usize {
        self.request.line_number
    }

    fn echo(&self) -> OutcomeEcho {
        self.request.echo()
    }
}

/// Why one line failed, before it becomes an outcome.
#[derive(Debug)]
struct LineFailure {
    class: ErrorClass,
    message: String,
    shipment_id: Option<ShipmentId>,
}

impl LineFailure {
    fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self { class, message: message.into(), shipment_id: None }
    }

    fn cancelled() -> Self {
        Self::new(ErrorClass::Cancelled, "batch cancelled before this line was sent")
    }

    fn with_shipment(mut self, shipment_id: &ShipmentId) -> Self {
        self.shipment_id.get_or_insert_with(|| shipment_id.clone());
        self
    }

    fn into_outcome(self, line_number: usize, echo: &OutcomeEcho) -> ShipmentOutcome {
        warn!(
            event_name = "bulk.line.failed",
            line_number,
            error_class = self.class.as_str(),
            error = %self.message,
            "line failed"
        );
        ShipmentOutcome::failed(line_number, echo, self.shipment_id, self.class, self.message)
    }
}

impl From<GatewayError> for LineFailure {
    fn from(error: GatewayError) -> Self {
        Self::new(error.error_class(), error.to_string())
    }
}

impl From<CustomsError> for LineFailure {
    fn from(error: CustomsError) -> Self {
        Self::new(ErrorClass::Compliance, error.to_string())
    }
}

fn cancelled_outcome(line_number: usize, echo: &OutcomeEcho) -> ShipmentOutcome {
    LineFailure::cancelled().into_outcome(line_number, echo)
}

/// Per-run state shared by every line task. The customs cache lives and dies
/// with one run.
struct LineContext {
    gateway: Arc<dyn Gateway>,
    config: BulkConfig,
    retry: RetryPolicy,
    customs: CustomsInferencer,
    cache: CustomsCache,
    ship_from: ShipFromConfig,
    carrier_accounts: Vec<String>,
    cancel: CancellationToken,
}

impl LineContext {
    /// Issues a gateway call unless the run has been cancelled.
    async fn call<T, F, Fut>(
        &self,
        operation: GatewayOperation,
        budget: Duration,
        call: F,
    ) -> Result<T, LineFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(LineFailure::cancelled());
        }
        Ok(call_with_retry(&self.retry, operation, budget, call).await?)
    }

    async fn declare_customs(
        &self,
        intent: &ShipmentIntent,
        customs_override: Option<&CustomsOverride>,
    ) -> Result<CustomsReference, LineFailure> {
        let mut request =
            CustomsRequest::new(intent.contents.clone().unwrap_or_default(), intent.parcel.weight_oz);
        if let Some(customs_override) = customs_override {
            if let Some(contents) = &customs_override.contents {
                request.contents = contents.clone();
            }
            request.declared_value = customs_override.declared_value;
            request.compliance_code = customs_override.compliance_code.clone();
        }

        let declaration = self.cache.get_or_infer(&self.customs, &request)?;
        let budget = self.config.quote_timeout();

        let mut references = Vec::with_capacity(declaration.items.len());
        for item in &declaration.items {
            let reference = self
                .call(GatewayOperation::CreateCustomsItem, budget, || {
                    self.gateway.create_customs_item(item)
                })
                .await?;
            references.push(reference);
        }

        self.call(GatewayOperation::CreateCustomsInfo, budget, || {
            self.gateway.create_customs_info(&declaration, &references)
        })
        .await
    }

    async fn create_shipment(
        &self,
        line_number: usize,
        intent: &ShipmentIntent,
        customs_override: Option<&CustomsOverride>,
    ) -> Result<QuotedShipment, LineFailure> {
        let customs = if intent.is_international() {
            Some(self.declare_customs(intent, customs_override).await?)
        } else {
            None
        };

        let request = ShipmentRequest {
            to: Party::recipient(intent),
            from: Party::from(self.ship_from.resolve(intent.origin_hint.as_deref())),
            parcel: intent.parcel,
            residential: intent.residential,
            customs,
            carrier_accounts: self.carrier_accounts.clone(),
            reference: Some(format!("line-{line_number}")),
        };

        self.call(GatewayOperation::CreateShipment, self.config.create_timeout(), || {
            self.gateway.create_shipment(&request)
        })
        .await
    }

    async fn purchase(
        &self,
        request: &PurchaseRequest,
        quoted: Option<QuotedShipment>,
    ) -> Result<(ShipmentId, PurchasedLabel), LineFailure> {
        let shipment = match (&request.customs_override, &request.intent, quoted) {
            (Some(customs_override), Some(intent), _) => self
                .create_shipment(request.line_number, intent, Some(customs_override))
                .await
                .map_err(|failure| failure.with_shipment(&request.shipment_id))?,
            (Some(_), None, _) => {
                return Err(LineFailure::new(
                    ErrorClass::Parse,
                    "a customs override needs the original intent to re-create the shipment",
                )
                .with_shipment(&request.shipment_id))
            }
            (None, _, Some(quoted)) => quoted,
            (None, _, None) => self
                .call(GatewayOperation::RetrieveShipment, self.config.quote_timeout(), || {
                    self.gateway.retrieve_shipment(&request.shipment_id)
                })
                .await
                .map_err(|failure| failure.with_shipment(&request.shipment_id))?,
        };

        if let Some(label) = shipment.label {
            info!(
                event_name = "bulk.purchase.already_purchased",
                line_number = request.line_number,
                shipment_id = %shipment.id,
                "shipment already has a label; not buying again"
            );
            return Ok((shipment.id, label));
        }

        let rate = select_rate(&shipment.rates, request.preferred_carrier()).map_err(|error| {
            LineFailure::new(ErrorClass::RateSelection, error.to_string()).with_shipment(&shipment.id)
        })?;

        let bought = self
            .call(GatewayOperation::BuyShipment, self.config.purchase_timeout(), || {
                self.gateway.buy_shipment(&shipment.id, &rate.id)
            })
            .await;

        match bought {
            Ok(mut label) => {
                label.rate.get_or_insert_with(|| RateSummary::from(rate));
                Ok((shipment.id, label))
            }
            Err(failure) if failure.class == ErrorClass::GatewayTimeout => {
                self.reconcile(request.line_number, &shipment.id, failure).await
            }
            Err(failure) => Err(failure.with_shipment(&shipment.id)),
        }
    }

    /// After a purchase timeout, asks the provider once whether the label exists.
    /// Runs even when the batch is being cancelled.
    async fn reconcile(
        &self,
        line_number: usize,
        shipment_id: &ShipmentId,
        timeout: LineFailure,
    ) -> Result<(ShipmentId, PurchasedLabel), LineFailure> {
        warn!(
            event_name = "bulk.purchase.reconciling",
            line_number,
            shipment_id = %shipment_id,
            "purchase timed out; checking provider for a label"
        );

        let retrieved = call_with_retry(
            &self.retry,
            GatewayOperation::RetrieveShipment,
            self.config.quote_timeout(),
            || self.gateway.retrieve_shipment(shipment_id),
        )
        .await;

        match retrieved {
            Ok(QuotedShipment { label: Some(label), id, .. }) => {
                info!(
                    event_name = "bulk.purchase.reconciled",
                    line_number,
                    shipment_id = %id,
                    "label found after purchase timeout"
                );
                Ok((id, label))
            }
            Ok(_) => Err(LineFailure::new(
                ErrorClass::GatewayTimeout,
                format!(
                    "{}; provider shows no label for {shipment_id}, review before retrying",
                    timeout.message
                ),
            )
            .with_shipment(shipment_id)),
            Err(error) => Err(LineFailure::new(
                ErrorClass::GatewayTimeout,
                format!(
                    "{}; reconciliation failed ({error}), purchase state of {shipment_id} is unknown",
                    timeout.message
                ),
            )
            .with_shipment(shipment_id)),
        }
    }
}

async fn quote_line(context: Arc<LineContext>, line: LineIntent) -> ShipmentOutcome {
    let echo = OutcomeEcho::from(&line.intent);
    match context.create_shipment(line.line_number, &line.intent, None).await {
        Ok(shipment) => {
            let selected = select_rate(&shipment.rates, line.intent.preferred_carrier())
                .ok()
                .map(RateSummary::from);
            ShipmentOutcome::quoted(line.line_number, &echo, shipment.id, shipment.rates, selected)
        }
        Err(failure) => failure.into_outcome(line.line_number, &echo),
    }
}

async fn purchase_line(context: Arc<LineContext>, job: PurchaseJob) -> ShipmentOutcome {
    let echo = job.request.echo();
    let line_number = job.request.line_number;
    match context.purchase(&job.request, job.quoted).await {
        Ok((shipment_id, label)) => {
            ShipmentOutcome::purchased(line_number, &echo, shipment_id, label)
        }
        Err(failure) => failure.into_outcome(line_number, &echo),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::PurchaseRequest;
    use crate::domain::intent::{Address, Dimensions, Parcel, Recipient, ShipmentIntent};
    use crate::domain::shipment::{ErrorClass, OutcomeEcho, ShipmentId, ShipmentOutcome};

    fn intent(carrier: Option<&str>) -> ShipmentIntent {
        ShipmentIntent {
            origin_hint: None,
            carrier_preference: carrier.map(str::to_string),
            recipient: Recipient {
                name: "Ann Lee".to_string(),
                company: None,
                phone: None,
                email: None,
            },
            destination: Address {
                street1: "1 Elm St".to_string(),
                street2: None,
                city: "Austin".to_string(),
                state: "TX".to_string(),
                zip: "78701".to_string(),
                country: "US".to_string(),
            },
            residential: true,
            parcel: Parcel {
                dimensions: Dimensions { length: 6.0, width: 6.0, height: 6.0 },
                weight_oz: 16.0,
            },
            contents: None,
        }
    }

    #[test]
    fn purchase_request_follows_successful_quotes_only() {
        let intent = intent(Some("UPS"));
        let echo = OutcomeEcho::from(&intent);
        let quoted =
            ShipmentOutcome::quoted(3, &echo, ShipmentId("shp_3".to_string()), Vec::new(), None);
        let failed = ShipmentOutcome::failed(4, &echo, None, ErrorClass::Gateway, "boom");

        let request = PurchaseRequest::from_quote(&quoted, &intent).expect("quoted line");
        assert_eq!(request.line_number, 3);
        assert_eq!(request.shipment_id.0, "shp_3");
        assert_eq!(request.preferred_carrier(), Some("UPS"));
        assert!(PurchaseRequest::from_quote(&failed, &intent).is_none());
    }

    #[test]
    fn explicit_preference_beats_intent_and_any_means_none() {
        let mut request = PurchaseRequest {
            line_number: 1,
            shipment_id: ShipmentId("shp_1".to_string()),
            preferred_carrier: Some("FedEx".to_string()),
            intent: Some(intent(Some("UPS"))),
            customs_override: None,
        };
        assert_eq!(request.preferred_carrier(), Some("FedEx"));

        request.preferred_carrier = Some("any".to_string());
        assert_eq!(request.preferred_carrier(), Some("UPS"));

        request.intent = Some(intent(Some("cheapest")));
        assert_eq!(request.preferred_carrier(), None);
    }

    #[test]
    fn purchase_requests_deserialize_with_optional_fields() {
        let request: PurchaseRequest = serde_json::from_str(
            r#"{"line_number": 2, "shipment_id": "shp_2",
                "customs_override": {"compliance_code": "AES X123", "declared_value": "3100.00"}}"#,
        )
        .expect("valid request");

        assert!(request.intent.is_none());
        let customs = request.customs_override.expect("override present");
        assert_eq!(customs.compliance_code.as_deref(), Some("AES X123"));
        assert_eq!(customs.declared_value, Some(Decimal::new(310_000, 2)));
        assert!(customs.contents.is_none());
    }
}
