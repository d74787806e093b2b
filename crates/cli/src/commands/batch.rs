use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use bulkship_carrier::{gateway_from_config, CarrierError};
use bulkship_core::bulk::{BatchReport, BulkExecutionEngine, ProgressReport, PurchaseRequest};
use bulkship_core::config::{AppConfig, LoadOptions};
use bulkship_core::domain::shipment::BatchMode;
use bulkship_core::parsing::LineParser;
use bulkship_core::BulkError;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::commands::{
    load_config, read_input, runtime, CommandResult, EXIT_BATCH, EXIT_CONFIG, EXIT_INPUT, EXIT_OK,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct BatchArgs {
    pub progress: bool,
}

#[derive(Debug, Serialize)]
struct QuoteReport {
    #[serde(flatten)]
    report: BatchReport,
    purchase_requests: Vec<PurchaseRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PurchaseInput {
    Requests(Vec<PurchaseRequest>),
    Report { purchase_requests: Vec<PurchaseRequest> },
}

impl PurchaseInput {
    fn into_requests(self) -> Vec<PurchaseRequest> {
        match self {
            Self::Requests(requests) | Self::Report { purchase_requests: requests } => requests,
        }
    }
}

/// Phase A only. The report carries the purchase requests for a later `buy`.
pub fn quote(options: &LoadOptions, input: &Path, args: BatchArgs) -> CommandResult {
    let (config, text) = match prepare("quote", options, input) {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let results = LineParser::new(config.parsing.policy()).validate_batch(&text);
    let intents: BTreeMap<_, _> = results
        .iter()
        .filter_map(|result| result.intent.clone().map(|intent| (result.line_number, intent)))
        .collect();

    let outcome = execute("quote", &config, args, |engine| async move {
        engine.run_validated(results, BatchMode::QuoteOnly).await
    });
    let report = match outcome {
        Ok(Ok(report)) => report,
        Ok(Err(error)) => return no_valid_lines("quote", &error),
        Err(result) => return result,
    };

    let purchase_requests = report
        .outcomes
        .iter()
        .filter_map(|outcome| {
            let intent = intents.get(&outcome.line_number)?;
            PurchaseRequest::from_quote(outcome, intent)
        })
        .collect();

    let message = summary_message(&report);
    CommandResult::report("quote", message, &QuoteReport { report, purchase_requests }, EXIT_OK)
}

/// Phase A then Phase B over the same lines.
pub fn ship(options: &LoadOptions, input: &Path, args: BatchArgs) -> CommandResult {
    let (config, text) = match prepare("ship", options, input) {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let parser = LineParser::new(config.parsing.policy());
    let outcome = execute("ship", &config, args, |engine| async move {
        engine.run_batch(&text, BatchMode::QuoteAndPurchase, &parser).await
    });
    match outcome {
        Ok(Ok(report)) => CommandResult::report("ship", summary_message(&report), &report, EXIT_OK),
        Ok(Err(error)) => no_valid_lines("ship", &error),
        Err(result) => result,
    }
}

/// Phase B from a JSON list of purchase requests, or a saved `quote` report.
pub fn buy(options: &LoadOptions, input: &Path, args: BatchArgs) -> CommandResult {
    let (config, text) = match prepare("buy", options, input) {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let requests = match parse_purchase_requests(&text) {
        Ok(requests) => requests,
        Err(error) => {
            return CommandResult::failure("buy", "input_invalid", format!("{error:#}"), EXIT_INPUT)
        }
    };
    if requests.is_empty() {
        return CommandResult::failure("buy", "batch_failure", "no purchase requests", EXIT_BATCH);
    }

    let outcome = execute("buy", &config, args, |engine| async move {
        Ok::<_, BulkError>(engine.run_purchases(requests).await)
    });
    match outcome {
        Ok(Ok(report)) => CommandResult::report("buy", summary_message(&report), &report, EXIT_OK),
        Ok(Err(error)) => no_valid_lines("buy", &error),
        Err(result) => result,
    }
}

fn parse_purchase_requests(text: &str) -> anyhow::Result<Vec<PurchaseRequest>> {
    let input: PurchaseInput = serde_json::from_str(text).context(
        "expected a JSON array of purchase requests or a saved `quote` report",
    )?;
    Ok(input.into_requests())
}

fn prepare(
    command: &str,
    options: &LoadOptions,
    input: &Path,
) -> Result<(AppConfig, String), CommandResult> {
    let config = load_config(command, options)?;
    let text = read_input(command, input)?;
    Ok((config, text))
}

/// Builds the gateway and engine, wires Ctrl-C to cancellation and drives `run`.
fn execute<F, Fut>(
    command: &str,
    config: &AppConfig,
    args: BatchArgs,
    run: F,
) -> Result<Result<BatchReport, BulkError>, CommandResult>
where
    F: FnOnce(BulkExecutionEngine) -> Fut,
    Fut: std::future::Future<Output = Result<BatchReport, BulkError>>,
{
    let gateway = gateway_from_config(config).map_err(|error| match error {
        CarrierError::Config(error) => CommandResult::config_failure(command, &error),
        CarrierError::Client(message) => {
            CommandResult::failure(command, "carrier_client", message, EXIT_CONFIG)
        }
    })?;

    let cancel = CancellationToken::new();
    let mut engine =
        BulkExecutionEngine::from_app_config(gateway, config).with_cancellation(cancel.clone());
    if args.progress {
        engine = engine.with_progress_sink(Arc::new(print_progress));
    }

    let runtime = runtime(command)?;
    Ok(runtime.block_on(async move {
        let interrupt = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(event_name = "bulk.batch.interrupted", "interrupt received, cancelling batch");
                interrupt.cancel();
            }
        });
        let result = run(engine).await;
        watcher.abort();
        result
    }))
}

fn print_progress(report: &ProgressReport) {
    if let Ok(line) = serde_json::to_string(report) {
        eprintln!("{line}");
    }
}

/// A batch that ran always reports `ok`, even when every line failed; the
/// outcomes carry the failures. Only a batch that could not start exits 5.
fn no_valid_lines(command: &str, error: &BulkError) -> CommandResult {
    CommandResult::failure(command, "batch_failure", error.to_string(), EXIT_BATCH)
}


fn summary_message(report: &BatchReport) -> String {
    let summary = &report.summary;
    format!(
        "{} of {} lines succeeded ({} rejected), total ${}",
        summary.successful,
        summary.attempted,
        report.rejected.len(),
        summary.total_cost
    )
}
