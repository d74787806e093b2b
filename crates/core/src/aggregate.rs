//! Result Aggregator: folds per-line outcomes into a [`BatchSummary`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::intent::ValidationResult;
use crate::domain::shipment::{BatchMode, ShipmentOutcome};
use crate::domain::summary::{BatchId, BatchSummary, CarrierBreakdown, RejectedLine};

pub fn summarize(
    batch_id: BatchId,
    mode: BatchMode,
    outcomes: &[ShipmentOutcome],
    rejected: &[ValidationResult],
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> BatchSummary {
    let mut by_carrier: BTreeMap<String, CarrierBreakdown> = BTreeMap::new();
    let mut total_cost = Decimal::ZERO;
    let mut priced = 0_usize;
    let mut successful = 0_usize;

    for outcome in outcomes.iter().filter(|outcome| outcome.is_success()) {
        successful += 1;
        let Some(rate) = &outcome.rate else {
            continue;
        };
        total_cost += rate.cost;
        priced += 1;

        let entry = by_carrier.entry(rate.carrier.clone()).or_default();
        entry.count += 1;
        entry.cost += rate.cost;
    }

    let average_cost = if priced == 0 {
        Decimal::ZERO
    } else {
        (total_cost / Decimal::from(priced)).round_dp(2)
    };

    let duration_secs =
        (finished_at - started_at).num_milliseconds().max(0) as f64 / 1_000.0;
    let throughput_per_sec =
        if duration_secs > 0.0 { outcomes.len() as f64 / duration_secs } else { 0.0 };

    BatchSummary {
        batch_id,
        mode,
        attempted: outcomes.len(),
        successful,
        failed: outcomes.len() - successful,
        total_cost,
        average_cost,
        started_at,
        finished_at,
        duration_secs,
        throughput_per_sec,
        by_carrier,
        validation_errors: rejected
            .iter()
            .filter(|result| !result.valid)
            .map(|result| RejectedLine {
                line_number: result.line_number,
                errors: result.errors.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::summarize;
    use crate::domain::intent::ValidationResult;
    use crate::domain::shipment::{
        BatchMode, ErrorClass, OutcomeEcho, RateSummary, ShipmentId, ShipmentOutcome,
    };
    use crate::domain::summary::BatchId;

    fn priced(line: usize, carrier: &str, cents: i64) -> ShipmentOutcome {
        ShipmentOutcome::quoted(
            line,
            &OutcomeEcho::default(),
            ShipmentId(format!("shp_{line}")),
            Vec::new(),
            Some(RateSummary {
                carrier: carrier.to_string(),
                service: "Ground".to_string(),
                cost: Decimal::new(cents, 2),
                currency: "USD".to_string(),
            }),
        )
    }

    fn failed(line: usize) -> ShipmentOutcome {
        ShipmentOutcome::failed(line, &OutcomeEcho::default(), None, ErrorClass::Gateway, "boom")
    }

    #[test]
    fn totals_and_breakdown_cover_priced_successes() {
        let start = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).single().expect("valid date");
        let finish = start + Duration::seconds(4);
        let outcomes = vec![
            priced(1, "USPS", 850),
            failed(2),
            priced(3, "UPS", 1_200),
            priced(4, "USPS", 650),
        ];
        let rejected =
            vec![ValidationResult::rejected(5, None, vec!["zip is required".to_string()], "x")];

        let summary = summarize(
            BatchId("batch_test".to_string()),
            BatchMode::QuoteOnly,
            &outcomes,
            &rejected,
            start,
            finish,
        );

        assert_eq!((summary.attempted, summary.successful, summary.failed), (4, 3, 1));
        assert_eq!(summary.total_cost, Decimal::new(2_700, 2));
        assert_eq!(summary.average_cost, Decimal::new(900, 2));
        assert_eq!(summary.duration_secs, 4.0);
        assert_eq!(summary.throughput_per_sec, 1.0);
        assert_eq!(summary.by_carrier["USPS"].count, 2);
        assert_eq!(summary.by_carrier["USPS"].cost, Decimal::new(1_500, 2));
        assert_eq!(summary.by_carrier["UPS"].count, 1);
        assert_eq!(summary.validation_errors.len(), 1);
        assert_eq!(summary.validation_errors[0].line_number, 5);
    }

    #[test]
    fn empty_and_instant_batches_do_not_divide_by_zero() {
        let now = Utc::now();
        let summary = summarize(
            BatchId("batch_empty".to_string()),
            BatchMode::QuoteAndPurchase,
            &[failed(1)],
            &[],
            now,
            now,
        );

        assert_eq!(summary.successful, 0);
        assert_eq!(summary.average_cost, Decimal::ZERO);
        assert_eq!(summary.throughput_per_sec, 0.0);
        assert!(summary.by_carrier.is_empty());
    }
}
