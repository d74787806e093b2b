use thiserror::Error;

use crate::domain::intent::normalize_carrier_preference;
use crate::domain::shipment::Rate;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RateSelectionError {
    #[error("provider returned no rates for this shipment")]
    NoRates,
    #[error("no rate from preferred carrier `{carrier}` (available: {})", available.join(", "))]
    PreferredCarrierUnavailable { carrier: String, available: Vec<String> },
}

/// Cheapest rate, restricted to the preferred carrier when there is one.
///
/// Ties go to the faster service, then to the service name, so repeated runs
/// pick the same rate.
pub fn select_rate<'a>(
    rates: &'a [Rate],
    preferred_carrier: Option<&str>,
) -> Result<&'a Rate, RateSelectionError> {
    if rates.is_empty() {
        return Err(RateSelectionError::NoRates);
    }

    let preferred = normalize_carrier_preference(preferred_carrier);
    let candidates = rates.iter().filter(|rate| {
        preferred.map(|carrier| rate.carrier.eq_ignore_ascii_case(carrier)).unwrap_or(true)
    });

    candidates
        .min_by(|left, right| {
            left.cost
                .cmp(&right.cost)
                .then_with(|| {
                    left.delivery_days
                        .unwrap_or(u32::MAX)
                        .cmp(&right.delivery_days.unwrap_or(u32::MAX))
                })
                .then_with(|| left.service.cmp(&right.service))
        })
        .ok_or_else(|| {
            let mut available: Vec<String> = rates.iter().map(|rate| rate.carrier.clone()).collect();
            available.sort();
            available.dedup();
            RateSelectionError::PreferredCarrierUnavailable {
                carrier: preferred.unwrap_or_default().to_string(),
                available,
            }
        })
}
