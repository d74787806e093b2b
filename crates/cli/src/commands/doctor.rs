use bulkship_carrier::gateway_from_config;
use bulkship_core::config::{AppConfig, CarrierMode, LoadOptions};
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_OK};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CHECKS_AFTER_CONFIG: [&str; 3] = ["ship_from_address", "carrier_credentials", "carrier_client"];

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Fail { EXIT_CONFIG } else { EXIT_OK };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_ship_from(&config));
            checks.push(check_credentials(&config));
            checks.push(check_client(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.extend(CHECKS_AFTER_CONFIG.into_iter().map(|name| {
                DoctorCheck::skipped(name, "skipped because configuration did not load")
            }));
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let (overall_status, summary) = if any_failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else {
        (CheckStatus::Pass, "doctor: ready to ship")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_ship_from(config: &AppConfig) -> DoctorCheck {
    match config.ship_from.require_complete() {
        Ok(()) => DoctorCheck::pass(
            "ship_from_address",
            format!(
                "default warehouse plus {} origin override(s)",
                config.ship_from.by_origin.len()
            ),
        ),
        Err(error) => DoctorCheck::fail("ship_from_address", error.to_string()),
    }
}

fn check_credentials(config: &AppConfig) -> DoctorCheck {
    if config.carrier.mode == CarrierMode::Sandbox {
        return DoctorCheck::skipped("carrier_credentials", "sandbox mode needs no API key");
    }

    match config.carrier.require_credentials() {
        Ok(_) => DoctorCheck::pass("carrier_credentials", "API key present"),
        Err(error) => DoctorCheck::fail("carrier_credentials", error.to_string()),
    }
}

fn check_client(config: &AppConfig) -> DoctorCheck {
    match gateway_from_config(config) {
        Ok(_) => DoctorCheck::pass(
            "carrier_client",
            format!("{} gateway for `{}`", config.carrier.mode.as_str(), config.carrier.base_url),
        ),
        Err(error) => DoctorCheck::fail("carrier_client", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
