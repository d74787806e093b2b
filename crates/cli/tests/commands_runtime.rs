use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use bulkship_cli::commands::batch::{self, BatchArgs};
use bulkship_cli::commands::customs::{self, CustomsArgs};
use bulkship_cli::commands::{config, doctor, validate};
use bulkship_core::config::LoadOptions;
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;

const SANDBOX_CONFIG: &str = r#"
[carrier]
mode = "sandbox"

[bulk]
max_concurrency = 2
retry_base_delay_ms = 1

[ship_from.default]
name = "Warehouse"
street1 = "500 Dock Rd"
city = "Austin"
state = "TX"
zip = "78702"
phone = "5125550100"
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(config: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("bulkship.toml"), config).expect("write config");
        Self { dir }
    }

    fn options(&self) -> LoadOptions {
        LoadOptions {
            config_path: Some(self.dir.path().join("bulkship.toml")),
            require_file: true,
            ..LoadOptions::default()
        }
    }

    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write input");
        path
    }
}

fn row(index: usize, carrier: &str, zip: &str) -> String {
    [
        "",
        carrier,
        "Ann",
        &format!("Lee{index}"),
        "",
        "",
        &format!("{index} Elm St"),
        "",
        "Austin",
        "TX",
        zip,
        "US",
        "Y",
        "10x8x4",
        "2 lb",
        "",
    ]
    .join("\t")
}

fn batch_text() -> String {
    [row(1, "", "78701"), row(2, "UPS", "78701"), row(3, "", "7870")].join("\n")
}

#[test]
fn validate_reports_valid_and_rejected_lines() {
    with_env(&[], || {
        let workspace = Workspace::new(SANDBOX_CONFIG);
        let input = workspace.file("orders.tsv", &batch_text());

        let result = validate::run(&workspace.options(), &input);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "validate");
        assert_eq!(payload["report"]["valid"], 2);
        assert_eq!(payload["report"]["rejected"], 1);
        let rejected = &payload["report"]["results"][2];
        assert_eq!(rejected["valid"], false);
        assert!(rejected["errors"][0].as_str().unwrap_or_default().contains("US ZIP"));
    });
}

#[test]
fn validate_fails_when_nothing_is_shippable() {
    with_env(&[], || {
        let workspace = Workspace::new(SANDBOX_CONFIG);
        let input = workspace.file("orders.tsv", &row(1, "", "7870"));

        let result = validate::run(&workspace.options(), &input);
        assert_eq!(result.exit_code, 5);
        assert_eq!(parse_payload(&result.output)["status"], "error");
    });
}

#[test]
fn missing_input_file_is_an_input_error() {
    with_env(&[], || {
        let workspace = Workspace::new(SANDBOX_CONFIG);
        let result = validate::run(&workspace.options(), Path::new("/nonexistent/orders.tsv"));

        assert_eq!(result.exit_code, 4);
        assert_eq!(parse_payload(&result.output)["error_class"], "input_read");
    });
}

#[test]
fn ship_buys_cheapest_or_preferred_rate_in_sandbox() {
    with_env(&[], || {
        let workspace = Workspace::new(SANDBOX_CONFIG);
        let input = workspace.file("orders.tsv", &batch_text());

        let result = batch::ship(&workspace.options(), &input, BatchArgs::default());
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        let report = &payload["report"];
        assert_eq!(report["summary"]["attempted"], 2);
        assert_eq!(report["summary"]["successful"], 2);
        assert_eq!(report["summary"]["total_cost"], "16.75");
        assert_eq!(report["outcomes"][0]["line_number"], 1);
        assert_eq!(report["outcomes"][0]["rate"]["carrier"], "USPS");
        assert_eq!(report["outcomes"][1]["rate"]["carrier"], "UPS");
        assert!(report["outcomes"][1]["tracking_code"].as_str().unwrap_or_default().starts_with("SBX"));
        assert_eq!(report["rejected"][0]["line_number"], 3);
    });
}

#[test]
fn quote_returns_rates_and_purchase_requests_without_buying() {
    with_env(&[], || {
        let workspace = Workspace::new(SANDBOX_CONFIG);
        let input = workspace.file("orders.tsv", &batch_text());

        let result = batch::quote(&workspace.options(), &input, BatchArgs::default());
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let report = &parse_payload(&result.output)["report"];
        assert_eq!(report["summary"]["mode"], "quote_only");
        assert_eq!(report["outcomes"][0]["rates"].as_array().map(Vec::len), Some(3));
        assert!(report["outcomes"][0]["tracking_code"].is_null());

        let requests = report["purchase_requests"].as_array().expect("requests");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1]["line_number"], 2);
        assert_eq!(requests[1]["preferred_carrier"], "UPS");
    });
}

#[test]
fn buy_against_unknown_shipments_fails_every_line() {
    with_env(&[], || {
        let workspace = Workspace::new(SANDBOX_CONFIG);
        let requests = workspace.file(
            "requests.json",
            r#"[{"line_number": 1, "shipment_id": "shp_elsewhere_1"},
                {"line_number": 2, "shipment_id": "shp_elsewhere_2"}]"#,
        );

        let result = batch::buy(&workspace.options(), &requests, BatchArgs::default());
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "ok");
        assert!(payload["error_class"].is_null());
        assert_eq!(payload["report"]["summary"]["successful"], 0);
        assert_eq!(payload["report"]["summary"]["failed"], 2);
        let outcomes = payload["report"]["outcomes"].as_array().expect("outcomes");
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0]["error"].as_str().unwrap_or_default().contains("not found"));
        assert_eq!(outcomes[1]["error_class"], "gateway");
    });
}

#[test]
fn buy_rejects_malformed_requests() {
    with_env(&[], || {
        let workspace = Workspace::new(SANDBOX_CONFIG);
        let requests = workspace.file("requests.json", "{\"nope\": true}");

        let result = batch::buy(&workspace.options(), &requests, BatchArgs::default());
        assert_eq!(result.exit_code, 4);
        assert_eq!(parse_payload(&result.output)["error_class"], "input_invalid");
    });
}

#[test]
fn http_mode_without_api_key_is_a_config_failure() {
    with_env(&[], || {
        let workspace = Workspace::new("[carrier]\nmode = \"http\"\n");
        let input = workspace.file("orders.tsv", &batch_text());

        let result = batch::ship(&workspace.options(), &input, BatchArgs::default());
        assert_eq!(result.exit_code, 2);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("BULKSHIP_CARRIER_API_KEY"));
    });
}

#[test]
fn customs_infers_items_and_enforces_the_export_threshold() {
    with_env(&[], || {
        let workspace = Workspace::new(SANDBOX_CONFIG);

        let result = customs::run(
            &workspace.options(),
            CustomsArgs {
                contents: "(2) Jeans HTS: 6203.42.4011 ($25 each)".to_string(),
                weight_oz: 24.0,
                declared_value: None,
                compliance_code: None,
            },
        );
        assert_eq!(result.exit_code, 0, "{}", result.output);
        let report = &parse_payload(&result.output)["report"];
        assert_eq!(report["items"][0]["quantity"], 2);
        assert_eq!(report["items"][0]["tariff_code"], "6203.42.4011");

        let result = customs::run(
            &workspace.options(),
            CustomsArgs {
                contents: "industrial camera".to_string(),
                weight_oz: 80.0,
                declared_value: Some(Decimal::new(3_000, 0)),
                compliance_code: None,
            },
        );
        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "compliance");
    });
}

#[test]
fn customs_value_too_large_to_represent_is_an_input_error() {
    with_env(&[], || {
        let workspace = Workspace::new(SANDBOX_CONFIG);

        let result = customs::run(
            &workspace.options(),
            CustomsArgs {
                contents: "(4000000000) Gold bars ($79228162514264337593543950 each)".to_string(),
                weight_oz: 32.0,
                declared_value: None,
                compliance_code: None,
            },
        );
        assert_eq!(result.exit_code, 4, "{}", result.output);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "input_invalid");
        assert!(payload["message"].as_str().unwrap_or_default().contains("too large"));
    });
}

#[test]
fn config_attributes_sources_and_redacts_the_api_key() {
    with_env(
        &[("BULKSHIP_CARRIER_API_KEY", "sk_live_secretvalue"), ("BULKSHIP_BULK_RETRY_ATTEMPTS", "5")],
        || {
            let workspace = Workspace::new(SANDBOX_CONFIG);
            let mut options = workspace.options();
            options.overrides.max_concurrency = Some(6);

            let result = config::run(&options);
            assert_eq!(result.exit_code, 0, "{}", result.output);

            let output = result.output;
            assert!(!output.contains("secretvalue"));
            assert!(output.contains("- carrier.api_key = sk_live_*** (source: env (BULKSHIP_CARRIER_API_KEY))"));
            assert!(output.contains("- carrier.mode = sandbox (source: file ("));
            assert!(output.contains("- bulk.max_concurrency = 6 (source: flag)"));
            assert!(output.contains("- bulk.retry_attempts = 5 (source: env (BULKSHIP_BULK_RETRY_ATTEMPTS))"));
            assert!(output.contains("- bulk.purchase_timeout_secs = 60 (source: default)"));
        },
    );
}

#[test]
fn doctor_passes_in_sandbox_and_skips_credentials() {
    with_env(&[], || {
        let workspace = Workspace::new(SANDBOX_CONFIG);

        let result = doctor::run(&workspace.options(), true);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let credentials = payload["checks"]
            .as_array()
            .and_then(|checks| checks.iter().find(|check| check["name"] == "carrier_credentials"))
            .expect("credentials check");
        assert_eq!(credentials["status"], "skipped");
    });
}

#[test]
fn doctor_flags_an_incomplete_warehouse() {
    with_env(&[], || {
        let workspace = Workspace::new("[carrier]\nmode = \"sandbox\"\n");

        let result = doctor::run(&workspace.options(), false);
        assert_eq!(result.exit_code, 2);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] ship_from_address:"));
        assert!(last_line(&result.output).starts_with("- [ok] carrier_client:"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "BULKSHIP_CARRIER_MODE",
        "BULKSHIP_CARRIER_API_KEY",
        "BULKSHIP_CARRIER_BASE_URL",
        "BULKSHIP_CARRIER_ACCOUNTS",
        "BULKSHIP_CARRIER_TIMEOUT_SECS",
        "BULKSHIP_BULK_MAX_CONCURRENCY",
        "BULKSHIP_BULK_PROGRESS_STEP_PERCENT",
        "BULKSHIP_BULK_QUOTE_TIMEOUT_SECS",
        "BULKSHIP_BULK_CREATE_TIMEOUT_SECS",
        "BULKSHIP_BULK_PURCHASE_TIMEOUT_SECS",
        "BULKSHIP_BULK_RETRY_ATTEMPTS",
        "BULKSHIP_BULK_RETRY_BASE_DELAY_MS",
        "BULKSHIP_BULK_BLOCKING_WORKERS",
        "BULKSHIP_CUSTOMS_SIGNER",
        "BULKSHIP_CUSTOMS_ORIGIN_COUNTRY",
        "BULKSHIP_PARSING_DIMENSION_POLICY",
        "BULKSHIP_LOGGING_LEVEL",
        "BULKSHIP_LOGGING_FORMAT",
        "BULKSHIP_LOG_LEVEL",
        "BULKSHIP_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
