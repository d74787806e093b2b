use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use bulkship_core::config::{resolve_config_path, AppConfig, ConfigOverrides, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult, EXIT_OK};

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
    overridden: bool,
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys, overridden: false }
    }

    fn flag(mut self, overridden: bool) -> Self {
        self.overridden = overridden;
        self
    }
}

/// Prints every effective setting with the layer it came from.
pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let file_path = resolve_config_path(options.config_path.as_deref());
    let file_doc = load_config_file_doc(file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in fields(&config, &options.overrides) {
        let source = if field.overridden {
            "flag".to_string()
        } else {
            field_source(field.key, field.env_keys, file_doc.as_ref(), file_path.as_deref())
        };
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: EXIT_OK, output: lines.join("\n") }
}

fn fields(config: &AppConfig, overrides: &ConfigOverrides) -> Vec<Field> {
    let carrier = &config.carrier;
    let bulk = &config.bulk;
    let customs = &config.customs;
    let api_key = carrier
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let accounts = if carrier.carrier_accounts.is_empty() {
        "<all>".to_string()
    } else {
        carrier.carrier_accounts.join(",")
    };
    let ship_from = &config.ship_from.default;
    let ship_from_summary = if ship_from.street1.is_empty() {
        "<unset>".to_string()
    } else {
        format!("{}, {}, {} {}", ship_from.name, ship_from.city, ship_from.state, ship_from.zip)
    };
    let origins = if config.ship_from.by_origin.is_empty() {
        "<none>".to_string()
    } else {
        config.ship_from.by_origin.keys().cloned().collect::<Vec<_>>().join(",")
    };

    vec![
        Field::new("carrier.mode", carrier.mode.as_str(), &["BULKSHIP_CARRIER_MODE"])
            .flag(overrides.carrier_mode.is_some()),
        Field::new("carrier.api_key", api_key, &["BULKSHIP_CARRIER_API_KEY"])
            .flag(overrides.api_key.is_some()),
        Field::new("carrier.base_url", carrier.base_url.clone(), &["BULKSHIP_CARRIER_BASE_URL"])
            .flag(overrides.base_url.is_some()),
        Field::new("carrier.carrier_accounts", accounts, &["BULKSHIP_CARRIER_ACCOUNTS"]),
        Field::new(
            "carrier.timeout_secs",
            carrier.timeout_secs.to_string(),
            &["BULKSHIP_CARRIER_TIMEOUT_SECS"],
        ),
        Field::new(
            "bulk.max_concurrency",
            bulk.max_concurrency.to_string(),
            &["BULKSHIP_BULK_MAX_CONCURRENCY"],
        )
        .flag(overrides.max_concurrency.is_some()),
        Field::new(
            "bulk.progress_step_percent",
            bulk.progress_step_percent.to_string(),
            &["BULKSHIP_BULK_PROGRESS_STEP_PERCENT"],
        ),
        Field::new(
            "bulk.quote_timeout_secs",
            bulk.quote_timeout_secs.to_string(),
            &["BULKSHIP_BULK_QUOTE_TIMEOUT_SECS"],
        ),
        Field::new(
            "bulk.create_timeout_secs",
            bulk.create_timeout_secs.to_string(),
            &["BULKSHIP_BULK_CREATE_TIMEOUT_SECS"],
        ),
        Field::new(
            "bulk.purchase_timeout_secs",
            bulk.purchase_timeout_secs.to_string(),
            &["BULKSHIP_BULK_PURCHASE_TIMEOUT_SECS"],
        ),
        Field::new(
            "bulk.retry_attempts",
            bulk.retry_attempts.to_string(),
            &["BULKSHIP_BULK_RETRY_ATTEMPTS"],
        ),
        Field::new(
            "bulk.retry_base_delay_ms",
            bulk.retry_base_delay_ms.to_string(),
            &["BULKSHIP_BULK_RETRY_BASE_DELAY_MS"],
        ),
        Field::new("bulk.retry_max_jitter_ms", bulk.retry_max_jitter_ms.to_string(), &[]),
        Field::new(
            "bulk.blocking_workers",
            bulk.blocking_workers.to_string(),
            &["BULKSHIP_BULK_BLOCKING_WORKERS"],
        ),
        Field::new("customs.signer", customs.signer.clone(), &["BULKSHIP_CUSTOMS_SIGNER"]),
        Field::new(
            "customs.origin_country",
            customs.origin_country.clone(),
            &["BULKSHIP_CUSTOMS_ORIGIN_COUNTRY"],
        ),
        Field::new("customs.automatic_code", customs.automatic_code.clone(), &[]),
        Field::new("customs.contents_type", customs.contents_type.as_str(), &[]),
        Field::new("customs.non_delivery_option", customs.non_delivery_option.clone(), &[]),
        Field::new(
            "parsing.dimension_policy",
            format!("{:?}", config.parsing.dimension_policy).to_lowercase(),
            &["BULKSHIP_PARSING_DIMENSION_POLICY"],
        )
        .flag(overrides.dimension_policy.is_some()),
        Field::new("ship_from.default", ship_from_summary, &[]),
        Field::new("ship_from.by_origin", origins, &[]),
        Field::new(
            "logging.level",
            config.logging.level.clone(),
            &["BULKSHIP_LOGGING_LEVEL", "BULKSHIP_LOG_LEVEL"],
        )
        .flag(overrides.log_level.is_some()),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["BULKSHIP_LOGGING_FORMAT", "BULKSHIP_LOG_FORMAT"],
        )
        .flag(overrides.log_format.is_some()),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the key family prefix (`EZTK`, `sk_test`) and hides the rest.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.rsplit_once('_') {
        return format!("{prefix}_***");
    }

    match trimmed.get(..4) {
        Some(prefix) if trimmed.len() > 8 => format!("{prefix}***"),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_key};

    #[test]
    fn redaction_keeps_only_the_key_family() {
        assert_eq!(redact_key("sk_test_abcdef"), "sk_test_***");
        assert_eq!(redact_key("EZTK1234567890abcdef"), "EZTK***");
        assert_eq!(redact_key("short"), "<redacted>");
        assert_eq!(redact_key("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: Value = "[bulk]\nmax_concurrency = 4\n".parse().expect("toml");
        assert!(contains_path(&doc, "bulk.max_concurrency"));
        assert!(!contains_path(&doc, "bulk.retry_attempts"));
        assert!(!contains_path(&doc, "carrier.mode"));
    }
}
