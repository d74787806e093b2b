use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::customs::ContentsType;
use crate::domain::intent::Dimensions;
use crate::parsing::units::{MAX_INCHES, MIN_INCHES};
use crate::parsing::DimensionPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "bulkship.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub carrier: CarrierConfig,
    pub bulk: BulkConfig,
    pub customs: CustomsConfig,
    pub parsing: ParsingConfig,
    pub ship_from: ShipFromConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct CarrierConfig {
    pub mode: CarrierMode,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub carrier_accounts: Vec<String>,
    pub timeout_secs: u64,
}

/// Engine tuning: concurrency, per-call budgets and rate-limit retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkConfig {
    pub max_concurrency: usize,
    pub progress_step_percent: u8,
    pub quote_timeout_secs: u64,
    pub create_timeout_secs: u64,
    pub purchase_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_jitter_ms: u64,
    pub blocking_workers: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomsConfig {
    pub signer: String,
    pub origin_country: String,
    pub automatic_code: String,
    pub contents_type: ContentsType,
    pub restriction_type: String,
    pub non_delivery_option: String,
    pub certified: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParsingConfig {
    pub dimension_policy: DimensionPolicyKind,
    pub default_box: Dimensions,
}

/// Warehouse addresses. `by_origin` is keyed by the upper-cased origin hint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipFromConfig {
    #[serde(default)]
    pub default: ShipFromAddress,
    #[serde(default)]
    pub by_origin: BTreeMap<String, ShipFromAddress>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipFromAddress {
    #[serde(default)]
    pub name: String,
    pub company: Option<String>,
    #[serde(default)]
    pub street1: String,
    pub street2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default = "default_country")]
    pub country: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierMode {
    Http,
    Sandbox,
}

impl CarrierMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Sandbox => "sandbox",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionPolicyKind {
    Strict,
    Lenient,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub carrier_mode: Option<CarrierMode>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_concurrency: Option<usize>,
    pub dimension_policy: Option<DimensionPolicyKind>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            carrier: CarrierConfig {
                mode: CarrierMode::Http,
                api_key: None,
                base_url: "https://api.easypost.com/v2".to_string(),
                carrier_accounts: Vec::new(),
                timeout_secs: 30,
            },
            bulk: BulkConfig::default(),
            customs: CustomsConfig::default(),
            parsing: ParsingConfig {
                dimension_policy: DimensionPolicyKind::Strict,
                default_box: Dimensions { length: 12.0, width: 10.0, height: 4.0 },
            },
            ship_from: ShipFromConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            progress_step_percent: 5,
            quote_timeout_secs: 20,
            create_timeout_secs: 45,
            purchase_timeout_secs: 60,
            retry_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_jitter_ms: 1_000,
            blocking_workers: 4,
        }
    }
}

impl BulkConfig {
    pub fn quote_timeout(&self) -> Duration {
        Duration::from_secs(self.quote_timeout_secs)
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    pub fn purchase_timeout(&self) -> Duration {
        Duration::from_secs(self.purchase_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_jitter(&self) -> Duration {
        Duration::from_millis(self.retry_max_jitter_ms)
    }
}

impl Default for CustomsConfig {
    fn default() -> Self {
        Self {
            signer: "Shipping Department".to_string(),
            origin_country: "US".to_string(),
            automatic_code: "NOEEI 30.37(a)".to_string(),
            contents_type: ContentsType::Merchandise,
            restriction_type: "none".to_string(),
            non_delivery_option: "return".to_string(),
            certified: true,
        }
    }
}

impl ParsingConfig {
    pub fn policy(&self) -> DimensionPolicy {
        match self.dimension_policy {
            DimensionPolicyKind::Strict => DimensionPolicy::Strict,
            DimensionPolicyKind::Lenient => DimensionPolicy::Lenient { default: self.default_box },
        }
    }
}

impl CarrierConfig {
    /// The API key, required only by commands that reach the provider.
    pub fn require_credentials(&self) -> Result<&SecretString, ConfigError> {
        match &self.api_key {
            Some(key) if !key.expose_secret().trim().is_empty() => Ok(key),
            _ => Err(ConfigError::Validation(
                "carrier.api_key is required for provider calls. Set BULKSHIP_CARRIER_API_KEY or \
                 `[carrier] api_key` in bulkship.toml, or use `mode = \"sandbox\"`"
                    .to_string(),
            )),
        }
    }
}

impl ShipFromConfig {
    /// Address for an origin hint, falling back to the default warehouse.
    pub fn resolve(&self, origin_hint: Option<&str>) -> &ShipFromAddress {
        origin_hint
            .map(|hint| hint.trim().to_ascii_uppercase())
            .and_then(|hint| self.by_origin.get(&hint))
            .unwrap_or(&self.default)
    }

    /// Fails unless every configured warehouse is complete enough to ship from.
    pub fn require_complete(&self) -> Result<(), ConfigError> {
        validate_ship_from("ship_from.default", &self.default)?;
        for (key, address) in &self.by_origin {
            validate_ship_from(&format!("ship_from.by_origin.{key}"), address)?;
        }
        Ok(())
    }
}

fn default_country() -> String {
    "US".to_string()
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for CarrierMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "sandbox" => Ok(Self::Sandbox),
            other => Err(ConfigError::Validation(format!(
                "unsupported carrier mode `{other}` (expected http|sandbox)"
            ))),
        }
    }
}

impl std::str::FromStr for DimensionPolicyKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(ConfigError::Validation(format!(
                "unsupported dimension policy `{other}` (expected strict|lenient)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(carrier) = patch.carrier {
            if let Some(mode) = carrier.mode {
                self.carrier.mode = mode;
            }
            if let Some(api_key) = carrier.api_key {
                self.carrier.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = carrier.base_url {
                self.carrier.base_url = base_url;
            }
            if let Some(carrier_accounts) = carrier.carrier_accounts {
                self.carrier.carrier_accounts = carrier_accounts;
            }
            if let Some(timeout_secs) = carrier.timeout_secs {
                self.carrier.timeout_secs = timeout_secs;
            }
        }

        if let Some(bulk) = patch.bulk {
            if let Some(max_concurrency) = bulk.max_concurrency {
                self.bulk.max_concurrency = max_concurrency;
            }
            if let Some(progress_step_percent) = bulk.progress_step_percent {
                self.bulk.progress_step_percent = progress_step_percent;
            }
            if let Some(quote_timeout_secs) = bulk.quote_timeout_secs {
                self.bulk.quote_timeout_secs = quote_timeout_secs;
            }
            if let Some(create_timeout_secs) = bulk.create_timeout_secs {
                self.bulk.create_timeout_secs = create_timeout_secs;
            }
            if let Some(purchase_timeout_secs) = bulk.purchase_timeout_secs {
                self.bulk.purchase_timeout_secs = purchase_timeout_secs;
            }
            if let Some(retry_attempts) = bulk.retry_attempts {
                self.bulk.retry_attempts = retry_attempts;
            }
            if let Some(retry_base_delay_ms) = bulk.retry_base_delay_ms {
                self.bulk.retry_base_delay_ms = retry_base_delay_ms;
            }
            if let Some(retry_max_jitter_ms) = bulk.retry_max_jitter_ms {
                self.bulk.retry_max_jitter_ms = retry_max_jitter_ms;
            }
            if let Some(blocking_workers) = bulk.blocking_workers {
                self.bulk.blocking_workers = blocking_workers;
            }
        }

        if let Some(customs) = patch.customs {
            if let Some(signer) = customs.signer {
                self.customs.signer = signer;
            }
            if let Some(origin_country) = customs.origin_country {
                self.customs.origin_country = origin_country;
            }
            if let Some(automatic_code) = customs.automatic_code {
                self.customs.automatic_code = automatic_code;
            }
            if let Some(contents_type) = customs.contents_type {
                self.customs.contents_type = contents_type;
            }
            if let Some(restriction_type) = customs.restriction_type {
                self.customs.restriction_type = restriction_type;
            }
            if let Some(non_delivery_option) = customs.non_delivery_option {
                self.customs.non_delivery_option = non_delivery_option;
            }
            if let Some(certified) = customs.certified {
                self.customs.certified = certified;
            }
        }

        if let Some(parsing) = patch.parsing {
            if let Some(dimension_policy) = parsing.dimension_policy {
                self.parsing.dimension_policy = dimension_policy;
            }
            if let Some(default_box) = parsing.default_box {
                self.parsing.default_box = default_box;
            }
        }

        if let Some(ship_from) = patch.ship_from {
            self.ship_from = ShipFromConfig {
                default: ship_from.default,
                by_origin: ship_from
                    .by_origin
                    .into_iter()
                    .map(|(hint, address)| (hint.trim().to_ascii_uppercase(), address))
                    .collect(),
            };
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BULKSHIP_CARRIER_MODE") {
            self.carrier.mode = value.parse()?;
        }
        if let Some(value) = read_env("BULKSHIP_CARRIER_API_KEY") {
            self.carrier.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("BULKSHIP_CARRIER_BASE_URL") {
            self.carrier.base_url = value;
        }
        if let Some(value) = read_env("BULKSHIP_CARRIER_ACCOUNTS") {
            self.carrier.carrier_accounts = value
                .split(',')
                .map(str::trim)
                .filter(|account| !account.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = read_env("BULKSHIP_CARRIER_TIMEOUT_SECS") {
            self.carrier.timeout_secs = parse_u64("BULKSHIP_CARRIER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BULKSHIP_BULK_MAX_CONCURRENCY") {
            self.bulk.max_concurrency = parse_usize("BULKSHIP_BULK_MAX_CONCURRENCY", &value)?;
        }
        if let Some(value) = read_env("BULKSHIP_BULK_PROGRESS_STEP_PERCENT") {
            self.bulk.progress_step_percent =
                parse_u8("BULKSHIP_BULK_PROGRESS_STEP_PERCENT", &value)?;
        }
        if let Some(value) = read_env("BULKSHIP_BULK_QUOTE_TIMEOUT_SECS") {
            self.bulk.quote_timeout_secs = parse_u64("BULKSHIP_BULK_QUOTE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("BULKSHIP_BULK_CREATE_TIMEOUT_SECS") {
            self.bulk.create_timeout_secs =
                parse_u64("BULKSHIP_BULK_CREATE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("BULKSHIP_BULK_PURCHASE_TIMEOUT_SECS") {
            self.bulk.purchase_timeout_secs =
                parse_u64("BULKSHIP_BULK_PURCHASE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("BULKSHIP_BULK_RETRY_ATTEMPTS") {
            self.bulk.retry_attempts = parse_u32("BULKSHIP_BULK_RETRY_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("BULKSHIP_BULK_RETRY_BASE_DELAY_MS") {
            self.bulk.retry_base_delay_ms =
                parse_u64("BULKSHIP_BULK_RETRY_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("BULKSHIP_BULK_BLOCKING_WORKERS") {
            self.bulk.blocking_workers = parse_usize("BULKSHIP_BULK_BLOCKING_WORKERS", &value)?;
        }

        if let Some(value) = read_env("BULKSHIP_CUSTOMS_SIGNER") {
            self.customs.signer = value;
        }
        if let Some(value) = read_env("BULKSHIP_CUSTOMS_ORIGIN_COUNTRY") {
            self.customs.origin_country = value;
        }

        if let Some(value) = read_env("BULKSHIP_PARSING_DIMENSION_POLICY") {
            self.parsing.dimension_policy = value.parse()?;
        }

        let log_level =
            read_env("BULKSHIP_LOGGING_LEVEL").or_else(|| read_env("BULKSHIP_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BULKSHIP_LOGGING_FORMAT").or_else(|| read_env("BULKSHIP_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(mode) = overrides.carrier_mode {
            self.carrier.mode = mode;
        }
        if let Some(api_key) = overrides.api_key {
            self.carrier.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.base_url {
            self.carrier.base_url = base_url;
        }
        if let Some(max_concurrency) = overrides.max_concurrency {
            self.bulk.max_concurrency = max_concurrency;
        }
        if let Some(dimension_policy) = overrides.dimension_policy {
            self.parsing.dimension_policy = dimension_policy;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_carrier(&self.carrier)?;
        validate_bulk(&self.bulk)?;
        validate_customs(&self.customs)?;
        validate_parsing(&self.parsing)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file `load` would read: an existing explicit path, else the first default found.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config/bulkship.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_carrier(carrier: &CarrierConfig) -> Result<(), ConfigError> {
    let base_url = carrier.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "carrier.base_url must start with http:// or https://".to_string(),
        ));
    }

    if carrier.timeout_secs == 0 || carrier.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "carrier.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_bulk(bulk: &BulkConfig) -> Result<(), ConfigError> {
    if bulk.max_concurrency == 0 || bulk.max_concurrency > 64 {
        return Err(ConfigError::Validation(
            "bulk.max_concurrency must be in range 1..=64".to_string(),
        ));
    }

    if bulk.progress_step_percent == 0 || bulk.progress_step_percent > 100 {
        return Err(ConfigError::Validation(
            "bulk.progress_step_percent must be in range 1..=100".to_string(),
        ));
    }

    if bulk.quote_timeout_secs == 0 || bulk.create_timeout_secs == 0 || bulk.purchase_timeout_secs == 0
    {
        return Err(ConfigError::Validation(
            "bulk.quote_timeout_secs, bulk.create_timeout_secs and bulk.purchase_timeout_secs must be greater than zero"
                .to_string(),
        ));
    }

    if bulk.quote_timeout_secs > bulk.create_timeout_secs {
        return Err(ConfigError::Validation(format!(
            "bulk.quote_timeout_secs ({}) must not exceed bulk.create_timeout_secs ({})",
            bulk.quote_timeout_secs, bulk.create_timeout_secs
        )));
    }

    if bulk.retry_attempts > 10 {
        return Err(ConfigError::Validation(
            "bulk.retry_attempts must be in range 0..=10".to_string(),
        ));
    }

    if bulk.blocking_workers == 0 {
        return Err(ConfigError::Validation(
            "bulk.blocking_workers must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_customs(customs: &CustomsConfig) -> Result<(), ConfigError> {
    if customs.signer.trim().is_empty() {
        return Err(ConfigError::Validation("customs.signer is required".to_string()));
    }

    let origin = customs.origin_country.trim();
    if origin.len() != 2 || !origin.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(format!(
            "customs.origin_country must be a two-letter upper-case ISO code, got `{origin}`"
        )));
    }

    if customs.automatic_code.trim().is_empty() {
        return Err(ConfigError::Validation("customs.automatic_code is required".to_string()));
    }

    Ok(())
}

fn validate_parsing(parsing: &ParsingConfig) -> Result<(), ConfigError> {
    let sides = [parsing.default_box.length, parsing.default_box.width, parsing.default_box.height];
    if sides.iter().any(|side| !(MIN_INCHES..=MAX_INCHES).contains(side)) {
        return Err(ConfigError::Validation(format!(
            "parsing.default_box sides must be in range {MIN_INCHES}..={MAX_INCHES} inches"
        )));
    }

    Ok(())
}

fn validate_ship_from(section: &str, address: &ShipFromAddress) -> Result<(), ConfigError> {
    let required = [
        ("name", &address.name),
        ("street1", &address.street1),
        ("city", &address.city),
        ("zip", &address.zip),
        ("country", &address.country),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| *field)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    Err(ConfigError::Validation(format!(
        "{section} is incomplete; missing {}",
        missing.join(", ")
    )))
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_env(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.trim().parse::<u8>().map_err(|_| invalid_env(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_env(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_env(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_env(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    carrier: Option<CarrierPatch>,
    bulk: Option<BulkPatch>,
    customs: Option<CustomsPatch>,
    parsing: Option<ParsingPatch>,
    ship_from: Option<ShipFromConfig>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CarrierPatch {
    mode: Option<CarrierMode>,
    api_key: Option<String>,
    base_url: Option<String>,
    carrier_accounts: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BulkPatch {
    max_concurrency: Option<usize>,
    progress_step_percent: Option<u8>,
    quote_timeout_secs: Option<u64>,
    create_timeout_secs: Option<u64>,
    purchase_timeout_secs: Option<u64>,
    retry_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    retry_max_jitter_ms: Option<u64>,
    blocking_workers: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomsPatch {
    signer: Option<String>,
    origin_country: Option<String>,
    automatic_code: Option<String>,
    contents_type: Option<ContentsType>,
    restriction_type: Option<String>,
    non_delivery_option: Option<String>,
    certified: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ParsingPatch {
    dimension_policy: Option<DimensionPolicyKind>,
    default_box: Option<Dimensions>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
