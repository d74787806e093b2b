pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use bulkship_core::config::{
    AppConfig, CarrierMode, ConfigOverrides, DimensionPolicyKind, LoadOptions, LogFormat,
};
use bulkship_core::parsing::parse_weight_oz;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use crate::commands::batch::BatchArgs;
use crate::commands::customs::CustomsArgs;

#[derive(Debug, Parser)]
#[command(
    name = "bulkship",
    about = "Bulk shipment orchestration",
    long_about = "Parse spreadsheet rows or free text into shipments, quote them in bulk, and buy labels.",
    after_help = "Examples:\n  bulkship validate orders.tsv\n  bulkship quote orders.tsv > quotes.json\n  bulkship buy quotes.json\n  bulkship ship --carrier-mode sandbox orders.tsv\n  bulkship doctor --json"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Config file (defaults to ./bulkship.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Log level: trace|debug|info|warn|error")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Log format: compact|pretty|json")]
    log_format: Option<LogFormat>,
    #[arg(long, global = true, help = "Provider mode: http|sandbox")]
    carrier_mode: Option<CarrierMode>,
    #[arg(long, global = true, help = "Maximum in-flight provider workflows")]
    concurrency: Option<usize>,
    #[arg(long, global = true, help = "Missing dimensions: strict|lenient")]
    dimension_policy: Option<DimensionPolicyKind>,
}

impl GlobalArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                carrier_mode: self.carrier_mode,
                api_key: None,
                base_url: None,
                max_concurrency: self.concurrency,
                dimension_policy: self.dimension_policy,
                log_level: self.log_level.clone(),
                log_format: self.log_format,
            },
        }
    }
}

#[derive(Debug, Args)]
struct BatchInput {
    #[arg(help = "Input file, or `-` for stdin")]
    input: PathBuf,
    #[arg(long, help = "Write a JSON progress line to stderr after every chunk")]
    progress: bool,
}

impl BatchInput {
    fn args(&self) -> BatchArgs {
        BatchArgs { progress: self.progress }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Parse and validate a batch without calling the provider")]
    Validate {
        #[arg(help = "Input file, or `-` for stdin")]
        input: PathBuf,
    },
    #[command(about = "Show the customs declaration inferred from a contents description")]
    Customs {
        #[arg(long)]
        contents: String,
        #[arg(long, value_parser = parse_weight, help = "Parcel weight, e.g. `2 lb` or `20oz`")]
        weight: f64,
        #[arg(long, help = "Declared total value in USD")]
        value: Option<Decimal>,
        #[arg(long, help = "Compliance code (ITN) for declarations at or above $2,500")]
        code: Option<String>,
    },
    #[command(about = "Create shipments and collect rates; nothing is bought")]
    Quote(BatchInput),
    #[command(about = "Quote and buy a label for every valid line")]
    Ship(BatchInput),
    #[command(about = "Buy labels for purchase requests saved from `quote`")]
    Buy(BatchInput),
    #[command(about = "Inspect effective configuration with source attribution and redaction")]
    Config,
    #[command(about = "Validate config, warehouse addresses and provider readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

fn parse_weight(value: &str) -> Result<f64, String> {
    parse_weight_oz(value).map_err(|error| error.to_string())
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.global.load_options();
    init_logging(&options);

    let result = match cli.command {
        Command::Validate { input } => commands::validate::run(&options, &input),
        Command::Customs { contents, weight, value, code } => commands::customs::run(
            &options,
            CustomsArgs {
                contents,
                weight_oz: weight,
                declared_value: value,
                compliance_code: code,
            },
        ),
        Command::Quote(batch) => commands::batch::quote(&options, &batch.input, batch.args()),
        Command::Ship(batch) => commands::batch::ship(&options, &batch.input, batch.args()),
        Command::Buy(batch) => commands::batch::buy(&options, &batch.input, batch.args()),
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single JSON document. `RUST_LOG` wins
/// over the configured level.
fn init_logging(options: &LoadOptions) {
    let logging = AppConfig::load(options.clone()).map(|config| config.logging).ok();
    let level = logging
        .as_ref()
        .map(|logging| logging.level.clone())
        .or_else(|| options.overrides.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    let format = logging
        .map(|logging| logging.format)
        .or(options.overrides.log_format)
        .unwrap_or(LogFormat::Compact);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
