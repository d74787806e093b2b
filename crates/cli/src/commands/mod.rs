pub mod batch;
pub mod config;
pub mod customs;
pub mod doctor;
pub mod validate;

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Context;
use bulkship_core::config::{AppConfig, ConfigError, LoadOptions};
use serde::Serialize;
use serde_json::Value;

pub const EXIT_OK: u8 = 0;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_INPUT: u8 = 4;
pub const EXIT_BATCH: u8 = 5;
pub const EXIT_COMPLIANCE: u8 = 6;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            report: None,
        };
        Self { exit_code: EXIT_OK, output: serialize_payload(payload) }
    }

    /// A finished command whose structured result goes under `report`.
    pub fn report(
        command: &str,
        message: impl Into<String>,
        report: &impl Serialize,
        exit_code: u8,
    ) -> Self {
        let report = match serde_json::to_value(report) {
            Ok(report) => report,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), EXIT_RUNTIME)
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: if exit_code == EXIT_OK { "ok" } else { "error" }.to_string(),
            error_class: (exit_code != EXIT_OK).then(|| "batch_failure".to_string()),
            message: message.into(),
            report: Some(report),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            report: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn config_failure(command: &str, error: &ConfigError) -> Self {
        Self::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str, options: &LoadOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options.clone()).map_err(|error| CommandResult::config_failure(command, &error))
}

/// Reads a file, or standard input when the path is `-`.
pub(crate) fn read_input(command: &str, path: &Path) -> Result<String, CommandResult> {
    read_source(path).map_err(|error| {
        CommandResult::failure(command, "input_read", format!("{error:#}"), EXIT_INPUT)
    })
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).context("could not read standard input")?;
        return Ok(buffer);
    }

    fs::read_to_string(path).with_context(|| format!("could not read `{}`", path.display()))
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            EXIT_RUNTIME,
        )
    })
}
