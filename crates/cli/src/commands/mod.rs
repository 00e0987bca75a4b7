pub mod ask;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;

use querybot_core::config::{AppConfig, DatabaseConfig, LoadOptions, ValidationScope};
use querybot_db::{connect_with_settings, DbPool};
use serde::Serialize;
use tokio::runtime::Runtime;

/// `(error_class, message, exit_code)` carried out of a command's async block.
pub(crate) type Failure = (&'static str, String, u8);

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
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Plain text output for human callers; the exit code stays zero.
    pub fn text(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
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
        };
        Self { exit_code, output: serialize_payload(payload) }
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

pub(crate) fn load_config(
    command: &str,
    scope: ValidationScope,
) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions { scope, ..LoadOptions::default() }).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Opens the local SQLite store at `database.url`, whatever the backend.
pub(crate) async fn open_local_store(database: &DatabaseConfig) -> Result<DbPool, Failure> {
    connect_with_settings(&database.url, database.max_connections, database.timeout_secs)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))
}
