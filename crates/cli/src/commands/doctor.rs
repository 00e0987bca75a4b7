use querybot_agent::build_client;
use querybot_core::config::{AppConfig, DatabaseBackend, LlmProvider, LoadOptions};
use querybot_db::connect_gateway;
use serde::Serialize;

use crate::commands::CommandResult;

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

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exit code is 0 when every check passes and 6 otherwise.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 6 };

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

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => vec![
            DoctorCheck::pass("config_validation", "configuration loaded and validated"),
            check_model_credentials(&config),
            check_database_connectivity(&config),
        ],
        Err(error) => vec![
            DoctorCheck::fail("config_validation", error.to_string()),
            DoctorCheck::skipped("model_credentials"),
            DoctorCheck::skipped("database_connectivity"),
        ],
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_model_credentials(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "model_credentials";

    if let Err(error) = build_client(&config.llm) {
        return DoctorCheck::fail(NAME, error.to_string());
    }

    match config.llm.provider {
        LlmProvider::Ollama => DoctorCheck::pass(
            NAME,
            format!("ollama at `{}` needs no API key", config.llm.base_url.as_deref().unwrap_or("")),
        ),
        provider if config.llm.api_key().is_some() => {
            DoctorCheck::pass(NAME, format!("API key configured for {provider:?}"))
        }
        provider => DoctorCheck::fail(
            NAME,
            format!(
                "no API key configured for {provider:?}; set QUERYBOT_LLM_API_KEY or GEMINI_API_KEY"
            ),
        ),
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "database_connectivity";

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::fail(NAME, format!("failed to initialize async runtime: {error}"));
        }
    };

    let result = runtime.block_on(async {
        let gateway = connect_gateway(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        gateway.run("SELECT 1").await.map_err(|error| format!("`SELECT 1` failed: {error}"))?;
        Ok::<(), String>(())
    });

    let target = match config.database.backend {
        DatabaseBackend::Mssql => {
            format!("{}/{}", config.database.server, config.database.name)
        }
        DatabaseBackend::Sqlite => config.database.url.clone(),
    };

    match result {
        Ok(()) => DoctorCheck::pass(NAME, format!("`SELECT 1` succeeded against `{target}`")),
        Err(error) => DoctorCheck::fail(NAME, error),
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
