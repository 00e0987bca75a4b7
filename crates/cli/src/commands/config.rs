use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use querybot_core::config::{AppConfig, DatabaseBackend, LoadOptions};
use querybot_db::ConnectionSpec;
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let database = &config.database;
    let llm = &config.llm;
    let entries = vec![
        entry(
            "database.backend",
            format!("{:?}", database.backend),
            &["QUERYBOT_DATABASE_BACKEND"],
        ),
        entry(
            "database.server",
            or_unset(&database.server),
            &["QUERYBOT_DATABASE_SERVER", "DB_SERVER"],
        ),
        entry(
            "database.name",
            or_unset(&database.name),
            &["QUERYBOT_DATABASE_NAME", "DB_NAME"],
        ),
        entry("database.driver", database.driver.clone(), &["QUERYBOT_DATABASE_DRIVER"]),
        entry(
            "database.trusted_connection",
            database.trusted_connection.to_string(),
            &["QUERYBOT_DATABASE_TRUSTED_CONNECTION"],
        ),
        entry(
            "database.trust_server_certificate",
            database.trust_server_certificate.to_string(),
            &["QUERYBOT_DATABASE_TRUST_SERVER_CERTIFICATE"],
        ),
        entry(
            "database.username",
            database.username.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["QUERYBOT_DATABASE_USERNAME"],
        ),
        entry(
            "database.password",
            redact_secret(database.password.as_ref()),
            &["QUERYBOT_DATABASE_PASSWORD"],
        ),
        entry("database.url", database.url.clone(), &["QUERYBOT_DATABASE_URL"]),
        entry("database.table", database.table.clone(), &["QUERYBOT_DATABASE_TABLE"]),
        entry(
            "database.max_connections",
            database.max_connections.to_string(),
            &["QUERYBOT_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            database.timeout_secs.to_string(),
            &["QUERYBOT_DATABASE_TIMEOUT_SECS"],
        ),
        entry("llm.provider", format!("{:?}", llm.provider), &["QUERYBOT_LLM_PROVIDER"]),
        entry(
            "llm.api_key",
            redact_secret(llm.api_key.as_ref()),
            &["QUERYBOT_LLM_API_KEY", "GEMINI_API_KEY"],
        ),
        entry(
            "llm.base_url",
            llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["QUERYBOT_LLM_BASE_URL"],
        ),
        entry("llm.model", llm.model.clone(), &["QUERYBOT_LLM_MODEL"]),
        entry("llm.temperature", llm.temperature.to_string(), &["QUERYBOT_LLM_TEMPERATURE"]),
        entry("llm.timeout_secs", llm.timeout_secs.to_string(), &["QUERYBOT_LLM_TIMEOUT_SECS"]),
        entry(
            "agent.max_iterations",
            config.agent.max_iterations.to_string(),
            &["QUERYBOT_AGENT_MAX_ITERATIONS"],
        ),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["QUERYBOT_LOGGING_LEVEL", "QUERYBOT_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["QUERYBOT_LOGGING_FORMAT", "QUERYBOT_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .into_iter()
            .map(|(key, value, env_keys)| render_line(key, &value, source(key, env_keys))),
    );

    if database.backend == DatabaseBackend::Mssql {
        lines.push(format!(
            "- connection string = {}",
            ConnectionSpec::from_config(database).redacted()
        ));
    }

    lines.join("\n")
}

fn entry(
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
) -> (&'static str, String, &'static [&'static str]) {
    (key, value, env_keys)
}

fn or_unset(value: &str) -> String {
    if value.trim().is_empty() {
        "<unset>".to_string()
    } else {
        value.to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("querybot.toml"), PathBuf::from("config/querybot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
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
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
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

/// Keeps a four-character prefix of long secrets so keys can be told apart.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.chars().count() > 12 {
        let prefix: String = trimmed.chars().take(4).collect();
        return format!("{prefix}***");
    }
    "<redacted>".to_string()
}
