use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TABLE: &str = "AACountyexcel";
pub const DEFAULT_ODBC_DRIVER: &str = "ODBC Driver 18 for SQL Server";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub server: String,
    pub name: String,
    pub driver: String,
    pub trusted_connection: bool,
    pub trust_server_certificate: bool,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub url: String,
    pub table: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_iterations: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseBackend {
    Mssql,
    Sqlite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
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
    pub database_backend: Option<DatabaseBackend>,
    pub database_server: Option<String>,
    pub database_name: Option<String>,
    pub database_url: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub agent_max_iterations: Option<u32>,
    pub log_level: Option<String>,
}

/// How much of the database section must be usable after loading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationScope {
    /// The configured backend must be fully specified.
    #[default]
    Full,
    /// Only the local SQLite store at `database.url` is needed; SQL Server
    /// settings may be absent.
    LocalStore,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
    pub scope: ValidationScope,
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
            database: DatabaseConfig {
                backend: DatabaseBackend::Mssql,
                server: String::new(),
                name: String::new(),
                driver: DEFAULT_ODBC_DRIVER.to_string(),
                trusted_connection: true,
                trust_server_certificate: true,
                username: None,
                password: None,
                url: "sqlite://querybot.db?mode=rwc".to_string(),
                table: DEFAULT_TABLE.to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                base_url: None,
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.0,
                timeout_secs: 60,
            },
            agent: AgentConfig { max_iterations: 15 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for DatabaseBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mssql" | "sqlserver" => Ok(Self::Mssql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::Validation(format!(
                "unsupported database backend `{other}` (expected mssql|sqlite)"
            ))),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected gemini|openai|ollama)"
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("querybot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate_for(options.scope)?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(backend) = database.backend {
                self.database.backend = backend;
            }
            if let Some(server) = database.server {
                self.database.server = server;
            }
            if let Some(name) = database.name {
                self.database.name = name;
            }
            if let Some(driver) = database.driver {
                self.database.driver = driver;
            }
            if let Some(trusted_connection) = database.trusted_connection {
                self.database.trusted_connection = trusted_connection;
            }
            if let Some(trust_server_certificate) = database.trust_server_certificate {
                self.database.trust_server_certificate = trust_server_certificate;
            }
            if let Some(username) = database.username {
                self.database.username = Some(username);
            }
            if let Some(password) = database.password {
                self.database.password = Some(secret_value(password));
            }
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(table) = database.table {
                self.database.table = table;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_iterations) = agent.max_iterations {
                self.agent.max_iterations = max_iterations;
            }
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
        if let Some(value) = read_env("QUERYBOT_DATABASE_BACKEND") {
            self.database.backend = value.parse()?;
        }
        // DB_SERVER / DB_NAME are the names existing deployments already export.
        if let Some(value) = read_env("QUERYBOT_DATABASE_SERVER").or_else(|| read_env("DB_SERVER"))
        {
            self.database.server = value;
        }
        if let Some(value) = read_env("QUERYBOT_DATABASE_NAME").or_else(|| read_env("DB_NAME")) {
            self.database.name = value;
        }
        if let Some(value) = read_env("QUERYBOT_DATABASE_DRIVER") {
            self.database.driver = value;
        }
        if let Some(value) = read_env("QUERYBOT_DATABASE_TRUSTED_CONNECTION") {
            self.database.trusted_connection =
                parse_bool("QUERYBOT_DATABASE_TRUSTED_CONNECTION", &value)?;
        }
        if let Some(value) = read_env("QUERYBOT_DATABASE_TRUST_SERVER_CERTIFICATE") {
            self.database.trust_server_certificate =
                parse_bool("QUERYBOT_DATABASE_TRUST_SERVER_CERTIFICATE", &value)?;
        }
        if let Some(value) = read_env("QUERYBOT_DATABASE_USERNAME") {
            self.database.username = Some(value);
        }
        if let Some(value) = read_env("QUERYBOT_DATABASE_PASSWORD") {
            self.database.password = Some(secret_value(value));
        }
        if let Some(value) = read_env("QUERYBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("QUERYBOT_DATABASE_TABLE") {
            self.database.table = value;
        }
        if let Some(value) = read_env("QUERYBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("QUERYBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("QUERYBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("QUERYBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("QUERYBOT_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("QUERYBOT_LLM_API_KEY").or_else(|| {
            (self.llm.provider == LlmProvider::Gemini).then(|| read_env("GEMINI_API_KEY")).flatten()
        });
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("QUERYBOT_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("QUERYBOT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("QUERYBOT_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("QUERYBOT_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("QUERYBOT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("QUERYBOT_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("QUERYBOT_AGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = parse_u32("QUERYBOT_AGENT_MAX_ITERATIONS", &value)?;
        }

        let log_level =
            read_env("QUERYBOT_LOGGING_LEVEL").or_else(|| read_env("QUERYBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("QUERYBOT_LOGGING_FORMAT").or_else(|| read_env("QUERYBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(backend) = overrides.database_backend {
            self.database.backend = backend;
        }
        if let Some(server) = overrides.database_server {
            self.database.server = server;
        }
        if let Some(name) = overrides.database_name {
            self.database.name = name;
        }
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(max_iterations) = overrides.agent_max_iterations {
            self.agent.max_iterations = max_iterations;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_for(ValidationScope::Full)
    }

    pub fn validate_for(&self, scope: ValidationScope) -> Result<(), ConfigError> {
        match scope {
            ValidationScope::Full => validate_database(&self.database)?,
            ValidationScope::LocalStore => validate_local_store(&self.database)?,
        }
        validate_llm(&self.llm)?;
        validate_agent(&self.agent)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl LlmConfig {
    /// API key with surrounding whitespace removed; `None` when unset or blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().trim())
            .filter(|key| !key.is_empty())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("querybot.toml"), PathBuf::from("config/querybot.toml")]
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    match database.backend {
        DatabaseBackend::Mssql => {
            if database.server.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "database.server is required for the mssql backend (set DB_SERVER, e.g. `HOST\\INSTANCE`)"
                        .to_string(),
                ));
            }
            if database.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "database.name is required for the mssql backend (set DB_NAME)".to_string(),
                ));
            }
            if database.username.is_some() != database.password.is_some() {
                return Err(ConfigError::Validation(
                    "database.username and database.password must be set together".to_string(),
                ));
            }
        }
        DatabaseBackend::Sqlite => validate_sqlite_url(&database.url)?,
    }

    validate_pool_settings(database)
}

fn validate_local_store(database: &DatabaseConfig) -> Result<(), ConfigError> {
    validate_sqlite_url(&database.url)?;
    validate_pool_settings(database)
}

fn validate_sqlite_url(url: &str) -> Result<(), ConfigError> {
    let url = url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_pool_settings(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let table = database.table.trim();
    if table.is_empty() || table.contains(['[', ']']) {
        return Err(ConfigError::Validation(
            "database.table must be a bare table name without brackets".to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    // A missing api key is reported by the client on first use, not here.
    if llm.provider == LlmProvider::Ollama {
        let missing = llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.base_url is required for ollama provider".to_string(),
            ));
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_iterations == 0 || agent.max_iterations > 50 {
        return Err(ConfigError::Validation(
            "agent.max_iterations must be in range 1..=50".to_string(),
        ));
    }
    Ok(())
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

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    agent: Option<AgentPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    backend: Option<DatabaseBackend>,
    server: Option<String>,
    name: Option<String>,
    driver: Option<String>,
    trusted_connection: Option<bool>,
    trust_server_certificate: Option<bool>,
    username: Option<String>,
    password: Option<String>,
    url: Option<String>,
    table: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_iterations: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, DatabaseBackend, LlmProvider, LoadOptions,
        LogFormat, ValidationScope,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const TOUCHED_VARS: &[&str] = &[
        "DB_SERVER",
        "DB_NAME",
        "GEMINI_API_KEY",
        "QUERYBOT_DATABASE_SERVER",
        "QUERYBOT_DATABASE_NAME",
        "QUERYBOT_DATABASE_BACKEND",
        "QUERYBOT_DATABASE_URL",
        "QUERYBOT_LLM_PROVIDER",
        "QUERYBOT_LLM_API_KEY",
        "QUERYBOT_LOG_LEVEL",
        "QUERYBOT_LOG_FORMAT",
        "TEST_QUERYBOT_SERVER",
        "TEST_QUERYBOT_KEY",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars() {
        for var in TOUCHED_VARS {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        env::set_var("TEST_QUERYBOT_SERVER", "EPAZZ2\\inspections");
        env::set_var("TEST_QUERYBOT_KEY", "gemini-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("querybot.toml");
            fs::write(
                &path,
                r#"
[database]
server = "${TEST_QUERYBOT_SERVER}"
name = "AAcounty"

[llm]
api_key = "${TEST_QUERYBOT_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.server == "EPAZZ2\\inspections",
                "server should be interpolated from the environment",
            )?;
            ensure(
                config.llm.api_key() == Some("gemini-from-env"),
                "api key should be interpolated from the environment",
            )?;
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn deployment_env_names_are_honored() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        env::set_var("DB_SERVER", "EPAZZ2\\saifu");
        env::set_var("DB_NAME", "AAcounty");
        env::set_var("GEMINI_API_KEY", "gm-test-key");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.database.server == "EPAZZ2\\saifu", "DB_SERVER should set the server")?;
            ensure(config.database.name == "AAcounty", "DB_NAME should set the database")?;
            ensure(config.llm.provider == LlmProvider::Gemini, "gemini is the default provider")?;
            ensure(config.llm.api_key() == Some("gm-test-key"), "GEMINI_API_KEY should apply")?;
            ensure(config.database.table == "AACountyexcel", "default table is AACountyexcel")?;
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn prefixed_env_names_win_over_deployment_names() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        env::set_var("DB_SERVER", "legacy-host");
        env::set_var("QUERYBOT_DATABASE_SERVER", "primary-host");
        env::set_var("DB_NAME", "AAcounty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.database.server == "primary-host", "prefixed server should win")
        })();

        clear_vars();
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        env::set_var("QUERYBOT_DATABASE_BACKEND", "sqlite");
        env::set_var("QUERYBOT_DATABASE_URL", "sqlite::memory:");
        env::set_var("QUERYBOT_LOG_LEVEL", "warn");
        env::set_var("QUERYBOT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            ensure(
                config.database.backend == DatabaseBackend::Sqlite,
                "backend should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        env::set_var("QUERYBOT_DATABASE_NAME", "from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("querybot.toml");
            fs::write(
                &path,
                r#"
[database]
server = "file-host"
name = "from-file"

[llm]
model = "gemini-1.5-flash"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_server: Some("override-host".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.database.server == "override-host", "override server should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.database.name == "from-env", "env database name should beat the file")?;
            ensure(config.llm.model == "gemini-1.5-flash", "file model should beat the default")?;
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        env::set_var("DB_NAME", "AAcounty");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("database.server")
            );
            ensure(has_message, "validation failure should mention database.server")
        })();

        clear_vars();
        result
    }

    #[test]
    fn local_store_scope_ignores_missing_server_settings() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        env::set_var("QUERYBOT_DATABASE_URL", "sqlite::memory:");

        let result = (|| -> Result<(), String> {
            ensure(
                AppConfig::load(LoadOptions::default()).is_err(),
                "full validation should still require database.server",
            )?;

            let config = AppConfig::load(LoadOptions {
                scope: ValidationScope::LocalStore,
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.database.backend == DatabaseBackend::Mssql, "backend stays mssql")?;
            ensure(config.database.server.is_empty(), "server stays unset")?;
            ensure(config.database.url == "sqlite::memory:", "url comes from the environment")
        })();

        clear_vars();
        result
    }

    #[test]
    fn local_store_scope_still_rejects_non_sqlite_url() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        env::set_var("QUERYBOT_DATABASE_URL", "postgres://localhost/aacounty");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions {
                scope: ValidationScope::LocalStore,
                ..LoadOptions::default()
            }) {
                Ok(_) => return Err("expected a sqlite url failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("database.url")
                ),
                "failure should name database.url",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn missing_api_key_is_not_a_startup_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    database_server: Some("localhost".to_string()),
                    database_name: Some("AAcounty".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.llm.api_key().is_none(), "api key should be unset")
        })();

        clear_vars();
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        env::set_var("QUERYBOT_LLM_API_KEY", "gm-secret-value");
        env::set_var("DB_SERVER", "localhost");
        env::set_var("DB_NAME", "AAcounty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("gm-secret-value"), "debug output should not contain api key")?;
            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string())
                    == Some("gm-secret-value".to_string()),
                "api key should still be readable through expose_secret",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars();
        result
    }
}
