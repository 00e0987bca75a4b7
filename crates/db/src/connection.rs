use std::fmt;
use std::time::Duration;

use querybot_core::config::DatabaseConfig;
use secrecy::{ExposeSecret, SecretString};
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    // Every connection to `:memory:` opens a separate database.
    let in_memory = database_url.contains(":memory:");
    let max_connections = if in_memory { 1 } else { max_connections.max(1) };

    let mut options = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)));
    if in_memory {
        options = options.idle_timeout(None).max_lifetime(None);
    }

    options
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

pub struct SqlCredentials {
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for SqlCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to reach the SQL Server instance that holds the
/// facility table. Values are not validated here; bad hosts or names
/// surface when the gateway first connects.
#[derive(Debug)]
pub struct ConnectionSpec {
    pub server: String,
    pub database: String,
    pub driver: String,
    pub trusted_connection: bool,
    pub trust_server_certificate: bool,
    pub credentials: Option<SqlCredentials>,
}

impl ConnectionSpec {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        let credentials = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                Some(SqlCredentials { username: username.clone(), password: password.clone() })
            }
            _ => None,
        };

        Self {
            server: config.server.trim().to_string(),
            database: config.name.trim().to_string(),
            driver: config.driver.clone(),
            trusted_connection: config.trusted_connection,
            trust_server_certificate: config.trust_server_certificate,
            credentials,
        }
    }

    /// ODBC connection string, e.g.
    /// `Driver={ODBC Driver 18 for SQL Server};Server=HOST\INST;Database=DB;Trusted_Connection=yes;TrustServerCertificate=yes;`
    pub fn odbc_string(&self) -> String {
        self.render_odbc(|password| password.expose_secret().to_string())
    }

    /// The ODBC string with any password masked.
    pub fn redacted(&self) -> String {
        self.render_odbc(|_| "***".to_string())
    }

    fn render_odbc(&self, password: impl Fn(&SecretString) -> String) -> String {
        let mut out = format!(
            "Driver={};Server={};Database={};",
            odbc_value(&format!("{{{}}}", self.driver.trim_matches(['{', '}']))),
            odbc_value(&self.server),
            odbc_value(&self.database),
        );
        match &self.credentials {
            Some(credentials) => {
                out.push_str(&format!(
                    "UID={};PWD={};",
                    odbc_value(&credentials.username),
                    odbc_value(&password(&credentials.password))
                ));
            }
            None => {
                out.push_str(&format!("Trusted_Connection={};", yes_no(self.trusted_connection)));
            }
        }
        out.push_str(&format!(
            "TrustServerCertificate={};",
            yes_no(self.trust_server_certificate)
        ));
        out
    }

    /// ADO.NET form understood by the native TDS client. The ODBC driver
    /// name has no meaning there and is left out.
    pub fn ado_string(&self) -> String {
        let mut out =
            format!("Server={};Database={};", ado_value(&self.server), ado_value(&self.database));
        match &self.credentials {
            Some(credentials) => {
                out.push_str(&format!(
                    "User Id={};Password={};",
                    ado_value(&credentials.username),
                    ado_value(credentials.password.expose_secret())
                ));
            }
            None if self.trusted_connection => out.push_str("Integrated Security=SSPI;"),
            None => {}
        }
        out.push_str(&format!(
            "TrustServerCertificate={};",
            if self.trust_server_certificate { "true" } else { "false" }
        ));
        out
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn odbc_value(value: &str) -> String {
    if value.starts_with('{') && value.ends_with('}') {
        return value.to_string();
    }
    if value.contains([';', '{', '}']) || value != value.trim() {
        return format!("{{{}}}", value.replace('}', "}}"));
    }
    value.to_string()
}

fn ado_value(value: &str) -> String {
    if value.contains([';', '"', '\'']) || value != value.trim() {
        return format!("\"{}\"", value.replace('"', "\"\""));
    }
    value.to_string()
}
