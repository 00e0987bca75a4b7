use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use querybot_core::config::{DatabaseBackend, DatabaseConfig};
use serde::Serialize;
use thiserror::Error;

use crate::connection::{connect_with_settings, ConnectionSpec};

pub mod mssql;
pub mod sqlite;

pub use mssql::MssqlGateway;
pub use sqlite::SqliteGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("database connection failed: {0}")]
    Connect(String),
    #[error("timed out after {0:?} connecting to the database")]
    Timeout(Duration),
    #[error("{0}")]
    Query(String),
    #[error("could not read column `{column}`: {message}")]
    Decode { column: String, message: String },
}

impl GatewayError {
    /// Connectivity failures, as opposed to the statement itself being rejected.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    TSql,
    Sqlite,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TSql => "mssql",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Rows returned by one statement. Cells are rendered to text; SQL NULL is `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Plain-text rendering handed to the agent and the summarizer: a header
    /// line of column names, then one ` | `-separated line per row.
    pub fn to_text(&self) -> String {
        if self.rows.is_empty() {
            return "(no rows)".to_string();
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        if !self.columns.is_empty() {
            lines.push(self.columns.join(" | "));
        }
        for row in &self.rows {
            let cells: Vec<&str> =
                row.iter().map(|cell| cell.as_deref().unwrap_or("NULL")).collect();
            lines.push(cells.join(" | "));
        }
        lines.join("\n")
    }
}

/// Executes raw SQL text against the facility database.
#[async_trait]
pub trait SqlGateway: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Unquoted name of the one table the assistant may read.
    fn table(&self) -> &str;

    async fn run(&self, sql: &str) -> Result<ResultSet, GatewayError>;
}

/// Builds the gateway for the configured backend. SQL Server connects lazily
/// on the first query; SQLite opens its pool here.
pub async fn connect_gateway(
    config: &DatabaseConfig,
) -> Result<Arc<dyn SqlGateway>, GatewayError> {
    match config.backend {
        DatabaseBackend::Mssql => Ok(Arc::new(MssqlGateway::new(
            ConnectionSpec::from_config(config),
            config.table.clone(),
            Duration::from_secs(config.timeout_secs),
        ))),
        DatabaseBackend::Sqlite => {
            let pool =
                connect_with_settings(&config.url, config.max_connections, config.timeout_secs)
                    .await
                    .map_err(|error| GatewayError::Connect(error.to_string()))?;
            Ok(Arc::new(SqliteGateway::new(pool, config.table.clone())))
        }
    }
}
