use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::{Dialect, GatewayError, ResultSet, SqlGateway};
use crate::connection::DbPool;

/// Local stand-in for the county server. SQLite accepts `[bracketed]`
/// identifiers, so generated T-SQL that sticks to plain SELECTs runs unchanged.
pub struct SqliteGateway {
    pool: DbPool,
    table: String,
}

impl SqliteGateway {
    pub fn new(pool: DbPool, table: impl Into<String>) -> Self {
        Self { pool, table: table.into() }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl SqlGateway for SqliteGateway {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn run(&self, sql: &str) -> Result<ResultSet, GatewayError> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await.map_err(|error| match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                GatewayError::Connect(error.to_string())
            }
            sqlx::Error::Database(db) => GatewayError::Query(db.message().to_string()),
            other => GatewayError::Query(other.to_string()),
        })?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|column| column.name().to_string()).collect())
            .unwrap_or_default();

        let mut rendered = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cells = Vec::with_capacity(row.len());
            for index in 0..row.len() {
                cells.push(render_cell(row, index).map_err(|error| GatewayError::Decode {
                    column: row.column(index).name().to_string(),
                    message: error.to_string(),
                })?);
            }
            rendered.push(cells);
        }

        Ok(ResultSet { columns, rows: rendered })
    }
}

fn render_cell(row: &SqliteRow, index: usize) -> Result<Option<String>, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(None);
    }

    // Storage class of the value itself, not the declared column type.
    let storage = raw.type_info().name().to_ascii_uppercase();
    let text = match storage.as_str() {
        "INTEGER" => row.try_get::<i64, _>(index)?.to_string(),
        "REAL" => row.try_get::<f64, _>(index)?.to_string(),
        "BLOB" => format!("<{} bytes>", row.try_get::<Vec<u8>, _>(index)?.len()),
        _ => row.try_get::<String, _>(index)?,
    };
    Ok(Some(text))
}
