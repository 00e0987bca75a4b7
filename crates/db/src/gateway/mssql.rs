use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{Client, ColumnData, Config, FromSql, SqlBrowser};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use super::{Dialect, GatewayError, ResultSet, SqlGateway};
use crate::connection::ConnectionSpec;

type TdsClient = Client<Compat<TcpStream>>;

/// SQL Server over TDS. One connection is opened on first use and reused;
/// any failure drops it so the next call reconnects.
pub struct MssqlGateway {
    spec: ConnectionSpec,
    table: String,
    connect_timeout: Duration,
    client: Mutex<Option<TdsClient>>,
}

impl MssqlGateway {
    pub fn new(spec: ConnectionSpec, table: impl Into<String>, connect_timeout: Duration) -> Self {
        Self { spec, table: table.into(), connect_timeout, client: Mutex::new(None) }
    }

    pub fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }

    async fn connect(&self) -> Result<TdsClient, GatewayError> {
        let config = Config::from_ado_string(&self.spec.ado_string())
            .map_err(|error| GatewayError::Connect(error.to_string()))?;

        debug!(
            event_name = "querybot.gateway.connect",
            server = %self.spec.server,
            database = %self.spec.database,
            "opening SQL Server connection"
        );

        // Resolves `HOST\INSTANCE` through the SQL Browser service.
        let tcp = tokio::time::timeout(self.connect_timeout, TcpStream::connect_named(&config))
            .await
            .map_err(|_| GatewayError::Timeout(self.connect_timeout))?
            .map_err(|error| GatewayError::Connect(error.to_string()))?;
        tcp.set_nodelay(true).map_err(|error| GatewayError::Connect(error.to_string()))?;

        tokio::time::timeout(self.connect_timeout, Client::connect(config, tcp.compat_write()))
            .await
            .map_err(|_| GatewayError::Timeout(self.connect_timeout))?
            .map_err(|error| GatewayError::Connect(error.to_string()))
    }
}

#[async_trait]
impl SqlGateway for MssqlGateway {
    fn dialect(&self) -> Dialect {
        Dialect::TSql
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn run(&self, sql: &str) -> Result<ResultSet, GatewayError> {
        let mut slot = self.client.lock().await;
        let mut client = match slot.take() {
            Some(client) => client,
            None => self.connect().await?,
        };

        let result = run_query(&mut client, sql).await;
        match &result {
            Ok(_) => *slot = Some(client),
            Err(error) => {
                warn!(
                    event_name = "querybot.gateway.connection_dropped",
                    error = %error,
                    "discarding SQL Server connection after failure"
                );
            }
        }
        result
    }
}

async fn run_query(client: &mut TdsClient, sql: &str) -> Result<ResultSet, GatewayError> {
    let mut stream =
        client.simple_query(sql).await.map_err(|error| GatewayError::Query(tds_message(&error)))?;

    let columns = stream
        .columns()
        .await
        .map_err(|error| GatewayError::Query(tds_message(&error)))?
        .map(|columns| columns.iter().map(|column| column.name().to_string()).collect())
        .unwrap_or_default();

    let rows = stream
        .into_first_result()
        .await
        .map_err(|error| GatewayError::Query(tds_message(&error)))?;

    let rows = rows
        .into_iter()
        .map(|row| row.into_iter().map(|cell| render_cell(&cell)).collect())
        .collect();

    Ok(ResultSet { columns, rows })
}

fn tds_message(error: &tiberius::error::Error) -> String {
    match error {
        tiberius::error::Error::Server(token) => token.message().to_string(),
        other => other.to_string(),
    }
}

fn render_cell(data: &ColumnData<'static>) -> Option<String> {
    match data {
        ColumnData::U8(value) => value.as_ref().map(ToString::to_string),
        ColumnData::I16(value) => value.as_ref().map(ToString::to_string),
        ColumnData::I32(value) => value.as_ref().map(ToString::to_string),
        ColumnData::I64(value) => value.as_ref().map(ToString::to_string),
        ColumnData::F32(value) => value.as_ref().map(ToString::to_string),
        ColumnData::F64(value) => value.as_ref().map(ToString::to_string),
        ColumnData::Bit(value) => value.as_ref().map(ToString::to_string),
        ColumnData::String(value) => value.as_ref().map(|text| text.to_string()),
        ColumnData::Guid(value) => value.as_ref().map(ToString::to_string),
        ColumnData::Numeric(value) => value.as_ref().map(ToString::to_string),
        ColumnData::Binary(value) => {
            value.as_ref().map(|bytes| format!("<{} bytes>", bytes.len()))
        }
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            chrono_cell::<NaiveDateTime>(data)
        }
        ColumnData::Date(_) => chrono_cell::<NaiveDate>(data),
        ColumnData::Time(_) => chrono_cell::<NaiveTime>(data),
        ColumnData::DateTimeOffset(_) => chrono_cell::<DateTime<FixedOffset>>(data),
        other => Some(format!("{other:?}")),
    }
}

fn chrono_cell<'a, T>(data: &'a ColumnData<'static>) -> Option<String>
where
    T: FromSql<'a> + std::fmt::Display,
{
    match T::from_sql(data) {
        Ok(value) => value.map(|value| value.to_string()),
        Err(_) => Some(format!("{data:?}")),
    }
}
