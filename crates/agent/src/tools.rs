use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use querybot_core::sanitize::sanitize_sql;
use querybot_core::schema::SchemaContext;
use querybot_db::SqlGateway;
use tracing::{debug, warn};

use crate::guardrails::{GuardrailDecision, GuardrailPolicy};

pub const SQL_DB_QUERY: &str = "sql_db_query";
pub const SQL_DB_SCHEMA: &str = "sql_db_schema";

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, input: &str) -> Result<String>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry holding the query and schema tools for one gateway.
    pub fn for_gateway(gateway: Arc<dyn SqlGateway>, schema: SchemaContext) -> Self {
        let mut registry = Self::default();
        registry.register(SqlQueryTool::new(gateway, GuardrailPolicy::default()));
        registry.register(SqlSchemaTool::new(schema));
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name.trim()).map(|tool| tool.as_ref())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// `name: description` lines for the system prompt.
    pub fn describe(&self) -> String {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| format!("{}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Runs a statement and returns the rendered rows. Database errors come back
/// as an `Error: ...` observation so the model can correct itself.
pub struct SqlQueryTool {
    gateway: Arc<dyn SqlGateway>,
    guardrails: GuardrailPolicy,
}

impl SqlQueryTool {
    pub fn new(gateway: Arc<dyn SqlGateway>, guardrails: GuardrailPolicy) -> Self {
        Self { gateway, guardrails }
    }
}

#[async_trait]
impl Tool for SqlQueryTool {
    fn name(&self) -> &'static str {
        SQL_DB_QUERY
    }

    fn description(&self) -> &'static str {
        "Input is a single SELECT statement. Output is the result rows, one per line, \
         or an error message. If the query is wrong, rewrite it and try again."
    }

    async fn execute(&self, input: &str) -> Result<String> {
        let sql = sanitize_sql(input);
        if let GuardrailDecision::Deny { reason_code, user_message } = self.guardrails.evaluate(&sql)
        {
            debug!(event_name = "querybot.agent.tool_denied", reason_code, "statement refused");
            return Ok(format!("Error: {user_message}"));
        }

        match self.gateway.run(&sql).await {
            Ok(result) => Ok(result.to_text()),
            Err(error) => {
                warn!(
                    event_name = "querybot.agent.tool_query_failed",
                    error = %error,
                    "agent query failed"
                );
                Ok(format!("Error: {error}"))
            }
        }
    }
}

/// Returns the column hints for the one queryable table.
pub struct SqlSchemaTool {
    schema: SchemaContext,
}

impl SqlSchemaTool {
    pub fn new(schema: SchemaContext) -> Self {
        Self { schema }
    }
}

#[async_trait]
impl Tool for SqlSchemaTool {
    fn name(&self) -> &'static str {
        SQL_DB_SCHEMA
    }

    fn description(&self) -> &'static str {
        "Input is a table name. Output is the column list of that table with a short \
         description of each column."
    }

    async fn execute(&self, input: &str) -> Result<String> {
        let requested: Vec<&str> = input
            .split(',')
            .map(|name| name.trim().trim_matches(['[', ']', '"', '\'']).trim())
            .filter(|name| !name.is_empty())
            .collect();

        if let Some(unknown) =
            requested.iter().find(|name| !name.eq_ignore_ascii_case(self.schema.table()))
        {
            return Ok(format!(
                "Error: table {unknown} not found. Only {} is available.",
                self.schema.quoted_table()
            ));
        }

        Ok(format!("Table {}:\n{}", self.schema.quoted_table(), self.schema.table_info()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use querybot_core::schema::SchemaContext;
    use querybot_db::{Dialect, GatewayError, ResultSet, SqlGateway};

    use super::{Tool, ToolRegistry, SQL_DB_QUERY, SQL_DB_SCHEMA};

    #[derive(Default)]
    struct RecordingGateway {
        statements: Mutex<Vec<String>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl SqlGateway for RecordingGateway {
        fn dialect(&self) -> Dialect {
            Dialect::TSql
        }

        fn table(&self) -> &str {
            "AACountyexcel"
        }

        async fn run(&self, sql: &str) -> Result<ResultSet, GatewayError> {
            self.statements.lock().expect("lock").push(sql.to_string());
            if let Some(message) = &self.fail_with {
                return Err(GatewayError::Query(message.clone()));
            }
            Ok(ResultSet {
                columns: vec!["FSF NAME".to_string()],
                rows: vec![vec![Some("RIVA FOOD MARKET".to_string())]],
            })
        }
    }

    fn registry(gateway: Arc<RecordingGateway>) -> ToolRegistry {
        ToolRegistry::for_gateway(gateway, SchemaContext::for_table("AACountyexcel"))
    }

    #[test]
    fn registry_lists_tools_in_name_order() {
        let registry = registry(Arc::new(RecordingGateway::default()));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec![SQL_DB_QUERY, SQL_DB_SCHEMA]);
        assert!(registry.describe().starts_with("sql_db_query: Input is a single SELECT"));
        assert!(registry.get(" sql_db_schema ").is_some());
        assert!(registry.get("sql_db_list_tables").is_none());
    }

    #[tokio::test]
    async fn query_tool_runs_sanitized_select() {
        let gateway = Arc::new(RecordingGateway::default());
        let registry = registry(gateway.clone());
        let tool = registry.get(SQL_DB_QUERY).expect("query tool");

        let output = tool
            .execute("```sql\nSELECT [FSF NAME] FROM [AACountyexcel]\n```")
            .await
            .expect("execute");

        assert_eq!(output, "FSF NAME\nRIVA FOOD MARKET");
        assert_eq!(
            gateway.statements.lock().expect("lock").as_slice(),
            ["SELECT [FSF NAME] FROM [AACountyexcel]".to_string()]
        );
    }

    #[tokio::test]
    async fn query_tool_refuses_writes_without_touching_database() {
        let gateway = Arc::new(RecordingGateway::default());
        let registry = registry(gateway.clone());
        let tool = registry.get(SQL_DB_QUERY).expect("query tool");

        let output = tool.execute("DELETE FROM [AACountyexcel]").await.expect("execute");

        assert!(output.starts_with("Error: Only SELECT statements"));
        assert!(gateway.statements.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn query_tool_reports_database_error_as_observation() {
        let gateway = Arc::new(RecordingGateway {
            fail_with: Some("Invalid column name 'FSF NAM'.".to_string()),
            ..RecordingGateway::default()
        });
        let registry = registry(gateway);
        let tool = registry.get(SQL_DB_QUERY).expect("query tool");

        let output =
            tool.execute("SELECT [FSF NAM] FROM [AACountyexcel]").await.expect("execute");
        assert_eq!(output, "Error: Invalid column name 'FSF NAM'.");
    }

    #[tokio::test]
    async fn schema_tool_describes_only_the_allowed_table() {
        let registry = registry(Arc::new(RecordingGateway::default()));
        let tool = registry.get(SQL_DB_SCHEMA).expect("schema tool");

        let schema = tool.execute("[AACountyexcel]").await.expect("execute");
        assert!(schema.starts_with("Table [AACountyexcel]:\n[FSF#] -> "));
        assert!(schema.contains("[FSF NAME] -> "));

        let empty_input = tool.execute("").await.expect("execute");
        assert_eq!(empty_input, schema);

        let other = tool.execute("inspections").await.expect("execute");
        assert_eq!(other, "Error: table inspections not found. Only [AACountyexcel] is available.");
    }
}
