use std::sync::Arc;

use querybot_core::errors::ApplicationError;
use querybot_core::sanitize::{classify, OutputClass};
use querybot_core::schema::SchemaContext;
use querybot_db::SqlGateway;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm::{LlmClient, LlmError};
use crate::runtime::{AgentError, QueryAgent};
use crate::summarizer::Summarizer;
use crate::tools::ToolRegistry;

/// Non-SQL agent output longer than this is shown as a summary, shorter
/// output as a warning.
pub const PASS_THROUGH_MIN_CHARS: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    Summarized { sql: String, summary: String },
    ExecutionFailed { sql: String, reason: String },
    PassThrough { text: String },
    Warning { text: String },
}

impl QueryOutcome {
    pub fn render(&self) -> String {
        match self {
            Self::Summarized { summary, .. } => format!("Summary:\n{summary}"),
            Self::ExecutionFailed { sql, reason } => {
                format!("Error executing SQL: {reason}\nAttempted query: {sql}")
            }
            Self::PassThrough { text } => format!("Summary:\n{text}"),
            Self::Warning { text } => {
                format!("Warning: the agent did not produce a SQL query: {text}")
            }
        }
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Summarized { sql, .. } | Self::ExecutionFailed { sql, .. } => Some(sql),
            Self::PassThrough { .. } | Self::Warning { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Summarized { .. } => "summarized",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::PassThrough { .. } => "pass_through",
            Self::Warning { .. } => "warning",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("query agent failed: {0}")]
    Agent(#[from] AgentError),
    #[error("summarizer failed: {0}")]
    Summarizer(#[source] LlmError),
}

impl From<PipelineError> for ApplicationError {
    fn from(error: PipelineError) -> Self {
        let message = error.to_string();
        match error {
            PipelineError::Agent(AgentError::Llm(LlmError::Config(_)))
            | PipelineError::Summarizer(LlmError::Config(_)) => Self::Configuration(message),
            PipelineError::Agent(_) | PipelineError::Summarizer(_) => Self::Integration(message),
        }
    }
}

/// Question in, user-facing outcome out: agent, classify, execute, summarize.
pub struct QueryBot {
    agent: QueryAgent,
    gateway: Arc<dyn SqlGateway>,
    summarizer: Summarizer,
}

impl QueryBot {
    pub fn new(agent: QueryAgent, gateway: Arc<dyn SqlGateway>, summarizer: Summarizer) -> Self {
        Self { agent, gateway, summarizer }
    }

    /// Wires agent, tools, and summarizer around one model client and one
    /// gateway.
    pub fn assemble(
        llm: Arc<dyn LlmClient>,
        gateway: Arc<dyn SqlGateway>,
        max_iterations: u32,
    ) -> Self {
        let schema = SchemaContext::for_table(gateway.table());
        let tools = ToolRegistry::for_gateway(gateway.clone(), schema.clone());
        let agent = QueryAgent::new(llm.clone(), tools, schema, max_iterations);
        Self::new(agent, gateway, Summarizer::new(llm))
    }

    pub async fn query_and_summarize(&self, question: &str) -> Result<QueryOutcome, PipelineError> {
        self.query_with_correlation(question, &Uuid::new_v4().to_string()).await
    }

    /// Same as [`QueryBot::query_and_summarize`] with a caller-chosen
    /// correlation id, so failures can be reported against it.
    pub async fn query_with_correlation(
        &self,
        question: &str,
        correlation_id: &str,
    ) -> Result<QueryOutcome, PipelineError> {
        info!(
            event_name = "querybot.pipeline.started",
            correlation_id = %correlation_id,
            question = %question,
            "handling question"
        );

        let agent_output = self.agent.invoke(question).await.map_err(|error| {
            warn!(
                event_name = "querybot.pipeline.agent_failed",
                correlation_id = %correlation_id,
                error = %error,
                "query agent failed"
            );
            PipelineError::from(error)
        })?;

        let outcome = match classify(&agent_output.output) {
            OutputClass::Sql(sql) => self.execute_and_summarize(correlation_id, sql).await?,
            OutputClass::Prose(text) if text.chars().count() > PASS_THROUGH_MIN_CHARS => {
                QueryOutcome::PassThrough { text }
            }
            OutputClass::Prose(text) => QueryOutcome::Warning { text },
        };

        info!(
            event_name = "querybot.pipeline.completed",
            correlation_id = %correlation_id,
            outcome = outcome.kind(),
            agent_steps = agent_output.steps.len(),
            "question handled"
        );
        Ok(outcome)
    }

    async fn execute_and_summarize(
        &self,
        correlation_id: &str,
        sql: String,
    ) -> Result<QueryOutcome, PipelineError> {
        info!(
            event_name = "querybot.pipeline.executing",
            correlation_id = %correlation_id,
            dialect = self.gateway.dialect().as_str(),
            sql = %sql,
            "running generated query"
        );

        let result = match self.gateway.run(&sql).await {
            Ok(result) => result,
            Err(error) => {
                warn!(
                    event_name = "querybot.pipeline.execution_failed",
                    correlation_id = %correlation_id,
                    connectivity = error.is_connectivity(),
                    error = %error,
                    "generated query failed"
                );
                return Ok(QueryOutcome::ExecutionFailed { sql, reason: error.to_string() });
            }
        };

        info!(
            event_name = "querybot.pipeline.executed",
            correlation_id = %correlation_id,
            rows = result.row_count(),
            "generated query returned"
        );

        let summary =
            self.summarizer.summarize(&result.to_text()).await.map_err(PipelineError::Summarizer)?;
        Ok(QueryOutcome::Summarized { sql, summary })
    }
}
