use std::sync::Arc;

use querybot_core::schema::SchemaContext;
use thiserror::Error;
use tracing::{debug, info};

use crate::conversation::{parse_reply, render_scratchpad, AgentReply, AgentStep, OBSERVATION};
use crate::llm::{LlmClient, LlmError, Prompt};
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_ITERATIONS: u32 = 15;

const PROTOCOL: &str = "Use the following format:\n\n\
Question: the input question you must answer\n\
Thought: you should always think about what to do\n\
Action: the action to take, should be one of [{tool_names}]\n\
Action Input: the input to the action\n\
Observation: the result of the action\n\
... (this Thought/Action/Action Input/Observation can repeat N times)\n\
Thought: I now know the final SQL query\n\
Final Answer: the final SELECT statement only, as raw SQL text";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("agent stopped after {max_iterations} iterations without a final answer")]
    IterationLimit { max_iterations: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentOutput {
    /// Final text; not guaranteed to be SQL, fence-free, or non-empty.
    pub output: String,
    pub steps: Vec<AgentStep>,
}

/// Bounded reason-act loop that turns a question into a SELECT statement.
pub struct QueryAgent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    schema: SchemaContext,
    max_iterations: u32,
}

impl QueryAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        schema: SchemaContext,
        max_iterations: u32,
    ) -> Self {
        Self { llm, tools, schema, max_iterations: max_iterations.max(1) }
    }

    pub fn system_prompt(&self) -> String {
        let protocol = PROTOCOL.replace("{tool_names}", &self.tools.names().join(", "));
        format!(
            "{}\nYou have access to the following tools:\n\n{}\n\n{}",
            self.schema.render(),
            self.tools.describe(),
            protocol
        )
    }

    pub async fn invoke(&self, question: &str) -> Result<AgentOutput, AgentError> {
        let system = self.system_prompt();
        let mut steps: Vec<AgentStep> = Vec::new();

        for iteration in 1..=self.max_iterations {
            let prompt = Prompt::user(format!(
                "Question: {question}\n{}Thought:",
                render_scratchpad(&steps)
            ))
            .with_system(system.clone())
            .with_stop(format!("\n{OBSERVATION}"))
            .with_stop(OBSERVATION);

            let reply = self.llm.complete(&prompt).await?;

            match parse_reply(&reply) {
                AgentReply::Final { answer, .. } => {
                    info!(
                        event_name = "querybot.agent.finished",
                        iterations = iteration,
                        tool_calls = steps.len(),
                        "agent produced final answer"
                    );
                    return Ok(AgentOutput { output: answer, steps });
                }
                AgentReply::Action { thought, tool, input } => {
                    let observation = self.observe(&tool, &input).await;
                    debug!(
                        event_name = "querybot.agent.step",
                        iteration,
                        tool = %tool,
                        "tool call completed"
                    );
                    steps.push(AgentStep { thought, tool, input, observation });
                }
            }
        }

        Err(AgentError::IterationLimit { max_iterations: self.max_iterations })
    }

    async fn observe(&self, tool: &str, input: &str) -> String {
        match self.tools.get(tool) {
            Some(tool) => match tool.execute(input).await {
                Ok(observation) => observation,
                Err(error) => format!("Error: {error}"),
            },
            None => format!(
                "{tool} is not a valid tool, try one of [{}].",
                self.tools.names().join(", ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use querybot_core::schema::SchemaContext;
    use querybot_db::{Dialect, GatewayError, ResultSet, SqlGateway};

    use super::{AgentError, QueryAgent};
    use crate::llm::{LlmClient, LlmError, Prompt};
    use crate::tools::ToolRegistry;

    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<Prompt>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
            self.prompts.lock().expect("lock").push(prompt.clone());
            self.replies
                .lock()
                .expect("lock")
                .pop_front()
                .ok_or_else(|| LlmError::Http("script exhausted".to_string()))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct OneRowGateway;

    #[async_trait]
    impl SqlGateway for OneRowGateway {
        fn dialect(&self) -> Dialect {
            Dialect::TSql
        }

        fn table(&self) -> &str {
            "AACountyexcel"
        }

        async fn run(&self, _sql: &str) -> Result<ResultSet, GatewayError> {
            Ok(ResultSet {
                columns: vec!["FSF NAME".to_string(), "FSF ADDRESS".to_string()],
                rows: vec![vec![Some("RIVA FOOD MARKET".to_string()), Some("3 RIVA RD".to_string())]],
            })
        }
    }

    fn agent(llm: Arc<ScriptedLlm>, max_iterations: u32) -> QueryAgent {
        let schema = SchemaContext::for_table("AACountyexcel");
        QueryAgent::new(
            llm,
            ToolRegistry::for_gateway(Arc::new(OneRowGateway), schema.clone()),
            schema,
            max_iterations,
        )
    }

    #[tokio::test]
    async fn plain_reply_is_returned_as_output() {
        let llm = ScriptedLlm::new(&[
            "SELECT * FROM [AACountyexcel] WHERE [FSF NAME] LIKE '%Riva Food Market%'",
        ]);
        let output = agent(llm.clone(), 5)
            .invoke("Show me info for Riva Food Market.")
            .await
            .expect("invoke");

        assert_eq!(output.output, "SELECT * FROM [AACountyexcel] WHERE [FSF NAME] LIKE '%Riva Food Market%'");
        assert!(output.steps.is_empty());

        let prompts = llm.prompts.lock().expect("lock");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].user.starts_with("Question: Show me info for Riva Food Market.\n"));
        assert!(prompts[0].stop.iter().any(|stop| stop == "Observation:"));
        let system = prompts[0].system.as_deref().unwrap_or_default();
        assert!(system.contains("Only use the table [AACountyexcel]."));
        assert!(system.contains("sql_db_query: "));
    }

    #[tokio::test]
    async fn tool_observation_is_fed_back_before_final_answer() {
        let llm = ScriptedLlm::new(&[
            "Thought: check the row\nAction: sql_db_query\nAction Input: SELECT [FSF NAME], [FSF ADDRESS] FROM [AACountyexcel]",
            "Thought: I now know the final SQL query\nFinal Answer: SELECT [FSF NAME], [FSF ADDRESS] FROM [AACountyexcel]",
        ]);
        let output = agent(llm.clone(), 5).invoke("Where is Riva Food Market?").await.expect("invoke");

        assert_eq!(output.output, "SELECT [FSF NAME], [FSF ADDRESS] FROM [AACountyexcel]");
        assert_eq!(output.steps.len(), 1);
        assert_eq!(output.steps[0].observation, "FSF NAME | FSF ADDRESS\nRIVA FOOD MARKET | 3 RIVA RD");

        let prompts = llm.prompts.lock().expect("lock");
        assert!(prompts[1]
            .user
            .contains("Observation: FSF NAME | FSF ADDRESS\nRIVA FOOD MARKET | 3 RIVA RD\nThought:"));
    }

    #[tokio::test]
    async fn unknown_tool_lists_valid_choices() {
        let llm = ScriptedLlm::new(&[
            "Action: sql_db_list_tables\nAction Input: ",
            "Final Answer: SELECT 1",
        ]);
        let output = agent(llm, 5).invoke("tables?").await.expect("invoke");

        assert_eq!(
            output.steps[0].observation,
            "sql_db_list_tables is not a valid tool, try one of [sql_db_query, sql_db_schema]."
        );
        assert_eq!(output.output, "SELECT 1");
    }

    #[tokio::test]
    async fn iteration_limit_stops_the_loop() {
        let llm = ScriptedLlm::new(&[
            "Action: sql_db_schema\nAction Input: AACountyexcel",
            "Action: sql_db_schema\nAction Input: AACountyexcel",
            "Final Answer: too late",
        ]);
        let error = agent(llm.clone(), 2).invoke("loop").await.expect_err("limit");

        assert!(matches!(error, AgentError::IterationLimit { max_iterations: 2 }));
        assert_eq!(llm.prompts.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn model_errors_propagate() {
        let llm = ScriptedLlm::new(&[]);
        let error = agent(llm, 3).invoke("anything").await.expect_err("no replies");
        assert!(matches!(error, AgentError::Llm(LlmError::Http(_))));
    }
}
