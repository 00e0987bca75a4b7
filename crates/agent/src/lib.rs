//! Query agent runtime: turns a plain-language question about food facilities
//! into a T-SQL `SELECT`, runs it, and summarizes the rows.
//!
//! # Architecture
//!
//! 1. **Model clients** (`llm`) - Gemini, OpenAI-compatible, and Ollama
//!    behind one `LlmClient` trait
//! 2. **Tools** (`tools`) - `sql_db_query` and `sql_db_schema`, gated by
//!    `guardrails`
//! 3. **Agent loop** (`runtime`, `conversation`) - bounded
//!    Thought/Action/Observation exchange ending in a final SQL statement
//! 4. **Summarizer** (`summarizer`) - second model call over the raw rows
//! 5. **Pipeline** (`pipeline`) - classify, execute, summarize, label
//!
//! The model only writes SQL and prose. Whether a statement runs is decided
//! by the `SELECT`-prefix check, never by the model.

pub mod conversation;
pub mod guardrails;
pub mod llm;
pub mod pipeline;
pub mod runtime;
pub mod summarizer;
pub mod tools;

pub use llm::{build_client, LlmClient, LlmError, Prompt};
pub use pipeline::{PipelineError, QueryBot, QueryOutcome};
pub use runtime::{AgentError, AgentOutput, QueryAgent};
pub use summarizer::Summarizer;
