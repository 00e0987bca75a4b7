use std::sync::Arc;

use querybot_core::schema::IDENTITY_COLUMNS;
use tracing::debug;

use crate::llm::{LlmClient, LlmError, Prompt};

const INSTRUCTIONS: &str = "You are a helpful data summarizer.\n\
The following is output from a SQL query about food facilities in Anne Arundel County.";

const EMPHASIS: &str = "Write one short paragraph for a health inspector. Highlight:\n\
- Facility name and address\n\
- The business or entity that owns or operates it\n\
- Phone number or contact person if present\n\
Leave out fees, dates, and seating numbers. Avoid verbose explanations.";

/// Second model call that turns raw result rows into prose.
pub struct Summarizer {
    llm: Arc<dyn LlmClient>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn prompt(raw: &str) -> Prompt {
        let identity = IDENTITY_COLUMNS
            .iter()
            .map(|name| format!("[{name}]"))
            .collect::<Vec<_>>()
            .join(", ");
        Prompt::user(format!(
            "{INSTRUCTIONS}\n\n{raw}\n\n{EMPHASIS}\nPrefer these columns when present: {identity}."
        ))
    }

    /// One model call, no retry; the reply is only trimmed.
    pub async fn summarize(&self, raw: &str) -> Result<String, LlmError> {
        debug!(
            event_name = "querybot.summarizer.request",
            input_chars = raw.len(),
            provider = self.llm.name(),
            "summarizing query result"
        );
        let summary = self.llm.complete(&Self::prompt(raw)).await?;
        Ok(summary.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::Summarizer;
    use crate::llm::{LlmClient, LlmError, Prompt};

    struct EchoLlm {
        seen: Mutex<Vec<String>>,
        reply: Result<String, String>,
    }

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
            self.seen.lock().expect("lock").push(prompt.user.clone());
            self.reply.clone().map_err(LlmError::Http)
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    #[test]
    fn prompt_embeds_rows_and_field_guidance() {
        let prompt = Summarizer::prompt("FSF NAME | FSF PHONE#\nRIVA FOOD MARKET | 410-555-0142");

        assert!(prompt.system.is_none());
        assert!(prompt.user.contains("RIVA FOOD MARKET | 410-555-0142"));
        assert!(prompt.user.contains("Facility name and address"));
        assert!(prompt.user.contains("owns or operates"));
        assert!(prompt.user.contains("Phone number"));
        assert!(prompt.user.contains("Leave out fees, dates, and seating numbers."));
    }

    #[test]
    fn prompt_names_identity_columns_after_the_rows() {
        let prompt = Summarizer::prompt("FSF NAME\nRIVA FOOD MARKET");

        let rows_at = prompt.user.find("RIVA FOOD MARKET").expect("rows");
        let identity_at = prompt.user.find("Prefer these columns when present: ").expect("hint");
        assert!(identity_at > rows_at);
        assert!(prompt.user.contains("[FSF NAME], [FSF ADDRESS], [FSF CITY]"));
        assert!(prompt.user.contains("[BUSINESS NAME], [CONTACT NAME], [CONTACT PHONE]."));
        assert!(!prompt.user.contains("[APPLICATION FEE]"));
    }

    #[tokio::test]
    async fn summary_is_trimmed_and_model_called_once() {
        let llm = Arc::new(EchoLlm {
            seen: Mutex::new(Vec::new()),
            reply: Ok("\n  Riva Food Market, 3 Riva Rd, is run by Riva Market LLC.  \n".to_string()),
        });
        let summarizer = Summarizer::new(llm.clone());

        let summary = summarizer.summarize("FSF NAME\nRIVA FOOD MARKET").await.expect("summary");

        assert_eq!(summary, "Riva Food Market, 3 Riva Rd, is run by Riva Market LLC.");
        assert_eq!(llm.seen.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn model_failure_is_returned_unchanged() {
        let llm = Arc::new(EchoLlm {
            seen: Mutex::new(Vec::new()),
            reply: Err("connection reset".to_string()),
        });
        let error = Summarizer::new(llm).summarize("rows").await.expect_err("failure");
        assert!(matches!(error, LlmError::Http(ref message) if message == "connection reset"));
    }
}
