//! Reading and writing the reasoning transcript exchanged with the model.
//!
//! The model answers in the `Thought / Action / Action Input / Final Answer`
//! format; observations are appended by the runtime, never by the model.

pub const THOUGHT: &str = "Thought:";
pub const ACTION: &str = "Action:";
pub const ACTION_INPUT: &str = "Action Input:";
pub const OBSERVATION: &str = "Observation:";
pub const FINAL_ANSWER: &str = "Final Answer:";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentReply {
    Action { thought: Option<String>, tool: String, input: String },
    Final { thought: Option<String>, answer: String },
}

/// One completed tool call with what it returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentStep {
    pub thought: Option<String>,
    pub tool: String,
    pub input: String,
    pub observation: String,
}

/// Interprets one model reply. Whichever of `Action:` or `Final Answer:`
/// appears first wins; a reply with neither is taken as the answer itself.
pub fn parse_reply(text: &str) -> AgentReply {
    let action_at = text.find(ACTION);
    let final_at = text.find(FINAL_ANSWER);

    match (action_at, final_at) {
        (Some(action), Some(final_answer)) if final_answer < action => {
            final_reply(text, final_answer)
        }
        (Some(action), _) => match action_reply(text, action) {
            Some(reply) => reply,
            None => match final_at {
                Some(final_answer) => final_reply(text, final_answer),
                None => AgentReply::Final { thought: None, answer: text.trim().to_string() },
            },
        },
        (None, Some(final_answer)) => final_reply(text, final_answer),
        (None, None) => AgentReply::Final { thought: None, answer: text.trim().to_string() },
    }
}

fn final_reply(text: &str, at: usize) -> AgentReply {
    AgentReply::Final {
        thought: thought(&text[..at]),
        answer: text[at + FINAL_ANSWER.len()..].trim().to_string(),
    }
}

fn action_reply(text: &str, at: usize) -> Option<AgentReply> {
    let after_action = &text[at + ACTION.len()..];
    let input_at = after_action.find(ACTION_INPUT)?;

    let tool = after_action[..input_at].trim().to_string();
    let mut input = &after_action[input_at + ACTION_INPUT.len()..];
    if let Some(observation) = input.find(OBSERVATION) {
        input = &input[..observation];
    }
    if let Some(final_answer) = input.find(FINAL_ANSWER) {
        input = &input[..final_answer];
    }
    let input = input.trim().trim_matches('"').trim().to_string();

    Some(AgentReply::Action { thought: thought(&text[..at]), tool, input })
}

fn thought(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim();
    let trimmed = trimmed.strip_prefix(THOUGHT).unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Renders completed steps back into the transcript, ready for the next
/// `Thought:`.
pub fn render_scratchpad(steps: &[AgentStep]) -> String {
    let mut out = String::new();
    for step in steps {
        if let Some(thought) = &step.thought {
            out.push_str(&format!("{THOUGHT} {thought}\n"));
        }
        out.push_str(&format!("{ACTION} {}\n", step.tool));
        out.push_str(&format!("{ACTION_INPUT} {}\n", step.input));
        out.push_str(&format!("{OBSERVATION} {}\n", step.observation));
    }
    out
}
