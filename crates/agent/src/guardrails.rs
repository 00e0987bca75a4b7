use querybot_core::sanitize::is_select;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

impl GuardrailDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Statement gate applied before anything reaches the database. It is a
/// prefix check only; the statement is never parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub select_only: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { select_only: true }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, sql: &str) -> GuardrailDecision {
        if sql.trim().is_empty() {
            return GuardrailDecision::Deny {
                reason_code: "empty_statement",
                user_message: "No SQL statement was provided.".to_string(),
            };
        }
        if self.select_only && !is_select(sql) {
            return GuardrailDecision::Deny {
                reason_code: "non_select_statement",
                user_message: "Only SELECT statements may be run against this table.".to_string(),
            };
        }
        GuardrailDecision::Allow
    }
}
