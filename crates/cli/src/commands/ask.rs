use querybot_agent::{build_client, QueryBot, QueryOutcome};
use querybot_core::config::ValidationScope;
use querybot_core::errors::ApplicationError;
use querybot_db::connect_gateway;
use uuid::Uuid;

use crate::commands::{build_runtime, load_config, CommandResult, Failure};
use crate::logging;

pub fn run(question: &str, json_output: bool) -> CommandResult {
    let config = match load_config("ask", ValidationScope::Full) {
        Ok(config) => config,
        Err(result) => return result,
    };
    logging::init(&config.logging);

    if question.trim().is_empty() {
        return CommandResult::failure("ask", "invalid_question", "question must not be empty", 2);
    }

    let llm = match build_client(&config.llm) {
        Ok(llm) => llm,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                format!("model client setup failed: {error}"),
                2,
            );
        }
    };

    let runtime = match build_runtime("ask") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let correlation_id = Uuid::new_v4().to_string();
    let result: Result<QueryOutcome, Failure> = runtime.block_on(async {
        let gateway = connect_gateway(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let bot = QueryBot::assemble(llm, gateway, config.agent.max_iterations);
        bot.query_with_correlation(question, &correlation_id)
            .await
            .map_err(|error| pipeline_failure(ApplicationError::from(error), &correlation_id))
    });

    match result {
        Ok(outcome) if json_output => CommandResult::success("ask", outcome.render()),
        Ok(outcome) => CommandResult::text(outcome.render()),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}

fn pipeline_failure(error: ApplicationError, correlation_id: &str) -> Failure {
    let (error_class, exit_code) = match &error {
        ApplicationError::Configuration(_) => ("config_validation", 2),
        ApplicationError::Integration(_) => ("model_service", 6),
    };
    let detail = error.to_string();
    let interface = error.into_interface(correlation_id);
    let message = format!(
        "{} (correlation id {}): {detail}",
        interface.user_message(),
        interface.correlation_id()
    );
    (error_class, message, exit_code)
}
