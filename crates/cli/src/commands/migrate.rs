use querybot_core::config::ValidationScope;
use querybot_db::migrations::{self, MIGRATOR};
use tracing::info;

use crate::commands::{build_runtime, load_config, open_local_store, CommandResult, Failure};
use crate::logging;

pub fn run() -> CommandResult {
    let config = match load_config("migrate", ValidationScope::LocalStore) {
        Ok(config) => config,
        Err(result) => return result,
    };
    logging::init(&config.logging);

    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result: Result<(), Failure> = runtime.block_on(async {
        let pool = open_local_store(&config.database).await?;
        let outcome = migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8));
        pool.close().await;
        outcome
    });

    match result {
        Ok(()) => {
            let known = MIGRATOR.iter().count();
            info!(
                event_name = "querybot.cli.migrate.completed",
                migrations = known,
                url = %config.database.url,
                "local facility store migrated"
            );
            CommandResult::success(
                "migrate",
                format!(
                    "{known} migration(s) applied or already current; [AACountyexcel] is ready at `{}`",
                    config.database.url
                ),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
