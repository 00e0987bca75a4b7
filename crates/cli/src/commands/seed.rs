use querybot_core::config::ValidationScope;
use querybot_db::{migrations, FacilitySeed, SeedResult, VerificationResult};
use tracing::info;

use crate::commands::{build_runtime, load_config, open_local_store, CommandResult, Failure};
use crate::logging;

pub fn run() -> CommandResult {
    let config = match load_config("seed", ValidationScope::LocalStore) {
        Ok(config) => config,
        Err(result) => return result,
    };
    logging::init(&config.logging);

    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result: Result<SeedResult, Failure> = runtime.block_on(async {
        let pool = open_local_store(&config.database).await?;
        let outcome = seed_and_verify(&pool).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => {
            info!(
                event_name = "querybot.cli.seed.completed",
                facilities = seeded.facilities_seeded.len(),
                url = %config.database.url,
                "sample facilities loaded"
            );
            let lines: Vec<String> = seeded
                .facilities_seeded
                .iter()
                .map(|facility| format!("  - {}: {}", facility.fsf_number, facility.name))
                .collect();
            CommandResult::success(
                "seed",
                format!(
                    "loaded {} sample facilities into [AACountyexcel]:\n{}",
                    lines.len(),
                    lines.join("\n")
                ),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

async fn seed_and_verify(pool: &querybot_db::DbPool) -> Result<SeedResult, Failure> {
    migrations::run_pending(pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;

    let seeded = FacilitySeed::load(pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

    let verification = FacilitySeed::verify(pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

    if verification.all_present {
        Ok(seeded)
    } else {
        Err(("seed_verification", verification_message(&verification), 6u8))
    }
}

fn verification_message(verification: &VerificationResult) -> String {
    let missing = verification.missing();
    if missing.is_empty() {
        "some sample facilities failed to load".to_string()
    } else {
        format!("sample facilities missing after seed: {}", missing.join(", "))
    }
}
