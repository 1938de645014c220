use orderdesk_core::config::LoadOptions;
use orderdesk_db::fixtures;

use crate::bootstrap::bootstrap;
use crate::commands::{runtime, CommandResult};

pub fn run() -> CommandResult {
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let app = bootstrap(LoadOptions::default())
            .await
            .map_err(|error| ("bootstrap", error.to_string(), 2u8))?;
        let seeded = fixtures::seed(&app.db_pool)
            .await
            .map_err(|error| ("seed", error.to_string(), 4u8))?;
        let verification = fixtures::verify(&app.db_pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 4u8))?;
        if !verification.passed {
            return Err(("seed_verification", verification.failures.join("; "), 5u8));
        }
        app.db_pool.close().await;
        Ok::<_, (&'static str, String, u8)>(seeded)
    });

    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "seeded {} customers, {} items, {} orders, {} intake events",
                seeded.customers, seeded.items, seeded.orders, seeded.intake_events
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
