use kopi_core::config::AppConfig;
use kopi_db::OutletSeedDataset;
use serde_json::json;

use crate::commands::{block_on, load_config, open_database, CommandResult};

pub fn run() -> CommandResult {
    match load_config("seed") {
        Ok(config) => run_with_config(&config),
        Err(result) => result,
    }
}

/// Inserts the outlet fixtures. Running it again inserts nothing new.
pub fn run_with_config(config: &AppConfig) -> CommandResult {
    block_on("seed", async {
        let pool = open_database(config).await?;

        let seeded = OutletSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 6u8))?;
        let verification = OutletSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        pool.close().await;

        if !verification.all_present {
            return Err(("seed_verification", verification_message(&verification.checks), 6));
        }

        Ok(CommandResult::success_with(
            "seed",
            format!("seeded {} new outlets ({} in fixture set)", seeded.inserted, seeded.total),
            Some(json!({ "inserted": seeded.inserted, "total": seeded.total })),
        ))
    })
}

fn verification_message(checks: &[(&str, bool)]) -> String {
    let missing = checks
        .iter()
        .filter_map(|(check, present)| (!present).then_some(*check))
        .collect::<Vec<_>>();

    if missing.is_empty() {
        "Some outlet fixtures failed to load".to_string()
    } else {
        format!("Outlet fixtures missing after seeding: {}", missing.join(", "))
    }
}
