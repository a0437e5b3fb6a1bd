use kopi_core::config::AppConfig;

use crate::commands::{block_on, load_config, open_database, CommandResult};

pub fn run() -> CommandResult {
    match load_config("migrate") {
        Ok(config) => run_with_config(&config),
        Err(result) => result,
    }
}

pub fn run_with_config(config: &AppConfig) -> CommandResult {
    block_on("migrate", async {
        let pool = open_database(config).await?;
        pool.close().await;
        Ok(CommandResult::success("migrate", "applied pending migrations"))
    })
}
