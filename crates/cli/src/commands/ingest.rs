use std::fs;
use std::path::Path;

use kopi_core::config::AppConfig;
use kopi_core::domain::product::{ProductId, ProductRecord, ScrapedProduct};
use kopi_db::{ProductRepository, SqlProductRepository};
use serde_json::json;

use crate::commands::{block_on, load_config, open_database, CommandResult, Failure};

pub fn run(path: &Path) -> CommandResult {
    match load_config("ingest") {
        Ok(config) => run_with_config(&config, path),
        Err(result) => result,
    }
}

/// Loads a scraped drinkware JSONL file into the product catalog. Rows are
/// keyed by URL (or title), so ingesting the same file twice updates in place.
pub fn run_with_config(config: &AppConfig, path: &Path) -> CommandResult {
    let records = match read_catalog(path) {
        Ok(records) => records,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("ingest", error_class, message, exit_code);
        }
    };

    block_on("ingest", async {
        let pool = open_database(config).await?;
        let repository = SqlProductRepository::new(pool.clone());

        let ingested = records.len();
        for record in records {
            repository
                .save(record)
                .await
                .map_err(|error| ("ingest_write", error.to_string(), 7u8))?;
        }
        let total = repository.count().await.map_err(|error| ("ingest_write", error.to_string(), 7u8))?;
        pool.close().await;

        Ok(CommandResult::success_with(
            "ingest",
            format!("ingested {ingested} products ({total} in catalog)"),
            Some(json!({ "ingested": ingested, "catalog_size": total })),
        ))
    })
}

pub fn read_catalog(path: &Path) -> Result<Vec<ProductRecord>, Failure> {
    let raw = fs::read_to_string(path)
        .map_err(|error| ("ingest_read", format!("could not read `{}`: {error}", path.display()), 7u8))?;
    parse_catalog(&raw).and_then(|records| {
        if records.is_empty() {
            Err(("ingest_empty", format!("no product rows found in `{}`", path.display()), 7))
        } else {
            Ok(records)
        }
    })
}

pub fn parse_catalog(raw: &str) -> Result<Vec<ProductRecord>, Failure> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let row = serde_json::from_str::<ScrapedProduct>(line)
                .map_err(|error| ("ingest_parse", format!("line {}: {error}", index + 1), 7u8))?;
            Ok(to_record(row, index + 1))
        })
        .collect()
}

fn to_record(row: ScrapedProduct, line_number: usize) -> ProductRecord {
    let document = row.to_document();
    let title = row
        .title
        .clone()
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| format!("Untitled product {line_number}"));
    let id = row
        .url
        .clone()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| format!("title:{}", title.to_lowercase()));

    ProductRecord { id: ProductId(id), title, price_rm: row.price_rm, url: row.url, image: row.image, document }
}
