use std::collections::HashSet;
use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;

use kopi_core::domain::product::{ProductId, ProductRecord};

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "any", "are", "can", "do", "for", "have", "i", "in", "is", "me", "of",
    "or", "show", "some", "the", "to", "what", "which", "with", "you", "your",
];

/// Category words that describe the whole catalog rather than one item.
const CATALOG_TERMS: &[&str] =
    &["drinkware", "product", "products", "item", "items", "merch", "merchandise"];

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_all(&self) -> Result<Vec<ProductRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, price_rm, url, image, document FROM products ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<ProductRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: Option<String> =
        row.try_get("price_rm").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let url: Option<String> =
        row.try_get("url").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let image: Option<String> =
        row.try_get("image").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let document: String =
        row.try_get("document").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let price_rm = price_str
        .map(|value| {
            Decimal::from_str(&value)
                .map_err(|e| RepositoryError::Decode(format!("price `{value}`: {e}")))
        })
        .transpose()?;

    Ok(ProductRecord { id: ProductId(id), title, price_rm, url, image, document })
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<ProductRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, title, price_rm, url, image, document FROM products WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn save(&self, product: ProductRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO products (id, title, price_rm, url, image, document, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 price_rm = excluded.price_rm,
                 url = excluded.url,
                 image = excluded.image,
                 document = excluded.document",
        )
        .bind(&product.id.0)
        .bind(&product.title)
        .bind(product.price_rm.map(|price| price.to_string()))
        .bind(&product.url)
        .bind(&product.image)
        .bind(&product.document)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<ProductRecord>, RepositoryError> {
        let catalog = self.load_all().await?;
        Ok(rank_by_term_overlap(query, catalog, k))
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|term| !term.is_empty() && !STOPWORDS.contains(term))
        .map(str::to_string)
        .collect()
}

/// Ranks catalog entries by how many distinct query terms they contain; title
/// hits count twice. Entries with no overlap are dropped unless the query names
/// the catalog as a whole. Ties keep catalog order.
pub fn rank_by_term_overlap(query: &str, catalog: Vec<ProductRecord>, k: usize) -> Vec<ProductRecord> {
    let query_terms = terms(query);
    let broad = query_terms.iter().any(|term| CATALOG_TERMS.contains(&term.as_str()));
    let specific = query_terms
        .iter()
        .filter(|term| !CATALOG_TERMS.contains(&term.as_str()))
        .collect::<Vec<_>>();

    let mut scored = catalog
        .into_iter()
        .enumerate()
        .filter_map(|(position, record)| {
            let document_terms = terms(&record.document);
            let title_terms = terms(&record.title);
            let overlap = specific
                .iter()
                .map(|term| {
                    usize::from(document_terms.contains(*term)) + usize::from(title_terms.contains(*term))
                })
                .sum::<usize>();
            let score = overlap + usize::from(broad);
            (score > 0).then_some((score, position, record))
        })
        .collect::<Vec<_>>();

    scored.sort_by(|left, right| right.0.cmp(&left.0).then(left.1.cmp(&right.1)));
    scored.into_iter().take(k).map(|(_, _, record)| record).collect()
}
