use sqlx::Row;

use kopi_core::domain::outlet::OutletRecord;
use kopi_core::guard::VettedOutletQuery;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlOutletRepository {
    pool: DbPool,
}

impl SqlOutletRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Runs a guarded lookup on a connection switched to `query_only`, so the
    /// statement cannot write even if it slipped past the guard.
    ///
    /// The lookup runs on its own task: a caller that stops waiting cannot
    /// return the connection to the pool while it is still read-only.
    pub async fn lookup(
        &self,
        query: &VettedOutletQuery,
    ) -> Result<Vec<OutletRecord>, RepositoryError> {
        let pool = self.pool.clone();
        let sql = query.as_str().to_string();

        tokio::spawn(read_only_lookup(pool, sql))
            .await
            .map_err(|error| RepositoryError::Task(error.to_string()))?
    }

    /// Inserts the outlet unless the (city, outlet) pair already exists.
    pub async fn save(&self, record: &OutletRecord) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO outlets (city, outlet, open_time, close_time)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(city, outlet) DO NOTHING",
        )
        .bind(&record.city)
        .bind(&record.outlet)
        .bind(&record.open_time)
        .bind(&record.close_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list(&self) -> Result<Vec<OutletRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT city, outlet, open_time, close_time FROM outlets ORDER BY city, outlet",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_outlet).collect()
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outlets").fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

async fn read_only_lookup(pool: DbPool, sql: String) -> Result<Vec<OutletRecord>, RepositoryError> {
    let mut conn = pool.acquire().await?;

    sqlx::query("PRAGMA query_only = ON").execute(&mut *conn).await?;
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await;
    if let Err(error) = sqlx::query("PRAGMA query_only = OFF").execute(&mut *conn).await {
        conn.close_on_drop();
        return Err(error.into());
    }

    rows?.iter().map(row_to_outlet).collect()
}

fn row_to_outlet(row: &sqlx::sqlite::SqliteRow) -> Result<OutletRecord, RepositoryError> {
    let decode = |column: &str| -> Result<String, RepositoryError> {
        row.try_get::<Option<String>, _>(column)
            .map(Option::unwrap_or_default)
            .map_err(|e| RepositoryError::Decode(e.to_string()))
    };

    Ok(OutletRecord {
        city: decode("city")?,
        outlet: decode("outlet")?,
        open_time: decode("open_time")?,
        close_time: decode("close_time")?,
    })
}
