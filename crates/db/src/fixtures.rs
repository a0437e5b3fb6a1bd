use kopi_core::domain::outlet::OutletRecord;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlOutletRepository};

struct OutletSeed {
    city: &'static str,
    outlet: &'static str,
    open_time: &'static str,
    close_time: &'static str,
}

/// Klang Valley outlets the lookup service answers from.
const SEED_OUTLETS: &[OutletSeed] = &[
    OutletSeed { city: "Kuala Lumpur", outlet: "Wangsa Maju", open_time: "08:00", close_time: "22:00" },
    OutletSeed { city: "Kuala Lumpur", outlet: "Setapak Central", open_time: "10:00", close_time: "22:00" },
    OutletSeed { city: "Kuala Lumpur", outlet: "Bangsar South", open_time: "07:30", close_time: "21:00" },
    OutletSeed { city: "Kuala Lumpur", outlet: "KLCC", open_time: "10:00", close_time: "22:00" },
    OutletSeed { city: "Petaling Jaya", outlet: "SS2", open_time: "08:00", close_time: "23:00" },
    OutletSeed { city: "Petaling Jaya", outlet: "Damansara Perdana", open_time: "08:00", close_time: "22:00" },
    OutletSeed { city: "Petaling Jaya", outlet: "Paradigm Mall", open_time: "10:00", close_time: "22:00" },
    OutletSeed { city: "Ampang", outlet: "Bandar Baru Ampang", open_time: "08:00", close_time: "22:00" },
    OutletSeed { city: "Ampang", outlet: "Ampang Point", open_time: "10:00", close_time: "22:00" },
];

/// Deterministic outlet dataset. Loading twice leaves one row per outlet.
pub struct OutletSeedDataset;

impl OutletSeedDataset {
    pub fn records() -> Vec<OutletRecord> {
        SEED_OUTLETS
            .iter()
            .map(|seed| OutletRecord {
                city: seed.city.to_string(),
                outlet: seed.outlet.to_string(),
                open_time: seed.open_time.to_string(),
                close_time: seed.close_time.to_string(),
            })
            .collect()
    }

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let repository = SqlOutletRepository::new(pool.clone());
        let mut inserted = 0;

        for record in Self::records() {
            if repository.save(&record).await? {
                inserted += 1;
            }
        }

        Ok(SeedResult { inserted, total: SEED_OUTLETS.len() })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_OUTLETS.len());

        for seed in SEED_OUTLETS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM outlets
                               WHERE city = ?1 AND outlet = ?2 AND open_time = ?3 AND close_time = ?4)",
            )
            .bind(seed.city)
            .bind(seed.outlet)
            .bind(seed.open_time)
            .bind(seed.close_time)
            .fetch_one(pool)
            .await?;
            checks.push((seed.outlet, present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for seed in SEED_OUTLETS {
            sqlx::query("DELETE FROM outlets WHERE city = ?1 AND outlet = ?2")
                .bind(seed.city)
                .bind(seed.outlet)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub inserted: usize,
    pub total: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
