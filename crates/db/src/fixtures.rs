use sqlx::Executor;

use crate::connection::DbPool;

/// Facilities the local seed guarantees, keyed on `[FSF#]`.
const SEED_FACILITIES: &[SeedFacility] = &[
    SeedFacility {
        fsf_number: "10001",
        name: "RIVA FOOD MARKET",
        city: "ANNAPOLIS",
        facility_type: "RETAIL FOOD STORE",
    },
    SeedFacility {
        fsf_number: "10002",
        name: "SEVERN HARBOR CRAB HOUSE",
        city: "SEVERNA PARK",
        facility_type: "RESTAURANT",
    },
    SeedFacility {
        fsf_number: "10003",
        name: "GLEN BURNIE HIGH SCHOOL CAFETERIA",
        city: "GLEN BURNIE",
        facility_type: "SCHOOL",
    },
];

/// Deterministic facility rows for a local SQLite mirror of the county table.
pub struct FacilitySeed;

impl FacilitySeed {
    pub const SQL: &str = include_str!("../../../config/fixtures/facility_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, sqlx::Error> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let facilities_seeded = SEED_FACILITIES
            .iter()
            .map(|facility| SeededFacility {
                fsf_number: facility.fsf_number,
                name: facility.name,
            })
            .collect();

        Ok(SeedResult { facilities_seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, sqlx::Error> {
        let mut checks = Vec::new();

        for facility in SEED_FACILITIES {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM [AACountyexcel] \
                 WHERE [FSF#] = ?1 AND [FSF NAME] = ?2 AND [FSF CITY] = ?3 AND [FACILITY TYPE] = ?4)",
            )
            .bind(facility.fsf_number)
            .bind(facility.name)
            .bind(facility.city)
            .bind(facility.facility_type)
            .fetch_one(pool)
            .await?;
            checks.push((facility.name, present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        for facility in SEED_FACILITIES {
            sqlx::query("DELETE FROM [AACountyexcel] WHERE [FSF#] = ?1")
                .bind(facility.fsf_number)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedFacility {
    fsf_number: &'static str,
    name: &'static str,
    city: &'static str,
    facility_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededFacility {
    pub fsf_number: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub facilities_seeded: Vec<SeededFacility>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl VerificationResult {
    pub fn missing(&self) -> Vec<&'static str> {
        self.checks.iter().filter(|(_, present)| !present).map(|(name, _)| *name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::FacilitySeed;
    use crate::{connect_with_settings, migrations};

    async fn migrated_pool() -> crate::DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        pool
    }

    #[tokio::test]
    async fn seed_loads_and_verifies() {
        let pool = migrated_pool().await;

        let result = FacilitySeed::load(&pool).await.expect("load seed");
        assert_eq!(result.facilities_seeded.len(), 3);
        assert!(result.facilities_seeded.iter().any(|f| f.name == "RIVA FOOD MARKET"));

        let verification = FacilitySeed::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "missing: {:?}", verification.missing());
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let pool = migrated_pool().await;
        FacilitySeed::load(&pool).await.expect("first load");
        FacilitySeed::load(&pool).await.expect("second load");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM [AACountyexcel]")
            .fetch_one(&pool)
            .await
            .expect("count rows");
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn verify_reports_missing_facilities_after_clean() {
        let pool = migrated_pool().await;
        FacilitySeed::load(&pool).await.expect("load seed");
        FacilitySeed::clean(&pool).await.expect("clean seed");

        let verification = FacilitySeed::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        assert_eq!(verification.missing().len(), 3);
    }
}
