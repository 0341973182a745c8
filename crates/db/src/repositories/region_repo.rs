//! Repository for the `regions` reference table.

use leaderboard_core::stats::{InsertCounts, Region};
use sqlx::PgPool;

use crate::models::RegionRecord;

/// Provides query operations for regions.
pub struct RegionRepo;

impl RegionRepo {
    /// All regions with their job type name.
    pub async fn list(pool: &PgPool) -> Result<Vec<RegionRecord>, sqlx::Error> {
        sqlx::query_as::<_, RegionRecord>(
            "SELECT r.name, r.display_name, jt.name AS job_type \
             FROM regions r \
             JOIN job_types jt ON jt.id = r.job_type_id \
             ORDER BY r.name, jt.name",
        )
        .fetch_all(pool)
        .await
    }

    /// Insert regions over one connection. Existing `(name, job type)`
    /// pairs are processed but not inserted; a failing row is logged and
    /// skipped.
    pub async fn insert_many(pool: &PgPool, regions: &[Region]) -> InsertCounts {
        let mut counts = InsertCounts::default();

        let mut conn = match pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, "Failed to acquire connection for region insert");
                return counts;
            }
        };

        for region in regions {
            counts.processed += 1;
            let result = sqlx::query(
                "INSERT INTO regions (name, display_name, job_type_id) \
                 SELECT $1, $2, jt.id FROM job_types jt WHERE jt.name = $3 \
                 ON CONFLICT ON CONSTRAINT uq_regions_name_job_type DO NOTHING",
            )
            .bind(&region.name)
            .bind(&region.display_name)
            .bind(region.job_type.as_str())
            .execute(&mut *conn)
            .await;

            match result {
                Ok(done) if done.rows_affected() > 0 => counts.inserted += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        region = %region.name,
                        error = %e,
                        "Failed to insert region, skipping"
                    );
                }
            }
        }

        tracing::debug!(
            inserted = counts.inserted,
            processed = counts.processed,
            "Region insert finished",
        );
        counts
    }
}
