//! Repository for raw measurements in `events` and the `event_details` view.

use leaderboard_core::query::{QueryDescriptor, StatsQuery};
use leaderboard_core::stats::StatEntry;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::filter::{bind_values, bind_values_scalar, render};
use crate::models::{AggregatedStatsRecord, PipelineRecord};

/// Provides query operations for stats events.
pub struct StatRepo;

impl StatRepo {
    /// Insert one measurement. The region must already exist for the
    /// entry's job type; otherwise nothing is written and `RowNotFound` is
    /// returned.
    pub async fn insert(pool: &PgPool, entry: &StatEntry) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO events (event_time, orchestrator, region_id, payload) \
             SELECT $1, $2, r.id, $3 \
             FROM regions r \
             JOIN job_types jt ON jt.id = r.job_type_id \
             WHERE r.name = $4 AND jt.name = $5",
        )
        .bind(entry.timestamp)
        .bind(&entry.orchestrator)
        .bind(Json(entry))
        .bind(&entry.region)
        .bind(entry.job_type().as_str())
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                orchestrator = %entry.orchestrator,
                region = %entry.region,
                job_type = %entry.job_type(),
                "Stat rejected: region not registered for job type",
            );
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    /// Grouped means per (orchestrator, region, job type, model, pipeline).
    pub async fn aggregate(
        pool: &PgPool,
        descriptor: &QueryDescriptor,
    ) -> Result<Vec<AggregatedStatsRecord>, sqlx::Error> {
        let rendered = render(descriptor);
        tracing::debug!(sql = %rendered.sql, binds = rendered.binds.len(), "Running aggregation");
        let q = sqlx::query_as::<_, AggregatedStatsRecord>(&rendered.sql);
        bind_values(q, &rendered.binds).fetch_all(pool).await
    }

    /// 50th-percentile round-trip time. `None` when no row matched.
    pub async fn median_rtt(
        pool: &PgPool,
        descriptor: &QueryDescriptor,
    ) -> Result<Option<f64>, sqlx::Error> {
        let rendered = render(descriptor);
        tracing::debug!(sql = %rendered.sql, "Running median query");
        let q = sqlx::query_scalar::<_, Option<f64>>(&rendered.sql);
        bind_values_scalar(q, &rendered.binds).fetch_one(pool).await
    }

    /// Matching entries as stored.
    pub async fn list_raw(
        pool: &PgPool,
        descriptor: &QueryDescriptor,
    ) -> Result<Vec<StatEntry>, sqlx::Error> {
        let rendered = render(descriptor);
        let q = sqlx::query_scalar::<_, Json<StatEntry>>(&rendered.sql);
        let rows = bind_values_scalar(q, &rendered.binds).fetch_all(pool).await?;
        Ok(rows.into_iter().map(|Json(entry)| entry).collect())
    }

    /// AI pipelines seen in the query window, optionally in one region.
    pub async fn list_pipelines(
        pool: &PgPool,
        query: &StatsQuery,
    ) -> Result<Vec<PipelineRecord>, sqlx::Error> {
        let mut sql = String::from(
            "SELECT pipeline, \
                    ARRAY_AGG(DISTINCT model ORDER BY model) AS models, \
                    ARRAY_AGG(DISTINCT region ORDER BY region) AS regions \
             FROM event_details \
             WHERE pipeline IS NOT NULL AND model IS NOT NULL \
               AND event_time >= $1 AND event_time <= $2",
        );
        if query.region().is_some() {
            sql.push_str(" AND region = $3");
        }
        sql.push_str(" GROUP BY pipeline ORDER BY pipeline");

        let mut q = sqlx::query_as::<_, PipelineRecord>(&sql)
            .bind(query.since)
            .bind(query.until);
        if let Some(region) = query.region() {
            q = q.bind(region);
        }
        q.fetch_all(pool).await
    }
}
