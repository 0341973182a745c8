//! [`StatsStore`] backed by a PostgreSQL pool.

use leaderboard_core::query::{QueryDescriptor, StatsQuery};
use leaderboard_core::stats::{AggregatedStatsRow, InsertCounts, Pipeline, Region, StatEntry};
use leaderboard_core::store::StatsStore;

use crate::repositories::{RegionRepo, StatRepo};
use crate::DbPool;

/// PostgreSQL stats store. Each call checks out its own connection from
/// the pool and returns it when the call completes or is dropped.
#[derive(Clone)]
pub struct PgStatsStore {
    pool: DbPool,
}

impl PgStatsStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl StatsStore for PgStatsStore {
    type Error = sqlx::Error;

    async fn insert_stat(&self, entry: &StatEntry) -> Result<(), Self::Error> {
        StatRepo::insert(&self.pool, entry).await
    }

    async fn query_aggregated(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<Vec<AggregatedStatsRow>, Self::Error> {
        let records = StatRepo::aggregate(&self.pool, descriptor).await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn query_median_rtt(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<Option<f64>, Self::Error> {
        StatRepo::median_rtt(&self.pool, descriptor).await
    }

    async fn query_raw(&self, descriptor: &QueryDescriptor) -> Result<Vec<StatEntry>, Self::Error> {
        StatRepo::list_raw(&self.pool, descriptor).await
    }

    async fn query_regions(&self) -> Result<Vec<Region>, Self::Error> {
        let records = RegionRepo::list(&self.pool).await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn insert_regions(&self, regions: &[Region]) -> InsertCounts {
        RegionRepo::insert_many(&self.pool, regions).await
    }

    async fn query_pipelines(&self, query: &StatsQuery) -> Result<Vec<Pipeline>, Self::Error> {
        let records = StatRepo::list_pipelines(&self.pool, query).await?;
        Ok(records.into_iter().map(Into::into).collect())
    }
}
