//! Persistence seams consumed by the engine.
//!
//! [`StatsStore`] is implemented by each storage backend (PostgreSQL in
//! `leaderboard-db`, an in-memory store in the engine). [`RegionRefresher`]
//! is the one-shot "pull the upstream region catalog and persist it"
//! collaborator invoked on a regions cache miss.
//!
//! Implementations acquire whatever connection they need per call and
//! release it before returning; callers bound each call with a deadline.

use std::future::Future;
use std::sync::Arc;

use crate::query::{QueryDescriptor, StatsQuery};
use crate::stats::{AggregatedStatsRow, InsertCounts, Pipeline, Region, StatEntry};

/// Storage backend for raw stats and reference data.
pub trait StatsStore: Send + Sync {
    /// Backend error, surfaced to callers as an upstream failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist one raw measurement.
    fn insert_stat(
        &self,
        entry: &StatEntry,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Execute a [`QueryShape::Grouped`](crate::query::QueryShape::Grouped)
    /// descriptor.
    fn query_aggregated(
        &self,
        descriptor: &QueryDescriptor,
    ) -> impl Future<Output = Result<Vec<AggregatedStatsRow>, Self::Error>> + Send;

    /// Execute a [`QueryShape::Median`](crate::query::QueryShape::Median)
    /// descriptor. `None` when no row matched.
    fn query_median_rtt(
        &self,
        descriptor: &QueryDescriptor,
    ) -> impl Future<Output = Result<Option<f64>, Self::Error>> + Send;

    /// Execute a [`QueryShape::Raw`](crate::query::QueryShape::Raw)
    /// descriptor.
    fn query_raw(
        &self,
        descriptor: &QueryDescriptor,
    ) -> impl Future<Output = Result<Vec<StatEntry>, Self::Error>> + Send;

    /// All known regions.
    fn query_regions(&self) -> impl Future<Output = Result<Vec<Region>, Self::Error>> + Send;

    /// Insert regions, skipping ones that already exist. Per-row failures
    /// are skipped, not fatal.
    fn insert_regions(&self, regions: &[Region]) -> impl Future<Output = InsertCounts> + Send;

    /// Pipelines observed in the query window (optionally one region), with
    /// their distinct models and regions.
    fn query_pipelines(
        &self,
        query: &StatsQuery,
    ) -> impl Future<Output = Result<Vec<Pipeline>, Self::Error>> + Send;
}

/// Pulls the latest upstream reference data and persists it.
///
/// Best-effort: failures are reported through the returned counts (zero
/// inserted), never as an error.
pub trait RegionRefresher: Send + Sync {
    fn pull_and_persist_regions(&self) -> impl Future<Output = InsertCounts> + Send;
}

impl<T: RegionRefresher> RegionRefresher for Arc<T> {
    fn pull_and_persist_regions(&self) -> impl Future<Output = InsertCounts> + Send {
        self.as_ref().pull_and_persist_regions()
    }
}
