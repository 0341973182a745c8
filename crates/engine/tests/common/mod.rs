#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use leaderboard_core::query::{QueryDescriptor, StatsQuery};
use leaderboard_core::stats::{
    AggregatedStatsRow, InsertCounts, JobType, Pipeline, Region, StatEntry,
};
use leaderboard_core::store::{RegionRefresher, StatsStore};
use leaderboard_engine::memory::{MemoryStatsStore, MemoryStoreError};
use leaderboard_engine::{CallContext, EngineConfig};

pub const DB_TIMEOUT: Duration = Duration::from_secs(8);

pub fn ctx() -> CallContext {
    CallContext::new(DB_TIMEOUT)
}

pub fn config() -> EngineConfig {
    EngineConfig {
        db_timeout: DB_TIMEOUT,
        ..EngineConfig::default()
    }
}

pub fn region(name: &str, job_type: JobType) -> Region {
    Region {
        name: name.to_string(),
        display_name: format!("{name} display"),
        job_type,
    }
}

/// Regions MDW and LAX for both job types.
pub fn seeded_regions() -> Vec<Region> {
    vec![
        region("MDW", JobType::Transcoding),
        region("LAX", JobType::Transcoding),
        region("MDW", JobType::Ai),
        region("LAX", JobType::Ai),
    ]
}

// ---------------------------------------------------------------------------
// FlakyStore
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FlakyError {
    #[error("store unavailable")]
    Unavailable,
    #[error(transparent)]
    Memory(#[from] MemoryStoreError),
}

/// Memory store that can be switched into failure, slowed down, or made to
/// return canned aggregation rows. Counts region and pipeline reads.
pub struct FlakyStore {
    pub inner: MemoryStatsStore,
    failing: AtomicBool,
    delay: Mutex<Duration>,
    canned_rows: Mutex<Option<Vec<AggregatedStatsRow>>>,
    pub region_reads: AtomicUsize,
    pub pipeline_reads: AtomicUsize,
}

impl FlakyStore {
    pub fn new(regions: Vec<Region>) -> Self {
        Self {
            inner: MemoryStatsStore::with_regions(regions),
            failing: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            canned_rows: Mutex::new(None),
            region_reads: AtomicUsize::new(0),
            pipeline_reads: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_canned_rows(&self, rows: Vec<AggregatedStatsRow>) {
        *self.canned_rows.lock().unwrap() = Some(rows);
    }

    pub fn region_reads(&self) -> usize {
        self.region_reads.load(Ordering::SeqCst)
    }

    pub fn pipeline_reads(&self) -> usize {
        self.pipeline_reads.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> Result<(), FlakyError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(FlakyError::Unavailable);
        }
        Ok(())
    }
}

impl StatsStore for FlakyStore {
    type Error = FlakyError;

    async fn insert_stat(&self, entry: &StatEntry) -> Result<(), Self::Error> {
        self.gate().await?;
        Ok(self.inner.insert_stat(entry).await?)
    }

    async fn query_aggregated(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<Vec<AggregatedStatsRow>, Self::Error> {
        self.gate().await?;
        let canned = self.canned_rows.lock().unwrap().clone();
        match canned {
            Some(rows) => Ok(rows),
            None => Ok(self.inner.query_aggregated(descriptor).await?),
        }
    }

    async fn query_median_rtt(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<Option<f64>, Self::Error> {
        self.gate().await?;
        Ok(self.inner.query_median_rtt(descriptor).await?)
    }

    async fn query_raw(&self, descriptor: &QueryDescriptor) -> Result<Vec<StatEntry>, Self::Error> {
        self.gate().await?;
        Ok(self.inner.query_raw(descriptor).await?)
    }

    async fn query_regions(&self) -> Result<Vec<Region>, Self::Error> {
        self.region_reads.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self.inner.query_regions().await?)
    }

    async fn insert_regions(&self, regions: &[Region]) -> InsertCounts {
        self.inner.insert_regions(regions).await
    }

    async fn query_pipelines(&self, query: &StatsQuery) -> Result<Vec<Pipeline>, Self::Error> {
        self.pipeline_reads.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self.inner.query_pipelines(query).await?)
    }
}

// ---------------------------------------------------------------------------
// Refreshers
// ---------------------------------------------------------------------------

/// Inserts a fixed region list on every pull, optionally after a stall.
pub struct SeedingRefresher<S> {
    store: Arc<S>,
    regions: Vec<Region>,
    stall: Duration,
    calls: AtomicUsize,
}

impl<S: StatsStore> SeedingRefresher<S> {
    pub fn new(store: Arc<S>, regions: Vec<Region>) -> Self {
        Self {
            store,
            regions,
            stall: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn stalling(store: Arc<S>, stall: Duration) -> Self {
        Self {
            stall,
            ..Self::new(store, Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<S: StatsStore> RegionRefresher for SeedingRefresher<S> {
    async fn pull_and_persist_regions(&self) -> InsertCounts {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.stall.is_zero() {
            tokio::time::sleep(self.stall).await;
        }
        self.store.insert_regions(&self.regions).await
    }
}
