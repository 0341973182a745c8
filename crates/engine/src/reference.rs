//! Reference data (regions and pipelines) served through TTL caches.
//!
//! A fresh cache hit is returned as-is. Otherwise the service reads through
//! to the store and replaces the cached list. When that read fails the
//! cache is invalidated before the error is returned, so stale data is
//! never served as if it were current.

use std::sync::Arc;

use chrono::Utc;
use leaderboard_core::query::StatsQuery;
use leaderboard_core::stats::{InsertCounts, Pipeline, Region};
use leaderboard_core::store::{RegionRefresher, StatsStore};

use crate::cache::ReferenceCache;
use crate::config::EngineConfig;
use crate::context::CallContext;
use crate::error::{EngineError, EngineResult};

pub struct ReferenceDataService<S, R> {
    store: Arc<S>,
    refresher: R,
    regions: ReferenceCache<Region>,
    pipelines: ReferenceCache<Pipeline>,
    lookback: chrono::Duration,
}

impl<S: StatsStore, R: RegionRefresher> ReferenceDataService<S, R> {
    pub fn new(store: Arc<S>, refresher: R, config: &EngineConfig) -> Self {
        Self {
            store,
            refresher,
            regions: ReferenceCache::new("regions", config.regions_cache_ttl),
            pipelines: ReferenceCache::new("pipelines", config.pipelines_cache_ttl),
            lookback: config.lookback,
        }
    }

    pub fn regions_cache(&self) -> &ReferenceCache<Region> {
        &self.regions
    }

    pub fn pipelines_cache(&self) -> &ReferenceCache<Pipeline> {
        &self.pipelines
    }

    /// All known regions.
    ///
    /// On a miss or a stale hit the upstream catalog is pulled first. That
    /// pull is best-effort: its failure or timeout does not fail the call.
    pub async fn regions(&self, ctx: &CallContext) -> EngineResult<Vec<Region>> {
        let cached = self.regions.get().await;
        if cached.is_fresh() {
            return Ok(cached.results);
        }

        match ctx
            .run("pull_and_persist_regions", self.refresher.pull_and_persist_regions())
            .await
        {
            Ok(counts) => {
                tracing::debug!(
                    inserted = counts.inserted,
                    processed = counts.processed,
                    "Region refresh finished"
                );
            }
            Err(e @ EngineError::Cancelled { .. }) => return Err(e),
            Err(e) => tracing::warn!(error = %e, "Region refresh failed, reading stored regions"),
        }

        self.reload_regions(ctx).await
    }

    /// Pipelines observed in the query window.
    ///
    /// Only unscoped queries over the default lookback ending now go through
    /// the cache. A region filter or any other window always reads the store.
    pub async fn pipelines(
        &self,
        ctx: &CallContext,
        query: &StatsQuery,
    ) -> EngineResult<Vec<Pipeline>> {
        query.validate()?;

        if !self.pipelines_cacheable(query) {
            return ctx
                .bounded("query_pipelines", self.store.query_pipelines(query))
                .await;
        }

        let cached = self.pipelines.get().await;
        if cached.is_fresh() {
            return Ok(cached.results);
        }

        match ctx
            .bounded("query_pipelines", self.store.query_pipelines(query))
            .await
        {
            Ok(pipelines) => {
                self.pipelines.update(pipelines.clone()).await;
                Ok(pipelines)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load pipelines, invalidating cache");
                self.pipelines.invalidate().await;
                Err(e)
            }
        }
    }

    /// Persist regions. When any were new, the regions cache is reloaded
    /// (or invalidated if the reload fails).
    pub async fn insert_regions(
        &self,
        ctx: &CallContext,
        regions: &[Region],
    ) -> EngineResult<InsertCounts> {
        let counts = ctx
            .run("insert_regions", self.store.insert_regions(regions))
            .await?;
        tracing::debug!(
            inserted = counts.inserted,
            processed = counts.processed,
            "Inserted regions"
        );

        if counts.inserted > 0 {
            if let Err(e) = self.reload_regions(ctx).await {
                tracing::error!(error = %e, "Region cache reload after insert failed");
            }
        }
        Ok(counts)
    }

    /// The cached list is keyed by nothing, so it may only hold the default
    /// window: span equal to the lookback and ending within one TTL of now.
    fn pipelines_cacheable(&self, query: &StatsQuery) -> bool {
        if query.region().is_some() || query.until - query.since != self.lookback {
            return false;
        }
        match chrono::Duration::from_std(self.pipelines.ttl()) {
            Ok(ttl) => (Utc::now() - query.until).abs() <= ttl,
            Err(_) => false,
        }
    }

    async fn reload_regions(&self, ctx: &CallContext) -> EngineResult<Vec<Region>> {
        match ctx.bounded("query_regions", self.store.query_regions()).await {
            Ok(regions) => {
                self.regions.update(regions.clone()).await;
                Ok(regions)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load regions, invalidating cache");
                self.regions.invalidate().await;
                Err(e)
            }
        }
    }
}
