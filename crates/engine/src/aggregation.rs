//! Stats aggregation service.
//!
//! Validates and normalizes [`StatsQuery`]s, runs the grouped and median
//! queries against a [`StatsStore`], and builds leaderboards and the
//! per-orchestrator lookups on top of them.

use std::sync::Arc;

use leaderboard_core::error::CoreError;
use leaderboard_core::query::{
    build_aggregate_query, build_median_query, build_raw_query, SortDirective, StatField,
    StatsQuery,
};
use leaderboard_core::stats::{AggregatedStats, AggregatedStatsRow, JobType, Score, StatEntry};
use leaderboard_core::store::StatsStore;

use crate::config::EngineConfig;
use crate::context::CallContext;
use crate::error::EngineResult;
use crate::leaderboard::{assemble, Leaderboard};

pub struct AggregationService<S> {
    store: Arc<S>,
    lookback: chrono::Duration,
}

impl<S: StatsStore> AggregationService<S> {
    pub fn new(store: Arc<S>, config: &EngineConfig) -> Self {
        Self {
            store,
            lookback: config.lookback,
        }
    }

    /// Default lookback window applied by the per-orchestrator lookups.
    pub fn lookback(&self) -> chrono::Duration {
        self.lookback
    }

    /// Grouped means for the query plus the window's median RTT.
    ///
    /// The job type is settled first (see [`StatsQuery::normalized`]). The
    /// median runs as a separate call over the same filters, restricted to
    /// fully successful entries with a measured RTT.
    pub async fn aggregate(
        &self,
        ctx: &CallContext,
        query: StatsQuery,
    ) -> EngineResult<AggregatedStats> {
        let query = query.normalized()?;
        self.run_aggregation(ctx, &query).await
    }

    async fn run_aggregation(
        &self,
        ctx: &CallContext,
        query: &StatsQuery,
    ) -> EngineResult<AggregatedStats> {
        let rows = ctx
            .bounded("query_aggregated", self.store.query_aggregated(&build_aggregate_query(query)))
            .await?;

        if rows.is_empty() {
            tracing::debug!(job_type = %query.job_type, "No stats in window");
            return Ok(AggregatedStats::default());
        }

        let median_rtt = ctx
            .bounded("query_median_rtt", self.store.query_median_rtt(&build_median_query(query)))
            .await?;

        tracing::debug!(
            job_type = %query.job_type,
            rows = rows.len(),
            median_rtt = ?median_rtt,
            "Aggregated stats",
        );
        Ok(AggregatedStats { rows, median_rtt })
    }

    /// Scored leaderboard for the query.
    pub async fn leaderboard(
        &self,
        ctx: &CallContext,
        query: StatsQuery,
    ) -> EngineResult<Leaderboard> {
        let stats = self.aggregate(ctx, query).await?;
        assemble(&stats.rows, stats.median_rtt)
    }

    /// The orchestrator's best AI (region, model, pipeline) over the
    /// lookback window: highest success rate, then lowest RTT.
    ///
    /// `None` when the orchestrator had no AI activity.
    pub async fn best_region(
        &self,
        ctx: &CallContext,
        orchestrator: &str,
    ) -> EngineResult<Option<AggregatedStatsRow>> {
        let query = StatsQuery::lookback(self.lookback)
            .with_orchestrator(require_orchestrator(orchestrator)?)
            .with_job_type(JobType::Ai)
            .sorted_by(SortDirective::desc(StatField::SuccessRate))
            .sorted_by(SortDirective::asc(StatField::RoundTripTime))
            .with_limit(1);
        // Job type AI without a model is a deliberate filter here, so the
        // query is validated but not normalized.
        query.validate()?;

        let descriptor = build_aggregate_query(&query);
        let mut rows = ctx
            .bounded("query_aggregated", self.store.query_aggregated(&descriptor))
            .await?;

        match rows.len() {
            0 => {
                tracing::debug!(orchestrator, "No AI activity in window");
                Ok(None)
            }
            1 => Ok(rows.pop()),
            n => Err(CoreError::InternalConsistency(format!(
                "expected at most one best AI region for {orchestrator}, got {n}"
            ))
            .into()),
        }
    }

    /// Total score of the orchestrator in its best AI region, scored on the
    /// leaderboard for that region's model and pipeline.
    pub async fn top_ai_score(
        &self,
        ctx: &CallContext,
        orchestrator: &str,
    ) -> EngineResult<Option<Score>> {
        let Some(best) = self.best_region(ctx, orchestrator).await? else {
            return Ok(None);
        };
        let (Some(model), Some(pipeline)) = (best.model.clone(), best.pipeline.clone()) else {
            return Err(CoreError::InternalConsistency(format!(
                "best AI region {} for {orchestrator} has no model/pipeline",
                best.region
            ))
            .into());
        };

        let query = StatsQuery::lookback(self.lookback)
            .with_model(model.as_str())
            .with_pipeline(pipeline.as_str())
            .with_job_type(JobType::Ai);
        let board = self.leaderboard(ctx, query).await?;

        let value = board
            .get(&best.orchestrator)
            .and_then(|regions| regions.get(&best.region))
            .map(|score| score.total_score)
            .unwrap_or_else(|| {
                tracing::warn!(
                    orchestrator,
                    region = %best.region,
                    "Best region missing from model leaderboard, scoring 0",
                );
                0.0
            });

        Ok(Some(Score {
            orchestrator: best.orchestrator,
            region: best.region,
            value,
            model,
            pipeline,
        }))
    }

    /// Raw entries for one orchestrator, newest first unless the query
    /// sorts otherwise.
    pub async fn raw_stats(
        &self,
        ctx: &CallContext,
        query: StatsQuery,
    ) -> EngineResult<Vec<StatEntry>> {
        require_orchestrator(query.orchestrator().unwrap_or(""))?;
        query.validate()?;
        let entries = ctx
            .bounded("query_raw", self.store.query_raw(&build_raw_query(&query)))
            .await?;
        tracing::debug!(
            orchestrator = query.orchestrator().unwrap_or(""),
            count = entries.len(),
            "Fetched raw stats"
        );
        Ok(entries)
    }

    /// Validate and persist one measurement.
    pub async fn record_stat(&self, ctx: &CallContext, entry: &StatEntry) -> EngineResult<()> {
        entry.validate()?;
        ctx.bounded("insert_stat", self.store.insert_stat(entry)).await?;
        tracing::debug!(
            orchestrator = %entry.orchestrator,
            region = %entry.region,
            job_type = %entry.job_type(),
            "Recorded stat",
        );
        Ok(())
    }
}

fn require_orchestrator(orchestrator: &str) -> Result<&str, CoreError> {
    let trimmed = orchestrator.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("orchestrator required".to_string()));
    }
    Ok(trimmed)
}
