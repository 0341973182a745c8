//! Nesting of scored rows into the orchestrator → region leaderboard.

use std::collections::BTreeMap;

use leaderboard_core::scoring::score_row;
use leaderboard_core::stats::{AggregatedStatsRow, NormalizedScore};

use crate::error::EngineResult;

/// Orchestrator → region → score. Ordered maps keep the output independent
/// of row order.
pub type Leaderboard = BTreeMap<String, BTreeMap<String, NormalizedScore>>;

/// Score every row against the window's median RTT and nest the results.
///
/// One entry per (orchestrator, region). When two rows share that key (a
/// multi-model orchestrator in an unfiltered AI query) the later row wins.
pub fn assemble(rows: &[AggregatedStatsRow], median_rtt: Option<f64>) -> EngineResult<Leaderboard> {
    let mut leaderboard = Leaderboard::new();

    for row in rows {
        let score = score_row(row, median_rtt)?;
        let regions = leaderboard.entry(row.orchestrator.clone()).or_default();
        if regions.insert(row.region.clone(), score).is_some() {
            tracing::warn!(
                orchestrator = %row.orchestrator,
                region = %row.region,
                model = row.model.as_deref().unwrap_or(""),
                pipeline = row.pipeline.as_deref().unwrap_or(""),
                "Duplicate leaderboard row, keeping the last one",
            );
        }
    }
    Ok(leaderboard)
}
