//! Row types returned by the leaderboard queries.
//!
//! Each record converts into its domain type in `leaderboard-core`.

use leaderboard_core::stats::{AggregatedStatsRow, JobType, Pipeline, Region};
use serde::Serialize;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// One grouped row of the `event_details` aggregation.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AggregatedStatsRecord {
    pub orchestrator: String,
    pub region: String,
    pub job_type: String,
    pub model: Option<String>,
    pub pipeline: Option<String>,
    pub success_rate: f64,
    pub seg_duration: f64,
    pub round_trip_time: f64,
}

impl From<AggregatedStatsRecord> for AggregatedStatsRow {
    fn from(record: AggregatedStatsRecord) -> Self {
        Self {
            orchestrator: record.orchestrator,
            region: record.region,
            model: record.model,
            pipeline: record.pipeline,
            success_rate: record.success_rate,
            seg_duration: record.seg_duration,
            round_trip_time: record.round_trip_time,
        }
    }
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// A row of `regions` joined with its job type name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RegionRecord {
    pub name: String,
    pub display_name: String,
    pub job_type: String,
}

impl From<RegionRecord> for Region {
    fn from(record: RegionRecord) -> Self {
        Self {
            name: record.name,
            display_name: record.display_name,
            // The job_types table only holds known names; anything else
            // would be a schema drift and is reported as unknown.
            job_type: record.job_type.parse().unwrap_or(JobType::Unknown),
        }
    }
}

/// A pipeline with the distinct models and regions it was observed with.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PipelineRecord {
    pub pipeline: String,
    pub models: Vec<String>,
    pub regions: Vec<String>,
}

impl From<PipelineRecord> for Pipeline {
    fn from(record: PipelineRecord) -> Self {
        Self {
            name: record.pipeline,
            models: record.models,
            regions: record.regions,
        }
    }
}
