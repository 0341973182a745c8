//! Telemetry, aggregate, and reference-data models.
//!
//! [`StatEntry`] is the raw per-stream measurement reported by a probe.
//! [`AggregatedStatsRow`] is one grouped row produced by the aggregation
//! query, and [`NormalizedScore`] is the scored view of such a row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Job type
// ---------------------------------------------------------------------------

/// Classification of the work an orchestrator performed for a measurement.
///
/// `Unknown` doubles as the "unset" value on queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    #[default]
    Unknown,
    Transcoding,
    Ai,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Transcoding => "transcoding",
            Self::Ai => "ai",
        }
    }

    /// Classify from the model/pipeline identifiers of an entry or row.
    ///
    /// AI work always names both; anything else is transcoding.
    pub fn classify(model: Option<&str>, pipeline: Option<&str>) -> Self {
        match (non_blank(model), non_blank(pipeline)) {
            (Some(_), Some(_)) => Self::Ai,
            _ => Self::Transcoding,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcoding" => Ok(Self::Transcoding),
            "ai" => Ok(Self::Ai),
            other => Err(CoreError::Validation(format!(
                "Invalid job type \"{other}\" (expected \"transcoding\" or \"ai\")"
            ))),
        }
    }
}

/// Treat empty strings the same as absent identifiers.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Raw stats
// ---------------------------------------------------------------------------

/// Error counter attached to a measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatError {
    pub error_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub count: u32,
}

/// One raw measurement from one orchestrator in one region. Immutable once
/// ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatEntry {
    pub region: String,
    pub orchestrator: String,
    pub success_rate: f64,
    pub round_trip_time: f64,
    #[serde(default)]
    pub errors: Vec<StatError>,
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: Timestamp,

    // Transcoding measurements.
    #[serde(default)]
    pub seg_duration: f64,
    #[serde(default)]
    pub segments_sent: u32,
    #[serde(default)]
    pub segments_received: u32,
    #[serde(default)]
    pub upload_time: f64,
    #[serde(default)]
    pub download_time: f64,
    #[serde(default)]
    pub transcode_time: f64,

    // AI measurements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub model_is_warm: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_parameters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_payload: Option<String>,
}

impl StatEntry {
    /// Minimal transcoding measurement; remaining fields take their defaults.
    pub fn transcoding(
        orchestrator: impl Into<String>,
        region: impl Into<String>,
        success_rate: f64,
        round_trip_time: f64,
        seg_duration: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            region: region.into(),
            orchestrator: orchestrator.into(),
            success_rate,
            round_trip_time,
            errors: Vec::new(),
            timestamp,
            seg_duration,
            segments_sent: 0,
            segments_received: 0,
            upload_time: 0.0,
            download_time: 0.0,
            transcode_time: 0.0,
            model: None,
            model_is_warm: false,
            pipeline: None,
            input_parameters: None,
            response_payload: None,
        }
    }

    /// Minimal AI measurement for `pipeline` running `model`.
    pub fn ai(
        orchestrator: impl Into<String>,
        region: impl Into<String>,
        pipeline: impl Into<String>,
        model: impl Into<String>,
        success_rate: f64,
        round_trip_time: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            model: Some(model.into()),
            pipeline: Some(pipeline.into()),
            ..Self::transcoding(orchestrator, region, success_rate, round_trip_time, 0.0, timestamp)
        }
    }

    pub fn job_type(&self) -> JobType {
        JobType::classify(self.model.as_deref(), self.pipeline.as_deref())
    }

    /// Check the entry is fit for ingestion.
    ///
    /// Rules:
    /// - Orchestrator and region must not be empty.
    /// - Success rate must be within `0.0..=1.0`.
    /// - Timing fields must be finite and non-negative.
    /// - Model and pipeline are either both present or both absent.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.orchestrator.trim().is_empty() {
            return Err(CoreError::Validation(
                "Orchestrator must not be empty".to_string(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(CoreError::Validation("Region must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.success_rate) {
            return Err(CoreError::Validation(format!(
                "Success rate must be between 0 and 1, got {}",
                self.success_rate
            )));
        }
        for (name, value) in [
            ("round_trip_time", self.round_trip_time),
            ("seg_duration", self.seg_duration),
            ("upload_time", self.upload_time),
            ("download_time", self.download_time),
            ("transcode_time", self.transcode_time),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::Validation(format!(
                    "{name} must be a finite, non-negative number of seconds"
                )));
            }
        }
        require_model_and_pipeline(self.model.as_deref(), self.pipeline.as_deref())
    }
}

/// Model and pipeline identify an AI workload together; one without the
/// other is meaningless.
pub(crate) fn require_model_and_pipeline(
    model: Option<&str>,
    pipeline: Option<&str>,
) -> Result<(), CoreError> {
    match (non_blank(model), non_blank(pipeline)) {
        (Some(_), None) => Err(CoreError::Validation("pipeline required".to_string())),
        (None, Some(_)) => Err(CoreError::Validation("model required".to_string())),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// One grouped row: means over every entry sharing
/// (orchestrator, region, model, pipeline) inside the query window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStatsRow {
    pub orchestrator: String,
    pub region: String,
    pub model: Option<String>,
    pub pipeline: Option<String>,
    pub success_rate: f64,
    pub seg_duration: f64,
    pub round_trip_time: f64,
}

impl AggregatedStatsRow {
    pub fn job_type(&self) -> JobType {
        JobType::classify(self.model.as_deref(), self.pipeline.as_deref())
    }
}

/// Result of an aggregation: the grouped rows plus the window's median RTT.
///
/// `median_rtt` is `None` when no successful, nonzero-RTT entry matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedStats {
    pub rows: Vec<AggregatedStatsRow>,
    pub median_rtt: Option<f64>,
}

impl AggregatedStats {
    pub fn has_results(&self) -> bool {
        !self.rows.is_empty()
    }
}

/// Scored view of an aggregated row. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedScore {
    pub success_rate: f64,
    pub round_trip_score: f64,
    #[serde(rename = "score")]
    pub total_score: f64,
}

/// The total score of one orchestrator in one region for a model/pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub orchestrator: String,
    pub region: String,
    pub value: f64,
    pub model: String,
    pub pipeline: String,
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// A deployment region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(rename = "id")]
    pub name: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
}

/// An AI pipeline with the models and regions it has been observed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(rename = "id")]
    pub name: String,
    pub models: Vec<String>,
    pub regions: Vec<String>,
}

/// Outcome of a bulk region insert. Rows that already exist are processed
/// but not inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertCounts {
    pub inserted: usize,
    pub processed: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
