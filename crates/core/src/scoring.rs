//! Leaderboard scoring: success rate and latency folded into one score.
//!
//! Transcoding and AI work are scored differently:
//!
//! - **Transcoding** compares segment duration to round-trip time. The
//!   ratio is compressed with `1 - e^(-x)` and multiplied by the success
//!   rate, so either factor at zero zeroes the score.
//! - **AI** has no natural duration to compare against, so the RTT score is
//!   an exponential decay calibrated so the window's median RTT maps to
//!   [`DESIRED_SCORE_AT_MEDIAN`]. It is combined additively with the
//!   success rate using [`WEIGHT_SUCCESS`] and [`WEIGHT_RTT`].
//!
//! Historical leaderboards depend on these exact constants and formulas.

use std::f64::consts::E;

use crate::error::CoreError;
use crate::stats::{AggregatedStatsRow, JobType, NormalizedScore};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// RTT score an AI row receives when its RTT equals the window median.
/// The median is used as the anchor because it resists outliers.
pub const DESIRED_SCORE_AT_MEDIAN: f64 = 0.8;

/// Weight of the success rate in the AI total score.
pub const WEIGHT_SUCCESS: f64 = 0.65;

/// Weight of the RTT score in the AI total score.
pub const WEIGHT_RTT: f64 = 0.35;

// ---------------------------------------------------------------------------
// Transcoding
// ---------------------------------------------------------------------------

/// Raw transcoding latency ratio: seconds of video delivered per second of
/// round trip. Zero when no round trip was measured.
pub fn transcoding_latency_ratio(seg_duration: f64, round_trip_time: f64) -> f64 {
    if round_trip_time == 0.0 {
        return 0.0;
    }
    seg_duration / round_trip_time
}

/// Compress a non-negative ratio into `[0, 1)` with diminishing returns.
pub fn normalize_latency_ratio(ratio: f64) -> f64 {
    1.0 - E.powf(-ratio)
}

// ---------------------------------------------------------------------------
// AI
// ---------------------------------------------------------------------------

/// Exponential-decay RTT score `e^(-k * rtt)` with
/// `k = -ln(DESIRED_SCORE_AT_MEDIAN) / median_rtt`.
///
/// `median_rtt` must be a positive, finite number; anything else cannot
/// calibrate the curve and is rejected.
pub fn ai_rtt_score(round_trip_time: f64, median_rtt: f64) -> Result<f64, CoreError> {
    if !median_rtt.is_finite() || median_rtt <= 0.0 {
        return Err(CoreError::PreconditionViolated(format!(
            "AI scoring requires a positive median RTT, got {median_rtt}"
        )));
    }
    let k = -DESIRED_SCORE_AT_MEDIAN.ln() / median_rtt;
    Ok((-k * round_trip_time).exp())
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Combine success rate and RTT score according to the job type.
pub fn total_score(job_type: JobType, success_rate: f64, rtt_score: f64) -> f64 {
    if success_rate == 0.0 {
        return 0.0;
    }
    match job_type {
        JobType::Ai => WEIGHT_SUCCESS * success_rate + WEIGHT_RTT * rtt_score,
        JobType::Transcoding | JobType::Unknown => success_rate * rtt_score,
    }
}

/// RTT score of a row. `median_rtt` is only consulted for AI rows.
pub fn rtt_score(row: &AggregatedStatsRow, median_rtt: Option<f64>) -> Result<f64, CoreError> {
    match row.job_type() {
        JobType::Ai => {
            let median = median_rtt.ok_or_else(|| {
                CoreError::PreconditionViolated(
                    "AI scoring requires a median RTT but none was measured in the window"
                        .to_string(),
                )
            })?;
            ai_rtt_score(row.round_trip_time, median)
        }
        JobType::Transcoding | JobType::Unknown => Ok(normalize_latency_ratio(
            transcoding_latency_ratio(row.seg_duration, row.round_trip_time),
        )),
    }
}

/// Score one aggregated row against the window's median RTT.
///
/// Rows that never succeeded short-circuit to zero without touching the
/// RTT, so they need no median.
pub fn score_row(
    row: &AggregatedStatsRow,
    median_rtt: Option<f64>,
) -> Result<NormalizedScore, CoreError> {
    if row.success_rate == 0.0 {
        return Ok(NormalizedScore {
            success_rate: 0.0,
            round_trip_score: 0.0,
            total_score: 0.0,
        });
    }
    let round_trip_score = rtt_score(row, median_rtt)?;
    Ok(NormalizedScore {
        success_rate: row.success_rate,
        round_trip_score,
        total_score: total_score(row.job_type(), row.success_rate, round_trip_score),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
