mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use leaderboard_core::error::CoreError;
use leaderboard_core::query::StatsQuery;
use leaderboard_core::stats::{AggregatedStatsRow, JobType, StatEntry};
use leaderboard_engine::{AggregationService, CallContext, EngineError};
use tokio_util::sync::CancellationToken;

use common::{config, ctx, seeded_regions, FlakyStore};

fn service() -> (Arc<FlakyStore>, AggregationService<FlakyStore>) {
    let store = Arc::new(FlakyStore::new(seeded_regions()));
    let service = AggregationService::new(Arc::clone(&store), &config());
    (store, service)
}

fn last_day() -> StatsQuery {
    StatsQuery::lookback(chrono::Duration::hours(24))
}

async fn record_all(service: &AggregationService<FlakyStore>, entries: &[StatEntry]) {
    for entry in entries {
        service.record_stat(&ctx(), entry).await.unwrap();
    }
}

// ---------------------------------------------------------------------------
// End-to-end scoring
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transcoding_entry_scores_by_segment_ratio() {
    let (_store, service) = service();
    record_all(
        &service,
        &[StatEntry::transcoding("0xabc", "MDW", 1.0, 0.635, 2.08, Utc::now())],
    )
    .await;

    let board = service.leaderboard(&ctx(), last_day()).await.unwrap();
    let score = board["0xabc"]["MDW"];
    let expected = 1.0 - (-2.08f64 / 0.635).exp();
    assert!((score.round_trip_score - expected).abs() < 1e-12);
    assert!((score.total_score - expected).abs() < 1e-12);
    assert!((score.total_score - 0.9622).abs() < 1e-3);
}

#[tokio::test]
async fn lower_ai_latency_scores_higher() {
    let (_store, service) = service();
    let now = Utc::now();
    record_all(
        &service,
        &[
            StatEntry::ai("0xabc", "MDW", "text-to-image", "sdxl", 1.0, 0.1, now),
            StatEntry::ai("0xabc", "LAX", "text-to-image", "sdxl", 1.0, 24.1, now),
        ],
    )
    .await;

    let query = last_day().with_model("sdxl").with_pipeline("text-to-image");
    let stats = service.aggregate(&ctx(), query.clone()).await.unwrap();
    let median = stats.median_rtt.unwrap();
    assert!((median - 12.1).abs() < 1e-9);

    let board = service.leaderboard(&ctx(), query).await.unwrap();
    let fast = board["0xabc"]["MDW"];
    let slow = board["0xabc"]["LAX"];
    assert!(fast.total_score > slow.total_score);
    assert!((fast.total_score - 0.999355).abs() < 1e-5);
    assert!((slow.total_score - 0.874413).abs() < 1e-5);
}

#[tokio::test]
async fn ai_rows_without_successful_entries_cannot_be_scored() {
    let (_store, service) = service();
    record_all(
        &service,
        &[StatEntry::ai("0xabc", "MDW", "text-to-image", "sdxl", 0.5, 1.0, Utc::now())],
    )
    .await;

    let query = last_day().with_model("sdxl").with_pipeline("text-to-image");
    let stats = service.aggregate(&ctx(), query.clone()).await.unwrap();
    assert!(stats.has_results());
    assert_eq!(stats.median_rtt, None);

    assert_matches!(
        service.leaderboard(&ctx(), query).await,
        Err(EngineError::Core(CoreError::PreconditionViolated(_)))
    );
}

// ---------------------------------------------------------------------------
// aggregate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_window_returns_no_rows() {
    let (_store, service) = service();
    let stats = service.aggregate(&ctx(), last_day()).await.unwrap();
    assert!(!stats.has_results());
    assert_eq!(stats.median_rtt, None);
}

#[tokio::test]
async fn half_specified_ai_query_is_a_caller_error() {
    let (store, service) = service();
    store.set_failing(true);

    let err = service
        .aggregate(&ctx(), last_day().with_model("sdxl"))
        .await
        .unwrap_err();
    assert!(err.is_caller_error());
    assert_matches!(
        err,
        EngineError::Core(CoreError::Validation(msg)) if msg == "pipeline required"
    );
}

#[tokio::test]
async fn contradictory_job_type_rejected() {
    let (_store, service) = service();
    let query = last_day().with_job_type(JobType::Ai);
    assert_matches!(
        service.aggregate(&ctx(), query).await,
        Err(EngineError::Core(CoreError::ConflictingJobType {
            requested: JobType::Ai,
            inferred: JobType::Transcoding,
        }))
    );
}

#[tokio::test]
async fn unset_job_type_excludes_ai_rows() {
    let (_store, service) = service();
    let now = Utc::now();
    record_all(
        &service,
        &[
            StatEntry::transcoding("0xabc", "MDW", 1.0, 0.5, 2.0, now),
            StatEntry::ai("0xdef", "MDW", "text-to-image", "sdxl", 1.0, 0.2, now),
        ],
    )
    .await;

    let stats = service.aggregate(&ctx(), last_day()).await.unwrap();
    assert_eq!(stats.rows.len(), 1);
    assert_eq!(stats.rows[0].orchestrator, "0xabc");
}

#[tokio::test]
async fn window_bounds_are_inclusive() {
    let (_store, service) = service();
    let until = Utc::now();
    let since = until - chrono::Duration::hours(6);
    let tick = chrono::Duration::milliseconds(1);
    record_all(
        &service,
        &[
            StatEntry::transcoding("0xabc", "MDW", 1.0, 0.5, 2.0, since),
            StatEntry::transcoding("0xabc", "LAX", 1.0, 0.5, 2.0, until),
            StatEntry::transcoding("0xout", "MDW", 1.0, 0.5, 2.0, since - tick),
            StatEntry::transcoding("0xout", "LAX", 1.0, 0.5, 2.0, until + tick),
        ],
    )
    .await;

    let stats = service
        .aggregate(&ctx(), StatsQuery::new(since, until))
        .await
        .unwrap();
    assert_eq!(stats.rows.len(), 2);
    assert!(stats.rows.iter().all(|row| row.orchestrator == "0xabc"));
    let mut regions: Vec<_> = stats.rows.iter().map(|row| row.region.as_str()).collect();
    regions.sort();
    assert_eq!(regions, ["LAX", "MDW"]);
}

#[tokio::test]
async fn median_follows_row_filters() {
    let (_store, service) = service();
    let now = Utc::now();
    record_all(
        &service,
        &[
            StatEntry::ai("0xabc", "MDW", "text-to-image", "sdxl", 1.0, 1.0, now),
            StatEntry::ai("0xabc", "LAX", "text-to-image", "sdxl", 1.0, 9.0, now),
        ],
    )
    .await;

    let query = last_day()
        .with_model("sdxl")
        .with_pipeline("text-to-image")
        .with_region("LAX");
    let stats = service.aggregate(&ctx(), query).await.unwrap();
    assert_eq!(stats.rows.len(), 1);
    assert_eq!(stats.median_rtt, Some(9.0));
}

#[tokio::test]
async fn store_failure_is_upstream() {
    let (store, service) = service();
    store.set_failing(true);
    let err = service.aggregate(&ctx(), last_day()).await.unwrap_err();
    assert!(!err.is_caller_error());
    assert_matches!(err, EngineError::Upstream { operation: "query_aggregated", .. });
}

#[tokio::test(start_paused = true)]
async fn slow_store_times_out() {
    let (store, service) = service();
    store.set_delay(Duration::from_secs(30));
    assert_matches!(
        service.aggregate(&ctx(), last_day()).await,
        Err(EngineError::Timeout { operation: "query_aggregated", .. })
    );
}

#[tokio::test]
async fn cancelled_call_aborts() {
    let (_store, service) = service();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = CallContext::with_cancellation(Duration::from_secs(8), token);
    assert_matches!(
        service.aggregate(&ctx, last_day()).await,
        Err(EngineError::Cancelled { .. })
    );
}

// ---------------------------------------------------------------------------
// best_region / top_ai_score
// ---------------------------------------------------------------------------

#[tokio::test]
async fn best_region_none_without_ai_activity() {
    let (_store, service) = service();
    record_all(
        &service,
        &[StatEntry::transcoding("0xabc", "MDW", 1.0, 0.5, 2.0, Utc::now())],
    )
    .await;
    assert_eq!(service.best_region(&ctx(), "0xabc").await.unwrap(), None);
}

#[tokio::test]
async fn best_region_prefers_success_then_latency() {
    let (_store, service) = service();
    let now = Utc::now();
    record_all(
        &service,
        &[
            StatEntry::ai("0xabc", "MDW", "text-to-image", "sdxl", 0.9, 0.1, now),
            StatEntry::ai("0xabc", "LAX", "text-to-image", "sdxl", 1.0, 0.8, now),
            StatEntry::ai("0xabc", "LAX", "audio-to-text", "whisper", 1.0, 0.4, now),
            StatEntry::ai("0xdef", "MDW", "text-to-image", "sdxl", 1.0, 0.05, now),
        ],
    )
    .await;

    let best = service.best_region(&ctx(), "0xabc").await.unwrap().unwrap();
    assert_eq!(best.orchestrator, "0xabc");
    assert_eq!(best.region, "LAX");
    assert_eq!(best.pipeline.as_deref(), Some("audio-to-text"));
}

#[tokio::test]
async fn best_region_requires_orchestrator() {
    let (_store, service) = service();
    let err = service.best_region(&ctx(), "  ").await.unwrap_err();
    assert!(err.is_caller_error());
}

#[tokio::test]
async fn best_region_rejects_multiple_rows() {
    let (store, service) = service();
    let row = AggregatedStatsRow {
        orchestrator: "0xabc".to_string(),
        region: "MDW".to_string(),
        model: Some("sdxl".to_string()),
        pipeline: Some("text-to-image".to_string()),
        success_rate: 1.0,
        seg_duration: 0.0,
        round_trip_time: 0.2,
    };
    store.set_canned_rows(vec![row.clone(), row]);

    assert_matches!(
        service.best_region(&ctx(), "0xabc").await,
        Err(EngineError::Core(CoreError::InternalConsistency(_)))
    );
}

#[tokio::test]
async fn top_ai_score_uses_model_leaderboard() {
    let (_store, service) = service();
    let now = Utc::now();
    record_all(
        &service,
        &[
            StatEntry::ai("0xabc", "MDW", "text-to-image", "sdxl", 1.0, 0.5, now),
            StatEntry::ai("0xabc", "LAX", "text-to-image", "sdxl", 1.0, 2.0, now),
            StatEntry::ai("0xdef", "MDW", "text-to-image", "sdxl", 1.0, 1.0, now),
        ],
    )
    .await;

    let score = service.top_ai_score(&ctx(), "0xabc").await.unwrap().unwrap();
    assert_eq!(score.region, "MDW");
    assert_eq!(score.model, "sdxl");
    assert_eq!(score.pipeline, "text-to-image");

    let board = service
        .leaderboard(&ctx(), last_day().with_model("sdxl").with_pipeline("text-to-image"))
        .await
        .unwrap();
    assert_eq!(score.value, board["0xabc"]["MDW"].total_score);
}

#[tokio::test]
async fn top_ai_score_none_without_activity() {
    let (_store, service) = service();
    assert_eq!(service.top_ai_score(&ctx(), "0xabc").await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// record_stat / raw_stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_entry_never_reaches_store() {
    let (store, service) = service();
    let mut entry = StatEntry::transcoding("0xabc", "MDW", 1.0, 0.5, 2.0, Utc::now());
    entry.success_rate = 2.0;

    let err = service.record_stat(&ctx(), &entry).await.unwrap_err();
    assert!(err.is_caller_error());
    assert_eq!(store.inner.entry_count().await, 0);
}

#[tokio::test]
async fn unregistered_region_is_upstream_error() {
    let (_store, service) = service();
    let entry = StatEntry::transcoding("0xabc", "FRA", 1.0, 0.5, 2.0, Utc::now());
    assert_matches!(
        service.record_stat(&ctx(), &entry).await,
        Err(EngineError::Upstream { operation: "insert_stat", .. })
    );
}

#[tokio::test]
async fn raw_stats_requires_orchestrator() {
    let (_store, service) = service();
    let err = service.raw_stats(&ctx(), last_day()).await.unwrap_err();
    assert!(err.is_caller_error());
}

#[tokio::test]
async fn raw_stats_newest_first() {
    let (_store, service) = service();
    let now = Utc::now();
    let half_hour_ago = now - chrono::Duration::minutes(30);
    record_all(
        &service,
        &[
            StatEntry::transcoding("0xabc", "MDW", 1.0, 0.5, 2.0, half_hour_ago),
            StatEntry::transcoding("0xabc", "LAX", 1.0, 0.5, 2.0, now),
            StatEntry::transcoding("0xdef", "LAX", 1.0, 0.5, 2.0, now),
        ],
    )
    .await;

    let entries = service
        .raw_stats(&ctx(), last_day().with_orchestrator("0xabc"))
        .await
        .unwrap();
    let regions: Vec<&str> = entries.iter().map(|e| e.region.as_str()).collect();
    assert_eq!(regions, vec!["LAX", "MDW"]);
}
