//! Stats queries and the backend-agnostic query descriptor builder.
//!
//! A [`StatsQuery`] describes what a caller wants (filters, window, sort,
//! limit). The `build_*` functions turn a validated query into a
//! [`QueryDescriptor`]: a tagged list of predicates plus grouping, ordering,
//! and limit. Backends render descriptors into their own query language and
//! bind every value as a parameter; no caller-supplied text is ever
//! spliced into a statement.

use std::fmt;

use chrono::{Duration, Utc};

use crate::error::CoreError;
use crate::stats::{non_blank, require_model_and_pipeline, JobType};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Fields and sorting
// ---------------------------------------------------------------------------

/// The closed set of stat fields a query may filter, group, or sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatField {
    Orchestrator,
    Region,
    JobType,
    Model,
    Pipeline,
    SuccessRate,
    SegDuration,
    RoundTripTime,
    Timestamp,
}

impl StatField {
    /// Canonical snake_case name, shared by backends as the column or
    /// output alias.
    pub fn name(self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Region => "region",
            Self::JobType => "job_type",
            Self::Model => "model",
            Self::Pipeline => "pipeline",
            Self::SuccessRate => "success_rate",
            Self::SegDuration => "seg_duration",
            Self::RoundTripTime => "round_trip_time",
            Self::Timestamp => "timestamp",
        }
    }

    /// True for the numeric measurement fields.
    pub fn is_measurement(self) -> bool {
        matches!(
            self,
            Self::SuccessRate | Self::SegDuration | Self::RoundTripTime
        )
    }
}

impl fmt::Display for StatField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One `(field, direction)` ordering directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortDirective {
    pub field: StatField,
    pub order: SortOrder,
}

impl SortDirective {
    pub fn asc(field: StatField) -> Self {
        Self {
            field,
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: StatField) -> Self {
        Self {
            field,
            order: SortOrder::Desc,
        }
    }
}

impl fmt::Display for SortDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.order.as_sql())
    }
}

// ---------------------------------------------------------------------------
// StatsQuery
// ---------------------------------------------------------------------------

/// Filter and shape of a stats request. Constructed per request, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsQuery {
    pub orchestrator: Option<String>,
    pub region: Option<String>,
    pub model: Option<String>,
    pub pipeline: Option<String>,
    /// `JobType::Unknown` means "not specified".
    pub job_type: JobType,
    /// Inclusive lower bound.
    pub since: Timestamp,
    /// Inclusive upper bound.
    pub until: Timestamp,
    pub sort: Vec<SortDirective>,
    pub limit: Option<u32>,
}

impl StatsQuery {
    pub fn new(since: Timestamp, until: Timestamp) -> Self {
        Self {
            orchestrator: None,
            region: None,
            model: None,
            pipeline: None,
            job_type: JobType::Unknown,
            since,
            until,
            sort: Vec::new(),
            limit: None,
        }
    }

    /// Window covering the last `window` up to now.
    pub fn lookback(window: Duration) -> Self {
        let until = Utc::now();
        Self::new(until - window, until)
    }

    pub fn with_orchestrator(mut self, orchestrator: impl Into<String>) -> Self {
        self.orchestrator = Some(orchestrator.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    pub fn with_job_type(mut self, job_type: JobType) -> Self {
        self.job_type = job_type;
        self
    }

    pub fn sorted_by(mut self, directive: SortDirective) -> Self {
        self.sort.push(directive);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn orchestrator(&self) -> Option<&str> {
        non_blank(self.orchestrator.as_deref())
    }

    pub fn region(&self) -> Option<&str> {
        non_blank(self.region.as_deref())
    }

    pub fn model(&self) -> Option<&str> {
        non_blank(self.model.as_deref())
    }

    pub fn pipeline(&self) -> Option<&str> {
        non_blank(self.pipeline.as_deref())
    }

    /// Structural checks that hold for every query shape.
    ///
    /// Rules:
    /// - Model and pipeline are co-required.
    /// - The window must not end before it starts.
    pub fn validate(&self) -> Result<(), CoreError> {
        require_model_and_pipeline(self.model(), self.pipeline())?;
        if self.since > self.until {
            return Err(CoreError::Validation(format!(
                "since ({}) must not be after until ({})",
                self.since, self.until
            )));
        }
        Ok(())
    }

    /// Validate the query and settle its job type.
    ///
    /// An unset job type becomes AI when a model or pipeline is named and
    /// transcoding otherwise. An explicit job type that contradicts the
    /// presence or absence of model/pipeline is rejected.
    pub fn normalized(mut self) -> Result<Self, CoreError> {
        self.validate()?;
        let inferred = if self.model().is_some() || self.pipeline().is_some() {
            JobType::Ai
        } else {
            JobType::Transcoding
        };
        match self.job_type {
            JobType::Unknown => self.job_type = inferred,
            requested if requested != inferred => {
                return Err(CoreError::ConflictingJobType {
                    requested,
                    inferred,
                });
            }
            _ => {}
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Query descriptor
// ---------------------------------------------------------------------------

/// A single filter clause. Values are always bound, never interpolated.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `timestamp >= value`
    TimestampFrom(Timestamp),
    /// `timestamp <= value`
    TimestampUntil(Timestamp),
    /// Exact match on a text field.
    Equals(StatField, String),
    /// `success_rate = 1`
    FullSuccess,
    /// `field <> 0`
    NonZero(StatField),
}

/// What the backend should return for a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// One row of means per group.
    Grouped,
    /// Matching entries as stored.
    Raw,
    /// A single 50th-percentile round-trip time.
    Median,
}

/// Backend-agnostic description of one persistence query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub shape: QueryShape,
    pub predicates: Vec<Predicate>,
    pub group_by: Vec<StatField>,
    /// Fields averaged per group (absent values count as 0).
    pub averages: Vec<StatField>,
    pub order_by: Vec<SortDirective>,
    pub limit: Option<u32>,
}

/// Grouping key for leaderboard aggregation.
pub const GROUP_FIELDS: [StatField; 5] = [
    StatField::Orchestrator,
    StatField::Region,
    StatField::JobType,
    StatField::Model,
    StatField::Pipeline,
];

/// Measurements averaged per group.
pub const AVERAGED_FIELDS: [StatField; 3] = [
    StatField::SuccessRate,
    StatField::SegDuration,
    StatField::RoundTripTime,
];

/// Window bounds plus one equality per specified filter.
fn filter_predicates(query: &StatsQuery) -> Vec<Predicate> {
    let mut predicates = vec![
        Predicate::TimestampFrom(query.since),
        Predicate::TimestampUntil(query.until),
    ];

    let text_filters = [
        (StatField::Orchestrator, query.orchestrator()),
        (StatField::Region, query.region()),
        (StatField::Pipeline, query.pipeline()),
        (StatField::Model, query.model()),
    ];
    for (field, value) in text_filters {
        if let Some(value) = value {
            predicates.push(Predicate::Equals(field, value.to_string()));
        }
    }

    if query.job_type != JobType::Unknown {
        predicates.push(Predicate::Equals(
            StatField::JobType,
            query.job_type.as_str().to_string(),
        ));
    }
    predicates
}

/// Grouped leaderboard aggregation: means per
/// (orchestrator, region, job type, model, pipeline), ordered and limited
/// as the query asks.
pub fn build_aggregate_query(query: &StatsQuery) -> QueryDescriptor {
    QueryDescriptor {
        shape: QueryShape::Grouped,
        predicates: filter_predicates(query),
        group_by: GROUP_FIELDS.to_vec(),
        averages: AVERAGED_FIELDS.to_vec(),
        order_by: query.sort.clone(),
        limit: query.limit,
    }
}

/// Median round-trip time over the same filters as the aggregation,
/// restricted to fully successful entries with a measured RTT.
pub fn build_median_query(query: &StatsQuery) -> QueryDescriptor {
    let mut predicates = filter_predicates(query);
    predicates.push(Predicate::FullSuccess);
    predicates.push(Predicate::NonZero(StatField::RoundTripTime));

    QueryDescriptor {
        shape: QueryShape::Median,
        predicates,
        group_by: Vec::new(),
        averages: Vec::new(),
        order_by: Vec::new(),
        limit: None,
    }
}

/// Raw entries, newest first unless the query orders them otherwise.
pub fn build_raw_query(query: &StatsQuery) -> QueryDescriptor {
    let order_by = if query.sort.is_empty() {
        vec![SortDirective::desc(StatField::Timestamp)]
    } else {
        query.sort.clone()
    };

    QueryDescriptor {
        shape: QueryShape::Raw,
        predicates: filter_predicates(query),
        group_by: Vec::new(),
        averages: Vec::new(),
        order_by,
        limit: query.limit,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
