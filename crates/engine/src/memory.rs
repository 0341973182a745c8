//! In-process [`StatsStore`].
//!
//! Evaluates the same query descriptors the PostgreSQL backend renders to
//! SQL: absent measurements average as zero, the median is a continuous
//! 50th percentile, and stats are only accepted for registered regions.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use leaderboard_core::percentile::median;
use leaderboard_core::query::{
    Predicate, QueryDescriptor, SortDirective, SortOrder, StatField, StatsQuery,
};
use leaderboard_core::stats::{
    AggregatedStatsRow, InsertCounts, JobType, Pipeline, Region, StatEntry,
};
use leaderboard_core::store::StatsStore;
use leaderboard_core::types::Timestamp;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum MemoryStoreError {
    #[error("Region {region} is not registered for {job_type} work")]
    UnknownRegion { region: String, job_type: JobType },
}

#[derive(Default)]
struct Tables {
    entries: Vec<StatEntry>,
    regions: Vec<Region>,
}

#[derive(Default)]
pub struct MemoryStatsStore {
    tables: RwLock<Tables>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with regions.
    pub fn with_regions(regions: Vec<Region>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                entries: Vec::new(),
                regions,
            }),
        }
    }

    pub async fn entry_count(&self) -> usize {
        self.tables.read().await.entries.len()
    }
}

// ---------------------------------------------------------------------------
// Field access and sorting
// ---------------------------------------------------------------------------

/// A field value as seen by predicates and sort directives.
enum FieldValue<'a> {
    Text(Option<&'a str>),
    Number(f64),
    Time(Timestamp),
}

impl FieldValue<'_> {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

fn entry_value(entry: &StatEntry, field: StatField) -> FieldValue<'_> {
    match field {
        StatField::Orchestrator => FieldValue::Text(Some(entry.orchestrator.as_str())),
        StatField::Region => FieldValue::Text(Some(entry.region.as_str())),
        StatField::JobType => FieldValue::Text(Some(entry.job_type().as_str())),
        StatField::Model => FieldValue::Text(entry.model.as_deref()),
        StatField::Pipeline => FieldValue::Text(entry.pipeline.as_deref()),
        StatField::SuccessRate => FieldValue::Number(entry.success_rate),
        StatField::SegDuration => FieldValue::Number(entry.seg_duration),
        StatField::RoundTripTime => FieldValue::Number(entry.round_trip_time),
        StatField::Timestamp => FieldValue::Time(entry.timestamp),
    }
}

fn satisfies(entry: &StatEntry, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|predicate| match predicate {
        Predicate::TimestampFrom(ts) => entry.timestamp >= *ts,
        Predicate::TimestampUntil(ts) => entry.timestamp <= *ts,
        Predicate::Equals(field, expected) => {
            matches!(entry_value(entry, *field), FieldValue::Text(Some(v)) if v == expected)
        }
        Predicate::FullSuccess => entry.success_rate == 1.0,
        Predicate::NonZero(field) => match entry_value(entry, *field) {
            FieldValue::Number(v) => v != 0.0,
            _ => true,
        },
    })
}

fn sort_by_directives<T>(
    items: &mut [T],
    directives: &[SortDirective],
    value: impl for<'a> Fn(&'a T, StatField) -> FieldValue<'a>,
) {
    items.sort_by(|a, b| {
        for directive in directives {
            let ordering = value(a, directive.field).compare(&value(b, directive.field));
            let ordering = match directive.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Running sums for one group.
struct Group {
    key: Vec<Option<String>>,
    sums: Vec<f64>,
    count: usize,
    latest: Timestamp,
}

impl Group {
    fn key_text(&self, group_by: &[StatField], field: StatField) -> Option<&str> {
        group_by
            .iter()
            .position(|f| *f == field)
            .and_then(|i| self.key[i].as_deref())
    }

    fn mean(&self, averages: &[StatField], field: StatField) -> f64 {
        averages
            .iter()
            .position(|f| *f == field)
            .map(|i| self.sums[i] / self.count as f64)
            .unwrap_or(0.0)
    }
}

fn group_entries<'a>(
    entries: impl Iterator<Item = &'a StatEntry>,
    descriptor: &QueryDescriptor,
) -> Vec<Group> {
    let mut groups: BTreeMap<Vec<Option<String>>, Group> = BTreeMap::new();

    for entry in entries {
        let key: Vec<Option<String>> = descriptor
            .group_by
            .iter()
            .map(|field| match entry_value(entry, *field) {
                FieldValue::Text(v) => v.filter(|s| !s.is_empty()).map(str::to_string),
                FieldValue::Number(v) => Some(v.to_string()),
                FieldValue::Time(v) => Some(v.to_rfc3339()),
            })
            .collect();

        let group = groups.entry(key.clone()).or_insert_with(|| Group {
            key,
            sums: vec![0.0; descriptor.averages.len()],
            count: 0,
            latest: entry.timestamp,
        });
        for (sum, field) in group.sums.iter_mut().zip(&descriptor.averages) {
            if let FieldValue::Number(v) = entry_value(entry, *field) {
                *sum += v;
            }
        }
        group.count += 1;
        group.latest = group.latest.max(entry.timestamp);
    }
    groups.into_values().collect()
}

fn group_value<'a>(
    group: &'a Group,
    descriptor: &QueryDescriptor,
    field: StatField,
) -> FieldValue<'a> {
    match field {
        StatField::Timestamp => FieldValue::Time(group.latest),
        f if f.is_measurement() => FieldValue::Number(group.mean(&descriptor.averages, f)),
        f => FieldValue::Text(group.key_text(&descriptor.group_by, f)),
    }
}

fn apply_limit<T>(items: &mut Vec<T>, limit: Option<u32>) {
    if let Some(limit) = limit {
        items.truncate(limit as usize);
    }
}

// ---------------------------------------------------------------------------
// StatsStore
// ---------------------------------------------------------------------------

impl StatsStore for MemoryStatsStore {
    type Error = MemoryStoreError;

    async fn insert_stat(&self, entry: &StatEntry) -> Result<(), Self::Error> {
        let mut tables = self.tables.write().await;
        let job_type = entry.job_type();
        let known = tables
            .regions
            .iter()
            .any(|r| r.name == entry.region && r.job_type == job_type);
        if !known {
            return Err(MemoryStoreError::UnknownRegion {
                region: entry.region.clone(),
                job_type,
            });
        }
        tables.entries.push(entry.clone());
        Ok(())
    }

    async fn query_aggregated(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<Vec<AggregatedStatsRow>, Self::Error> {
        let tables = self.tables.read().await;
        let matching = tables
            .entries
            .iter()
            .filter(|e| satisfies(e, &descriptor.predicates));
        let mut groups = group_entries(matching, descriptor);
        drop(tables);

        sort_by_directives(&mut groups, &descriptor.order_by, |g, f| {
            group_value(g, descriptor, f)
        });
        apply_limit(&mut groups, descriptor.limit);

        let text = |g: &Group, f| g.key_text(&descriptor.group_by, f).map(str::to_string);
        Ok(groups
            .iter()
            .map(|g| AggregatedStatsRow {
                orchestrator: text(g, StatField::Orchestrator).unwrap_or_default(),
                region: text(g, StatField::Region).unwrap_or_default(),
                model: text(g, StatField::Model),
                pipeline: text(g, StatField::Pipeline),
                success_rate: g.mean(&descriptor.averages, StatField::SuccessRate),
                seg_duration: g.mean(&descriptor.averages, StatField::SegDuration),
                round_trip_time: g.mean(&descriptor.averages, StatField::RoundTripTime),
            })
            .collect())
    }

    async fn query_median_rtt(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<Option<f64>, Self::Error> {
        let tables = self.tables.read().await;
        let values: Vec<f64> = tables
            .entries
            .iter()
            .filter(|e| satisfies(e, &descriptor.predicates))
            .map(|e| e.round_trip_time)
            .collect();
        Ok(median(&values))
    }

    async fn query_raw(&self, descriptor: &QueryDescriptor) -> Result<Vec<StatEntry>, Self::Error> {
        let tables = self.tables.read().await;
        let mut entries: Vec<StatEntry> = tables
            .entries
            .iter()
            .filter(|e| satisfies(e, &descriptor.predicates))
            .cloned()
            .collect();
        drop(tables);

        sort_by_directives(&mut entries, &descriptor.order_by, entry_value);
        apply_limit(&mut entries, descriptor.limit);
        Ok(entries)
    }

    async fn query_regions(&self) -> Result<Vec<Region>, Self::Error> {
        Ok(self.tables.read().await.regions.clone())
    }

    async fn insert_regions(&self, regions: &[Region]) -> InsertCounts {
        let mut tables = self.tables.write().await;
        let mut counts = InsertCounts::default();
        for region in regions {
            counts.processed += 1;
            if region.job_type == JobType::Unknown {
                tracing::error!(region = %region.name, "Region has no job type, skipping");
                continue;
            }
            let exists = tables
                .regions
                .iter()
                .any(|r| r.name == region.name && r.job_type == region.job_type);
            if !exists {
                tables.regions.push(region.clone());
                counts.inserted += 1;
            }
        }
        counts
    }

    async fn query_pipelines(&self, query: &StatsQuery) -> Result<Vec<Pipeline>, Self::Error> {
        let tables = self.tables.read().await;
        let mut found: BTreeMap<String, (BTreeSet<String>, BTreeSet<String>)> = BTreeMap::new();

        for entry in &tables.entries {
            if entry.timestamp < query.since || entry.timestamp > query.until {
                continue;
            }
            if query.region().is_some_and(|r| r != entry.region) {
                continue;
            }
            let (Some(pipeline), Some(model)) =
                (entry.pipeline.as_deref(), entry.model.as_deref())
            else {
                continue;
            };
            let (models, regions) = found.entry(pipeline.to_string()).or_default();
            models.insert(model.to_string());
            regions.insert(entry.region.clone());
        }

        Ok(found
            .into_iter()
            .map(|(name, (models, regions))| Pipeline {
                name,
                models: models.into_iter().collect(),
                regions: regions.into_iter().collect(),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
