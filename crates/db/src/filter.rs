//! Rendering of [`QueryDescriptor`]s into parameterized SQL.
//!
//! Field names come from the closed [`StatField`] enum and map to fixed
//! column names of the `event_details` view. Every caller-supplied value
//! becomes a numbered placeholder with a matching [`BindValue`].

use leaderboard_core::query::{Predicate, QueryDescriptor, QueryShape, SortDirective, StatField};
use leaderboard_core::types::Timestamp;

/// Typed bind value for dynamically-built stats queries.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    BigInt(i64),
    Text(String),
    Timestamp(Timestamp),
}

/// SQL text plus its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

/// Column of `event_details` backing a field.
fn column(field: StatField) -> &'static str {
    match field {
        StatField::Orchestrator => "orchestrator",
        StatField::Region => "region",
        StatField::JobType => "job_type",
        StatField::Model => "model",
        StatField::Pipeline => "pipeline",
        StatField::SuccessRate => "success_rate",
        StatField::SegDuration => "seg_duration",
        StatField::RoundTripTime => "round_trip_time",
        StatField::Timestamp => "event_time",
    }
}

/// Build the `WHERE` clause for a predicate list.
fn build_where(predicates: &[Predicate], binds: &mut Vec<BindValue>) -> String {
    let mut conditions: Vec<String> = Vec::with_capacity(predicates.len());

    for predicate in predicates {
        match predicate {
            Predicate::TimestampFrom(ts) => {
                binds.push(BindValue::Timestamp(*ts));
                conditions.push(format!("event_time >= ${}", binds.len()));
            }
            Predicate::TimestampUntil(ts) => {
                binds.push(BindValue::Timestamp(*ts));
                conditions.push(format!("event_time <= ${}", binds.len()));
            }
            Predicate::Equals(field, value) => {
                binds.push(BindValue::Text(value.clone()));
                conditions.push(format!("{} = ${}", column(*field), binds.len()));
            }
            Predicate::FullSuccess => conditions.push("success_rate = 1".to_string()),
            Predicate::NonZero(field) => conditions.push(format!("{} <> 0", column(*field))),
        }
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

/// `ORDER BY` target for a directive. Grouped queries sort on the output
/// aliases (the averages), raw queries on the view columns.
fn order_target(shape: QueryShape, directive: &SortDirective) -> String {
    match (shape, directive.field) {
        (QueryShape::Grouped, StatField::Timestamp) => "MAX(event_time)".to_string(),
        (QueryShape::Grouped, field) => field.name().to_string(),
        (_, field) => column(field).to_string(),
    }
}

fn build_tail(descriptor: &QueryDescriptor, binds: &mut Vec<BindValue>) -> String {
    let mut tail = String::new();

    if !descriptor.order_by.is_empty() {
        let order: Vec<String> = descriptor
            .order_by
            .iter()
            .map(|d| format!("{} {}", order_target(descriptor.shape, d), d.order.as_sql()))
            .collect();
        tail.push_str(" ORDER BY ");
        tail.push_str(&order.join(", "));
    }

    if let Some(limit) = descriptor.limit {
        binds.push(BindValue::BigInt(i64::from(limit)));
        tail.push_str(&format!(" LIMIT ${}", binds.len()));
    }
    tail
}

/// Render a descriptor against the `event_details` view.
pub fn render(descriptor: &QueryDescriptor) -> RenderedQuery {
    let mut binds = Vec::new();

    let select = match descriptor.shape {
        QueryShape::Grouped => {
            let mut columns: Vec<String> = descriptor
                .group_by
                .iter()
                .map(|f| column(*f).to_string())
                .collect();
            columns.extend(descriptor.averages.iter().map(|f| {
                format!("AVG(COALESCE({}, 0))::FLOAT8 AS {}", column(*f), f.name())
            }));
            columns.join(", ")
        }
        QueryShape::Median => {
            "PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY round_trip_time)::FLOAT8 AS median_rtt"
                .to_string()
        }
        QueryShape::Raw => "payload".to_string(),
    };

    let mut sql = format!("SELECT {select} FROM event_details");
    sql.push_str(&build_where(&descriptor.predicates, &mut binds));

    if !descriptor.group_by.is_empty() {
        let group: Vec<&str> = descriptor.group_by.iter().map(|f| column(*f)).collect();
        sql.push_str(" GROUP BY ");
        sql.push_str(&group.join(", "));
    }

    sql.push_str(&build_tail(descriptor, &mut binds));
    RenderedQuery { sql, binds }
}

/// Bind a slice of `BindValue` to a sqlx `QueryAs`.
pub fn bind_values<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::BigInt(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}

/// Bind a slice of `BindValue` to a sqlx `QueryScalar`.
pub fn bind_values_scalar<'q, O>(
    mut q: sqlx::query::QueryScalar<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::BigInt(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
