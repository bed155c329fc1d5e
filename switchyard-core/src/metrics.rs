//! Metric vocabulary for the time-bucketed query builder.
//!
//! Request-scoped value types only; nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Timestamp;

/// The closed set of metrics the builder can aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricName {
    /// Wall-clock call latency in milliseconds.
    LatencyMs,
    /// One per logical call.
    CallCount,
    /// One per errored call.
    ErrorCount,
}

impl MetricName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LatencyMs => "latency_ms",
            Self::CallCount => "call_count",
            Self::ErrorCount => "error_count",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-bucket aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl Aggregation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
        }
    }

    /// The SQL aggregate function name.
    pub fn sql_fn(self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Count => "COUNT",
        }
    }
}

/// One requested metric with its aggregations and percentiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub metric: MetricName,
    /// Aggregations to compute per bucket. May be empty if `percentiles`
    /// is non-empty.
    pub aggregations: Vec<Aggregation>,
    /// Percentiles to compute per bucket, each in 1..=99.
    pub percentiles: Vec<i32>,
}

impl MetricSpec {
    pub fn new(metric: MetricName) -> Self {
        Self {
            metric,
            aggregations: Vec::new(),
            percentiles: Vec::new(),
        }
    }

    pub fn with_aggregations(mut self, aggregations: &[Aggregation]) -> Self {
        self.aggregations = aggregations.to_vec();
        self
    }

    pub fn with_percentiles(mut self, percentiles: &[i32]) -> Self {
        self.percentiles = percentiles.to_vec();
        self
    }
}

/// Half-open query window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Window width in whole seconds; zero for inverted ranges.
    pub fn width_secs(&self) -> i64 {
        (self.end - self.start).num_seconds().max(0)
    }
}

/// Fixed bucket widths for time-series aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    FiveMinutes,
    OneHour,
    FourHours,
    OneDay,
    OneWeek,
}

impl Granularity {
    /// Bucket width in seconds.
    pub fn as_secs(self) -> i64 {
        match self {
            Self::FiveMinutes => 300,
            Self::OneHour => 3_600,
            Self::FourHours => 14_400,
            Self::OneDay => 86_400,
            Self::OneWeek => 604_800,
        }
    }

    /// Pick a bucket width from the range width when the caller leaves
    /// granularity unspecified. Wider ranges get coarser buckets so the
    /// bucket count stays bounded.
    pub fn auto_for(range: &TimeRange) -> Self {
        const HOUR: i64 = 3_600;
        match range.width_secs() {
            w if w < 2 * HOUR => Self::FiveMinutes,
            w if w <= 12 * HOUR => Self::OneHour,
            w if w <= 72 * HOUR => Self::FourHours,
            w if w <= 30 * 24 * HOUR => Self::OneDay,
            _ => Self::OneWeek,
        }
    }
}

/// Predicates applied to the per-call deduplication layer only.
///
/// Filters never touch the aggregation layer: filtering already-aggregated
/// rows would double-count the predicate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallFilter {
    /// Allow-list of op names; empty means no op filter.
    pub op_names: Vec<String>,
    /// Allow-list of trace ids; empty means no trace filter.
    pub trace_ids: Vec<String>,
    /// Restrict to trace roots (calls with no parent).
    pub trace_roots_only: bool,
}

impl CallFilter {
    pub fn is_empty(&self) -> bool {
        self.op_names.is_empty() && self.trace_ids.is_empty() && !self.trace_roots_only
    }
}
