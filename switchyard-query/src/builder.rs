//! Time-bucketed metrics SQL builder.
//!
//! Pure function from a metric request to one parameterized statement.
//! Three logical layers are compiled together:
//!
//! 1. `bucket_series` - a generated series of fixed-width buckets
//!    spanning the whole range, so empty buckets still appear in output.
//! 2. `deduped` - the per-call projection over the routed table. A
//!    logical call may have two physical rows (separate start and end
//!    writes); values coalesce first-non-null per call id. All filters
//!    apply here and only here - filtering the aggregation layer would
//!    double-filter already-aggregated rows.
//! 3. The aggregation layer, LEFT JOINed onto the bucket series so empty
//!    buckets report COUNT 0 and NULL for the other aggregates.

use serde::Serialize;
use switchyard_core::{
    Aggregation, CallFilter, Granularity, MetricName, MetricSpec, QueryBuildError, TimeRange,
    Timestamp,
};

/// One positional SQL parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlValue {
    Text(String),
    TextArray(Vec<String>),
    Timestamp(Timestamp),
    Int(i64),
}

/// A built metrics statement: SQL, positional params, output columns in
/// order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub result_columns: Vec<String>,
    /// The bucket width the statement was built with.
    pub granularity: Granularity,
}

/// The value expression for a metric over one deduplicated call row `d`.
///
/// Rows joined in from an empty bucket are all-NULL, so each expression
/// must be NULL there: COUNT then reports 0 and the other aggregates
/// report NULL instead of fabricating values.
fn value_expr(metric: MetricName) -> &'static str {
    match metric {
        MetricName::LatencyMs => "d.latency_ms",
        MetricName::CallCount => "CASE WHEN d.call_id IS NOT NULL THEN 1 END",
        MetricName::ErrorCount => "CASE WHEN d.error IS NOT NULL THEN 1 END",
    }
}

fn validate(specs: &[MetricSpec], range: &TimeRange) -> Result<Vec<String>, QueryBuildError> {
    if specs.is_empty() {
        return Err(QueryBuildError::EmptySpecs);
    }
    if range.start >= range.end {
        return Err(QueryBuildError::InvalidTimeRange {
            start: range.start.to_rfc3339(),
            end: range.end.to_rfc3339(),
        });
    }

    let mut columns = vec!["bucket_start".to_string()];
    for spec in specs {
        if spec.aggregations.is_empty() && spec.percentiles.is_empty() {
            return Err(QueryBuildError::NoAggregations {
                metric: spec.metric.to_string(),
            });
        }
        for agg in &spec.aggregations {
            push_column(&mut columns, format!("{}_{}", spec.metric, agg.as_str()))?;
        }
        for &p in &spec.percentiles {
            if !(1..=99).contains(&p) {
                return Err(QueryBuildError::InvalidPercentile {
                    metric: spec.metric.to_string(),
                    percentile: p,
                });
            }
            push_column(&mut columns, format!("{}_p{p}", spec.metric))?;
        }
    }
    Ok(columns)
}

fn push_column(columns: &mut Vec<String>, column: String) -> Result<(), QueryBuildError> {
    if columns.contains(&column) {
        return Err(QueryBuildError::DuplicateColumn { column });
    }
    columns.push(column);
    Ok(())
}

/// Build the time-bucketed metrics statement against the resolved table.
///
/// `table` is the routing decision made upstream by the resolver; the
/// builder itself performs no I/O and issues nothing. When `granularity`
/// is unspecified it is auto-selected from the range width.
pub fn build_metrics_query(
    specs: &[MetricSpec],
    range: TimeRange,
    granularity: Option<Granularity>,
    filter: &CallFilter,
    project_id: &str,
    table: &str,
) -> Result<MetricsQuery, QueryBuildError> {
    let result_columns = validate(specs, &range)?;
    let granularity = granularity.unwrap_or_else(|| Granularity::auto_for(&range));

    // Fixed leading params shared by every layer.
    let mut params = vec![
        SqlValue::Timestamp(range.start),
        SqlValue::Timestamp(range.end),
        SqlValue::Int(granularity.as_secs()),
        SqlValue::Text(project_id.to_string()),
    ];
    let step = "make_interval(secs => ($3)::double precision)";

    // Dedup-layer predicates only.
    let mut predicates = vec![
        "project_id = $4".to_string(),
        "started_at >= $1".to_string(),
        "started_at < $2".to_string(),
    ];
    if !filter.op_names.is_empty() {
        params.push(SqlValue::TextArray(filter.op_names.clone()));
        predicates.push(format!("op_name = ANY(${})", params.len()));
    }
    if !filter.trace_ids.is_empty() {
        params.push(SqlValue::TextArray(filter.trace_ids.clone()));
        predicates.push(format!("trace_id = ANY(${})", params.len()));
    }
    if filter.trace_roots_only {
        predicates.push("parent_id IS NULL".to_string());
    }

    let mut select_exprs = vec!["b.bucket_start".to_string()];
    for spec in specs {
        let expr = value_expr(spec.metric);
        for agg in &spec.aggregations {
            let column = format!("{}_{}", spec.metric, agg.as_str());
            select_exprs.push(format!("{}({expr}) AS {column}", agg.sql_fn()));
        }
        for &p in &spec.percentiles {
            let column = format!("{}_p{p}", spec.metric);
            let fraction = f64::from(p) / 100.0;
            select_exprs.push(format!(
                "PERCENTILE_CONT({fraction}) WITHIN GROUP (ORDER BY {expr}) AS {column}"
            ));
        }
    }

    let sql = format!(
        "WITH bucket_series AS ( \
           SELECT bucket_start \
           FROM generate_series($1, $2, {step}) AS bucket_start \
           WHERE bucket_start < $2 \
         ), \
         deduped AS ( \
           SELECT call_id, \
                  MIN(started_at) AS started_at, \
                  MAX(latency_ms) AS latency_ms, \
                  MAX(error) AS error \
           FROM {table} \
           WHERE {predicates} \
           GROUP BY call_id \
         ), \
         bucketed AS ( \
           SELECT date_bin({step}, c.started_at, $1) AS bucket_start, c.* \
           FROM deduped c \
         ) \
         SELECT {select_list} \
         FROM bucket_series b \
         LEFT JOIN bucketed d ON d.bucket_start = b.bucket_start \
         GROUP BY b.bucket_start \
         ORDER BY b.bucket_start",
        predicates = predicates.join(" AND "),
        select_list = select_exprs.join(", "),
    );

    Ok(MetricsQuery {
        sql,
        params,
        result_columns,
        granularity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use switchyard_core::CALLS_COMPLETE_TABLE;

    fn range_of_hours(hours: i64) -> TimeRange {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        TimeRange::new(start, start + Duration::hours(hours))
    }

    fn latency_avg_max() -> Vec<MetricSpec> {
        vec![MetricSpec::new(MetricName::LatencyMs)
            .with_aggregations(&[Aggregation::Avg, Aggregation::Max])]
    }

    #[test]
    fn test_basic_shape_and_params() {
        let query = build_metrics_query(
            &latency_avg_max(),
            range_of_hours(6),
            None,
            &CallFilter::default(),
            "proj-1",
            CALLS_COMPLETE_TABLE,
        )
        .unwrap();

        assert_eq!(query.granularity, Granularity::OneHour);
        assert_eq!(
            query.result_columns,
            vec!["bucket_start", "latency_ms_avg", "latency_ms_max"]
        );
        assert_eq!(query.params.len(), 4);
        assert_eq!(query.params[2], SqlValue::Int(3600));
        assert_eq!(query.params[3], SqlValue::Text("proj-1".to_string()));

        assert!(query.sql.contains("FROM calls_complete"));
        assert!(query.sql.contains("AVG(d.latency_ms) AS latency_ms_avg"));
        assert!(query.sql.contains("MAX(d.latency_ms) AS latency_ms_max"));
        assert!(query.sql.contains("LEFT JOIN bucketed"));
        assert!(query.sql.contains("GROUP BY call_id"));
    }

    #[test]
    fn test_explicit_granularity_overrides_auto() {
        let query = build_metrics_query(
            &latency_avg_max(),
            range_of_hours(6),
            Some(Granularity::FiveMinutes),
            &CallFilter::default(),
            "proj-1",
            CALLS_COMPLETE_TABLE,
        )
        .unwrap();
        assert_eq!(query.granularity, Granularity::FiveMinutes);
        assert_eq!(query.params[2], SqlValue::Int(300));
    }

    #[test]
    fn test_percentiles_and_counts() {
        let specs = vec![
            MetricSpec::new(MetricName::LatencyMs).with_percentiles(&[50, 95]),
            MetricSpec::new(MetricName::CallCount).with_aggregations(&[Aggregation::Count]),
            MetricSpec::new(MetricName::ErrorCount).with_aggregations(&[Aggregation::Sum]),
        ];
        let query = build_metrics_query(
            &specs,
            range_of_hours(1),
            None,
            &CallFilter::default(),
            "proj-1",
            CALLS_COMPLETE_TABLE,
        )
        .unwrap();

        assert_eq!(
            query.result_columns,
            vec![
                "bucket_start",
                "latency_ms_p50",
                "latency_ms_p95",
                "call_count_count",
                "error_count_sum"
            ]
        );
        assert!(query
            .sql
            .contains("PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY d.latency_ms) AS latency_ms_p50"));
        assert!(query
            .sql
            .contains("PERCENTILE_CONT(0.95) WITHIN GROUP (ORDER BY d.latency_ms) AS latency_ms_p95"));
        // Count of a NULL-on-empty-bucket expression reports 0, not 1.
        assert!(query
            .sql
            .contains("COUNT(CASE WHEN d.call_id IS NOT NULL THEN 1 END) AS call_count_count"));
        assert!(query
            .sql
            .contains("SUM(CASE WHEN d.error IS NOT NULL THEN 1 END) AS error_count_sum"));
    }

    #[test]
    fn test_filters_apply_to_dedup_layer_only() {
        let filter = CallFilter {
            op_names: vec!["predict".to_string()],
            trace_ids: vec!["t1".to_string(), "t2".to_string()],
            trace_roots_only: true,
        };
        let query = build_metrics_query(
            &latency_avg_max(),
            range_of_hours(6),
            None,
            &filter,
            "proj-1",
            CALLS_COMPLETE_TABLE,
        )
        .unwrap();

        assert!(query.sql.contains("op_name = ANY($5)"));
        assert!(query.sql.contains("trace_id = ANY($6)"));
        assert!(query.sql.contains("parent_id IS NULL"));
        assert_eq!(
            query.params[4],
            SqlValue::TextArray(vec!["predict".to_string()])
        );
        assert_eq!(
            query.params[5],
            SqlValue::TextArray(vec!["t1".to_string(), "t2".to_string()])
        );

        // Every predicate lives before the aggregation layer starts.
        let agg_start = query.sql.find("bucketed AS").unwrap();
        for needle in ["op_name = ANY", "trace_id = ANY", "parent_id IS NULL"] {
            let pos = query.sql.find(needle).unwrap();
            assert!(pos < agg_start, "{needle} leaked past the dedup layer");
            assert_eq!(query.sql.matches(needle).count(), 1);
        }
    }

    #[test]
    fn test_rejects_empty_specs() {
        let err = build_metrics_query(
            &[],
            range_of_hours(1),
            None,
            &CallFilter::default(),
            "proj-1",
            CALLS_COMPLETE_TABLE,
        )
        .unwrap_err();
        assert_eq!(err, QueryBuildError::EmptySpecs);
    }

    #[test]
    fn test_rejects_spec_without_aggregations_or_percentiles() {
        let err = build_metrics_query(
            &[MetricSpec::new(MetricName::LatencyMs)],
            range_of_hours(1),
            None,
            &CallFilter::default(),
            "proj-1",
            CALLS_COMPLETE_TABLE,
        )
        .unwrap_err();
        assert!(matches!(err, QueryBuildError::NoAggregations { .. }));
    }

    #[test]
    fn test_rejects_out_of_range_percentile() {
        for p in [0, 100, -5, 250] {
            let err = build_metrics_query(
                &[MetricSpec::new(MetricName::LatencyMs).with_percentiles(&[p])],
                range_of_hours(1),
                None,
                &CallFilter::default(),
                "proj-1",
                CALLS_COMPLETE_TABLE,
            )
            .unwrap_err();
            assert!(
                matches!(err, QueryBuildError::InvalidPercentile { percentile, .. } if percentile == p)
            );
        }
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let err = build_metrics_query(
            &[MetricSpec::new(MetricName::LatencyMs)
                .with_aggregations(&[Aggregation::Avg, Aggregation::Avg])],
            range_of_hours(1),
            None,
            &CallFilter::default(),
            "proj-1",
            CALLS_COMPLETE_TABLE,
        )
        .unwrap_err();
        assert!(matches!(err, QueryBuildError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_rejects_inverted_time_range() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let err = build_metrics_query(
            &latency_avg_max(),
            TimeRange::new(start, start - Duration::hours(1)),
            None,
            &CallFilter::default(),
            "proj-1",
            CALLS_COMPLETE_TABLE,
        )
        .unwrap_err();
        assert!(matches!(err, QueryBuildError::InvalidTimeRange { .. }));
    }

    #[test]
    fn test_table_is_interpolated_from_routing_decision() {
        let merged = build_metrics_query(
            &latency_avg_max(),
            range_of_hours(1),
            None,
            &CallFilter::default(),
            "proj-1",
            switchyard_core::CALLS_MERGED_TABLE,
        )
        .unwrap();
        assert!(merged.sql.contains("FROM calls_merged"));
        assert!(!merged.sql.contains("FROM calls_complete"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_valid_percentiles_always_build(ps in proptest::collection::vec(1i32..=99, 1..4)) {
                let mut unique = ps.clone();
                unique.sort_unstable();
                unique.dedup();
                let specs = vec![MetricSpec::new(MetricName::LatencyMs).with_percentiles(&unique)];
                let query = build_metrics_query(
                    &specs,
                    range_of_hours(6),
                    None,
                    &CallFilter::default(),
                    "proj-1",
                    CALLS_COMPLETE_TABLE,
                ).unwrap();
                // bucket_start plus one column per percentile.
                prop_assert_eq!(query.result_columns.len(), unique.len() + 1);
            }

            #[test]
            fn prop_param_placeholders_match_param_count(
                ops in proptest::collection::vec("[a-z]{1,8}", 0..3),
                traces in proptest::collection::vec("[a-z0-9]{4}", 0..3),
                roots in proptest::bool::ANY,
            ) {
                let filter = CallFilter { op_names: ops, trace_ids: traces, trace_roots_only: roots };
                let query = build_metrics_query(
                    &latency_avg_max(),
                    range_of_hours(6),
                    None,
                    &filter,
                    "proj-1",
                    CALLS_COMPLETE_TABLE,
                ).unwrap();
                let max_placeholder = (1..=9)
                    .filter(|i| query.sql.contains(&format!("${i}")))
                    .max()
                    .unwrap();
                prop_assert_eq!(max_placeholder, query.params.len());
            }
        }
    }
}
