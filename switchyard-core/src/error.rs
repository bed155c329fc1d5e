//! Error types for Switchyard operations

use thiserror::Error;

/// Routing and resolution errors.
///
/// Tier-unavailable conditions (shared cache or config service down) are
/// NOT errors at this level: providers report them as a miss and the
/// resolver advances to the next tier. Only failures that are fatal for a
/// call surface here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Ground-truth lookup failed for project {project_id}: {reason}")]
    GroundTruthUnavailable { project_id: String, reason: String },

    #[error(
        "Dual write incomplete for project {project_id}, call {call_id}: \
         wrote {written} but not {failed}: {reason}"
    )]
    DualWritePartialFailure {
        project_id: String,
        call_id: String,
        written: String,
        failed: String,
        reason: String,
    },

    #[error("Write failed for project {project_id} to {table}: {reason}")]
    WriteFailed {
        project_id: String,
        table: String,
        reason: String,
    },
}

/// Analytical-store client errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection pool error: {reason}")]
    Pool { reason: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Unexpected row shape: {reason}")]
    RowShape { reason: String },

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Query-build validation errors, rejected before any SQL is issued.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryBuildError {
    #[error("No metric specs provided")]
    EmptySpecs,

    #[error("Metric {metric} has no aggregations and no percentiles")]
    NoAggregations { metric: String },

    #[error("Invalid percentile {percentile} for metric {metric}: must be in 1..=99")]
    InvalidPercentile { metric: String, percentile: i32 },

    #[error("Duplicate result column {column}")]
    DuplicateColumn { column: String },

    #[error("Invalid time range: start {start} is not before end {end}")]
    InvalidTimeRange { start: String, end: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unrecognized resolution mode: {value}")]
    InvalidMode { value: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Switchyard errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwitchyardError {
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Query build error: {0}")]
    QueryBuild(#[from] QueryBuildError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Switchyard operations.
pub type SwitchyardResult<T> = Result<T, SwitchyardError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_error_display_ground_truth() {
        let err = RoutingError::GroundTruthUnavailable {
            project_id: "proj-1".to_string(),
            reason: "connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Ground-truth lookup failed"));
        assert!(msg.contains("proj-1"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_routing_error_display_partial_dual_write() {
        let err = RoutingError::DualWritePartialFailure {
            project_id: "proj-1".to_string(),
            call_id: "call-9".to_string(),
            written: "calls_complete".to_string(),
            failed: "calls_merged".to_string(),
            reason: "timeout".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Dual write incomplete"));
        assert!(msg.contains("calls_complete"));
        assert!(msg.contains("calls_merged"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_query_build_error_display_percentile() {
        let err = QueryBuildError::InvalidPercentile {
            metric: "latency_ms".to_string(),
            percentile: 140,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("latency_ms"));
        assert!(msg.contains("140"));
        assert!(msg.contains("1..=99"));
    }

    #[test]
    fn test_config_error_display_invalid_mode() {
        let err = ConfigError::InvalidMode {
            value: "dualwrite".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Unrecognized resolution mode"));
        assert!(msg.contains("dualwrite"));
    }

    #[test]
    fn test_switchyard_error_from_variants() {
        let routing = SwitchyardError::from(RoutingError::GroundTruthUnavailable {
            project_id: "p".to_string(),
            reason: "down".to_string(),
        });
        assert!(matches!(routing, SwitchyardError::Routing(_)));

        let store = SwitchyardError::from(StoreError::Pool {
            reason: "exhausted".to_string(),
        });
        assert!(matches!(store, SwitchyardError::Store(_)));

        let build = SwitchyardError::from(QueryBuildError::EmptySpecs);
        assert!(matches!(build, SwitchyardError::QueryBuild(_)));

        let config = SwitchyardError::from(ConfigError::InvalidMode {
            value: "x".to_string(),
        });
        assert!(matches!(config, SwitchyardError::Config(_)));
    }
}
