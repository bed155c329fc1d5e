//! Switchyard Core - Routing Value Types
//!
//! Pure data structures with no I/O. All other crates depend on this.
//! This crate contains the facts the control plane routes on: project
//! schema versions, data residence, operator resolution modes, and the
//! metric vocabulary consumed by the query builder.

pub mod config;
pub mod error;
pub mod metrics;
pub mod mode;
pub mod version;

pub use config::RoutingConfig;
pub use error::{
    ConfigError, QueryBuildError, RoutingError, StoreError, SwitchyardError, SwitchyardResult,
};
pub use metrics::{
    Aggregation, CallFilter, Granularity, MetricName, MetricSpec, TimeRange,
};
pub use mode::ResolutionMode;
pub use version::{ProjectDataResidence, ProjectVersion, TablePresence};

use chrono::{DateTime, Utc};

/// Project identifier as carried on every span and routing request.
pub type ProjectId = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Legacy physical table: one sparse row per start/end write, merged at
/// read time.
pub const CALLS_MERGED_TABLE: &str = "calls_merged";

/// Current physical table: the post-migration schema.
pub const CALLS_COMPLETE_TABLE: &str = "calls_complete";

/// Storage-size stats table paired with [`CALLS_MERGED_TABLE`].
pub const CALLS_MERGED_STATS_TABLE: &str = "calls_merged_stats";

/// Storage-size stats table paired with [`CALLS_COMPLETE_TABLE`].
pub const CALLS_COMPLETE_STATS_TABLE: &str = "calls_complete_stats";

/// Map a call table to its paired stats table.
///
/// The stats tables follow the same routing decision as the call tables,
/// so size aggregation reads whichever side is authoritative.
pub fn stats_table_for(call_table: &str) -> &'static str {
    if call_table == CALLS_COMPLETE_TABLE {
        CALLS_COMPLETE_STATS_TABLE
    } else {
        CALLS_MERGED_STATS_TABLE
    }
}
