//! Switchyard Query - Metrics SQL Generation
//!
//! Emits parameterized, time-bucketed aggregation SQL from a closed set
//! of metric primitives, against whichever call table the resolver
//! designated. Pure generation: nothing here talks to the store.

pub mod builder;

pub use builder::{build_metrics_query, MetricsQuery, SqlValue};
