//! Switchyard Routing - Tiered Version Resolution and Dual-Write Enforcement
//!
//! Decides which physical call table each project's reads and writes
//! target while the merged-to-complete schema migration is in flight.
//! The resolver composes four lookup tiers behind one entry point; the
//! writer enforces the dual-write contract on every span write.

pub mod dual_write;
pub mod local_cache;
pub mod provider;
pub mod resolver;
pub mod shared_cache;
pub mod store;
pub mod sync_bridge;

pub use dual_write::{plan_write, SpanWriter, WritePlan, WriteSource};
pub use local_cache::LocalVersionCache;
pub use provider::{Lookup, PinSource, RequestContext, SharedCache};
pub use resolver::VersionResolver;
pub use shared_cache::{MemorySharedCache, SharedVersionTier};
pub use store::{AnalyticalStore, MemoryStore, PgStore, SpanRecord, StoreConfig};
pub use sync_bridge::{block_on_routing, SyncResolver};
