//! Synchronous facade over the async resolver.
//!
//! Batched write paths and older call sites are synchronous; the resolver
//! is async. The bridge blocks on a runtime handle, and when the caller
//! is already inside a runtime it must not park the thread driving the
//! event loop: on a multi-thread runtime `block_in_place` hands the
//! worker off to the blocking pool, and on a current-thread runtime
//! (where `block_in_place` panics) the block happens on a short-lived
//! helper thread instead.

use std::future::Future;
use std::sync::Arc;

use switchyard_core::{ProjectVersion, SwitchyardResult};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::provider::PinSource;
use crate::resolver::VersionResolver;
use crate::store::AnalyticalStore;

/// Block the current thread on a future, runtime-aware.
pub fn block_on_routing<F, T>(rt: &Handle, f: F) -> T
where
    F: Future<Output = T> + Send,
    T: Send,
{
    match Handle::try_current() {
        Ok(current) => match current.runtime_flavor() {
            RuntimeFlavor::CurrentThread => {
                std::thread::scope(|s| match s.spawn(|| rt.block_on(f)).join() {
                    Ok(value) => value,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
            }
            _ => tokio::task::block_in_place(|| rt.block_on(f)),
        },
        Err(_) => rt.block_on(f),
    }
}

/// Synchronous resolver facade.
///
/// Holds the runtime handle it blocks on; the async resolver stays the
/// canonical entry point.
pub struct SyncResolver<S: AnalyticalStore> {
    inner: Arc<VersionResolver<S>>,
    rt: Handle,
}

impl<S: AnalyticalStore> SyncResolver<S> {
    pub fn new(inner: Arc<VersionResolver<S>>, rt: Handle) -> Self {
        Self { inner, rt }
    }

    pub fn get_project_version(
        &self,
        project_id: &str,
        ctx: &dyn PinSource,
    ) -> SwitchyardResult<ProjectVersion> {
        block_on_routing(&self.rt, self.inner.get_project_version(project_id, ctx))
    }

    pub fn resolve_read_table(
        &self,
        project_id: &str,
        ctx: &dyn PinSource,
    ) -> SwitchyardResult<&'static str> {
        block_on_routing(&self.rt, self.inner.resolve_read_table(project_id, ctx))
    }

    pub fn resolve_stats_table(
        &self,
        project_id: &str,
        ctx: &dyn PinSource,
    ) -> SwitchyardResult<&'static str> {
        block_on_routing(&self.rt, self.inner.resolve_stats_table(project_id, ctx))
    }

    pub fn invalidate(&self, project_id: &str) {
        self.inner.invalidate(project_id);
    }

    /// The wrapped async resolver.
    pub fn inner(&self) -> &VersionResolver<S> {
        &self.inner
    }
}
