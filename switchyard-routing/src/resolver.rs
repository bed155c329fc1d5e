//! Project-version resolver.
//!
//! Composes the lookup tiers into one resolution with an explicit
//! fallthrough order: in-process cache, shared cache, request-scoped pin,
//! ground truth. Mode overrides short-circuit the chain entirely or pin
//! its answer; see [`ResolutionMode`].
//!
//! One resolver is constructed at process start and injected into every
//! request path. Independent resolver instances may transiently disagree
//! within one TTL window; routing only affects where the next write
//! lands, so that relaxation is safe.

use std::sync::Arc;

use switchyard_core::{
    stats_table_for, ProjectVersion, ResolutionMode, RoutingConfig, RoutingError,
    SwitchyardResult, CALLS_MERGED_TABLE,
};

use crate::local_cache::LocalVersionCache;
use crate::provider::{Lookup, PinSource, SharedCache};
use crate::shared_cache::SharedVersionTier;
use crate::store::AnalyticalStore;

/// Tiered project-version resolver.
///
/// Generic over the analytical store so tests can run against
/// [`MemoryStore`](crate::store::MemoryStore) and production against
/// [`PgStore`](crate::store::PgStore).
pub struct VersionResolver<S: AnalyticalStore> {
    mode: ResolutionMode,
    local: LocalVersionCache,
    shared: SharedVersionTier,
    store: Arc<S>,
}

impl<S: AnalyticalStore> VersionResolver<S> {
    pub fn new(config: &RoutingConfig, shared: Arc<dyn SharedCache>, store: Arc<S>) -> Self {
        Self {
            mode: config.mode,
            local: LocalVersionCache::new(config.cache_capacity, config.cache_ttl),
            shared: SharedVersionTier::new(shared, config.shared_cache_enabled),
            store,
        }
    }

    /// The active resolution mode.
    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    /// Resolve the project's schema version.
    ///
    /// `Off` and the `calls_merged` variants answer legacy with zero tier
    /// lookups. `ForceLegacy` runs the full chain so migration progress
    /// stays observable, then answers legacy regardless.
    pub async fn get_project_version(
        &self,
        project_id: &str,
        ctx: &dyn PinSource,
    ) -> SwitchyardResult<ProjectVersion> {
        if !self.mode.consults_tiers() {
            return Ok(ProjectVersion::Legacy);
        }
        let version = self.lookup_chain(project_id, ctx).await?;
        if self.mode == ResolutionMode::ForceLegacy {
            tracing::debug!(
                project_id,
                observed = ?version,
                "force_legacy override, answering legacy"
            );
            return Ok(ProjectVersion::Legacy);
        }
        Ok(version)
    }

    /// Resolve the call table reads should target for this project.
    pub async fn resolve_read_table(
        &self,
        project_id: &str,
        ctx: &dyn PinSource,
    ) -> SwitchyardResult<&'static str> {
        if !self.mode.consults_tiers() {
            return Ok(self.mode.pinned_read_table().unwrap_or(CALLS_MERGED_TABLE));
        }
        let version = self.lookup_chain(project_id, ctx).await?;
        Ok(match self.mode.pinned_read_table() {
            Some(pinned) => pinned,
            None => version.read_table(),
        })
    }

    /// Resolve the stats table paired with the routed call table.
    pub async fn resolve_stats_table(
        &self,
        project_id: &str,
        ctx: &dyn PinSource,
    ) -> SwitchyardResult<&'static str> {
        Ok(stats_table_for(self.resolve_read_table(project_id, ctx).await?))
    }

    /// Drop the in-process entry for a project, forcing the next
    /// resolution back through the chain. Used by cutover tooling.
    pub fn invalidate(&self, project_id: &str) {
        self.local.invalidate(project_id);
    }

    /// Number of in-process cache entries, for observability.
    pub fn cached_entries(&self) -> usize {
        self.local.len()
    }

    /// The full fallthrough chain.
    ///
    /// Failures at any non-final tier surface as a miss inside the tier
    /// itself; only a ground-truth failure propagates, because no further
    /// fallback exists. The in-process map is never held across an await.
    async fn lookup_chain(
        &self,
        project_id: &str,
        ctx: &dyn PinSource,
    ) -> SwitchyardResult<ProjectVersion> {
        if let Lookup::Hit(version) = self.local.get(project_id) {
            return Ok(version);
        }

        if let Lookup::Hit(version) = self.shared.get(project_id).await {
            self.local.insert(project_id, version);
            return Ok(version);
        }

        // Operator pin resolved during authentication: authoritative, and
        // already in hand, so it is not written back to the cache tiers.
        if let Some(version) = ctx.pinned_version(project_id) {
            tracing::debug!(project_id, pinned = ?version, "answering from project pin");
            return Ok(version);
        }

        let presence = self.store.table_presence(project_id).await.map_err(|e| {
            RoutingError::GroundTruthUnavailable {
                project_id: project_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        if presence.in_merged && presence.in_complete && !self.mode.expects_dual_population() {
            tracing::warn!(
                project_id,
                mode = self.mode.as_str(),
                "rows in both call tables outside a dual-write mode; answering current"
            );
        }

        let version = presence.version();
        if version.is_cacheable() {
            self.local.insert(project_id, version);
            self.shared.put(project_id, version).await;
        }
        Ok(version)
    }
}
