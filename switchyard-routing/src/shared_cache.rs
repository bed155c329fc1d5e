//! Shared external cache tier.
//!
//! Second tier of the lookup chain and the only cross-process one. Best
//! effort by contract: a disabled client, a missing key, or any transport
//! error all degrade to `Miss` so the next tier gets a chance. Failures
//! here are expected and frequent during incidents, so they log at debug,
//! never at error severity.

use std::sync::Arc;

use switchyard_core::{ProjectVersion, StoreError};

use crate::provider::{Lookup, SharedCache};

/// Key prefix for project-version entries in the shared cache.
const VERSION_KEY_PREFIX: &str = "project_version";

fn version_key(project_id: &str) -> String {
    format!("{VERSION_KEY_PREFIX}:{project_id}")
}

/// Provider wrapping a [`SharedCache`] client.
pub struct SharedVersionTier {
    client: Arc<dyn SharedCache>,
    enabled: bool,
}

impl SharedVersionTier {
    pub fn new(client: Arc<dyn SharedCache>, enabled: bool) -> Self {
        Self { client, enabled }
    }

    /// Ask the shared cache for a project's version.
    pub async fn get(&self, project_id: &str) -> Lookup {
        if !self.enabled {
            return Lookup::Miss;
        }
        match self.client.get(&version_key(project_id)).await {
            Ok(Some(raw)) => Lookup::Hit(ProjectVersion::from_raw(raw)),
            Ok(None) => Lookup::Miss,
            Err(err) => {
                tracing::debug!(project_id, "shared cache unavailable, advancing tier: {err}");
                Lookup::Miss
            }
        }
    }

    /// Store a resolved version, best effort.
    ///
    /// `Empty` is never stored here either; the raw payload is the bare
    /// 0/1 integer.
    pub async fn put(&self, project_id: &str, version: ProjectVersion) {
        if !self.enabled || !version.is_cacheable() {
            return;
        }
        if let Err(err) = self
            .client
            .set(&version_key(project_id), version.as_raw())
            .await
        {
            tracing::debug!(project_id, "shared cache set failed: {err}");
        }
    }
}

/// In-memory [`SharedCache`] for tests and single-process deployments.
///
/// Supports fault injection so tier-fallthrough behavior is testable.
#[derive(Default)]
pub struct MemorySharedCache {
    values: dashmap::DashMap<String, i64>,
    fail: std::sync::atomic::AtomicBool,
}

impl MemorySharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call return a connection error.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            Err(StoreError::Pool {
                reason: "injected shared-cache failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl SharedCache for MemorySharedCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.check()?;
        Ok(self.values.get(key).map(|v| *v))
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.check()?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_through_tier() {
        let client = Arc::new(MemorySharedCache::new());
        let tier = SharedVersionTier::new(client, true);

        assert_eq!(tier.get("proj-a").await, Lookup::Miss);
        tier.put("proj-a", ProjectVersion::Current).await;
        assert_eq!(tier.get("proj-a").await, Lookup::Hit(ProjectVersion::Current));
    }

    #[tokio::test]
    async fn test_disabled_tier_always_misses() {
        let client = Arc::new(MemorySharedCache::new());
        let tier = SharedVersionTier::new(Arc::clone(&client) as Arc<dyn SharedCache>, false);

        tier.put("proj-a", ProjectVersion::Current).await;
        assert!(client.is_empty());
        assert_eq!(tier.get("proj-a").await, Lookup::Miss);
    }

    #[tokio::test]
    async fn test_errors_degrade_to_miss() {
        let client = Arc::new(MemorySharedCache::new());
        let tier = SharedVersionTier::new(Arc::clone(&client) as Arc<dyn SharedCache>, true);

        tier.put("proj-a", ProjectVersion::Legacy).await;
        client.set_failing(true);
        assert_eq!(tier.get("proj-a").await, Lookup::Miss);

        // Set failures are swallowed too.
        tier.put("proj-b", ProjectVersion::Current).await;
        client.set_failing(false);
        assert_eq!(tier.get("proj-b").await, Lookup::Miss);
    }

    #[tokio::test]
    async fn test_empty_is_never_stored() {
        let client = Arc::new(MemorySharedCache::new());
        let tier = SharedVersionTier::new(Arc::clone(&client) as Arc<dyn SharedCache>, true);

        tier.put("proj-a", ProjectVersion::Empty).await;
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn test_raw_payload_is_bare_integer() {
        let client = Arc::new(MemorySharedCache::new());
        let tier = SharedVersionTier::new(Arc::clone(&client) as Arc<dyn SharedCache>, true);

        tier.put("proj-a", ProjectVersion::Current).await;
        assert_eq!(
            client.get("project_version:proj-a").await.unwrap(),
            Some(1)
        );
    }
}
