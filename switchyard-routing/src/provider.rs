//! Lookup-tier traits and the tagged per-tier result.
//!
//! Every tier answers `Hit` or `Miss`; a miss means "no answer, try the
//! next tier", never a sentinel value. Tier-unavailable conditions are a
//! miss too, because advancing is always safe while a final answer exists
//! further down the chain.

use async_trait::async_trait;
use switchyard_core::{ProjectVersion, StoreError};

/// Result of asking one tier for a project version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// This tier knows the answer.
    Hit(ProjectVersion),
    /// This tier has no answer; ask the next one.
    Miss,
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// The version if this is a hit.
    pub fn version(&self) -> Option<ProjectVersion> {
        match self {
            Self::Hit(v) => Some(*v),
            Self::Miss => None,
        }
    }
}

/// Shared external cache client.
///
/// The one cross-process cache tier. `get`/`set` return an error rather
/// than a silent sentinel on failure; the provider wrapping this client
/// degrades every failure to [`Lookup::Miss`] so the next tier always
/// gets a chance.
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Fetch the raw cached value for a key, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Store a raw value under a key. Best effort; callers tolerate
    /// failure.
    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError>;
}

/// Per-request pin source populated during authentication.
///
/// The config service resolves operator pins alongside project auth, so
/// consulting this tier costs no extra round trip. Authoritative when it
/// answers: an explicit pin from an operator or migration tool beats any
/// derived fact.
pub trait PinSource: Send + Sync {
    /// The pinned version for a project, if one was resolved for this
    /// request.
    fn pinned_version(&self, project_id: &str) -> Option<ProjectVersion>;
}

/// Request-scoped routing context.
///
/// Constructed by the caller from already-authenticated request data and
/// passed into every resolution; there is no ambient global lookup.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pins: Vec<(String, ProjectVersion)>,
}

impl RequestContext {
    /// A context carrying no pins.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A context with one pinned project, the common case.
    pub fn with_pin(project_id: impl Into<String>, version: ProjectVersion) -> Self {
        Self {
            pins: vec![(project_id.into(), version)],
        }
    }

    /// Add a pin for a project.
    pub fn pin(mut self, project_id: impl Into<String>, version: ProjectVersion) -> Self {
        self.pins.push((project_id.into(), version));
        self
    }
}

impl PinSource for RequestContext {
    fn pinned_version(&self, project_id: &str) -> Option<ProjectVersion> {
        self.pins
            .iter()
            .find(|(id, _)| id == project_id)
            .map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_accessors() {
        assert!(Lookup::Hit(ProjectVersion::Current).is_hit());
        assert!(!Lookup::Miss.is_hit());
        assert_eq!(
            Lookup::Hit(ProjectVersion::Legacy).version(),
            Some(ProjectVersion::Legacy)
        );
        assert_eq!(Lookup::Miss.version(), None);
    }

    #[test]
    fn test_request_context_pins() {
        let ctx = RequestContext::with_pin("proj-a", ProjectVersion::Current)
            .pin("proj-b", ProjectVersion::Legacy);
        assert_eq!(ctx.pinned_version("proj-a"), Some(ProjectVersion::Current));
        assert_eq!(ctx.pinned_version("proj-b"), Some(ProjectVersion::Legacy));
        assert_eq!(ctx.pinned_version("proj-c"), None);
        assert_eq!(RequestContext::empty().pinned_version("proj-a"), None);
    }
}
