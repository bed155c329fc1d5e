//! In-process project-version cache.
//!
//! First tier of the lookup chain: bounded size, LRU eviction, TTL
//! re-validation. Built on a sharded concurrent map so a hit never locks
//! the whole structure; two racing callers may both miss and recompute,
//! which is harmless because the recomputed fact is identical.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use switchyard_core::ProjectVersion;

use crate::provider::Lookup;

#[derive(Debug)]
struct Entry {
    version: ProjectVersion,
    inserted_at: Instant,
    /// Logical clock value at last touch, for LRU ordering.
    last_used: AtomicU64,
}

/// Bounded LRU+TTL cache of `project_id -> ProjectVersion`.
///
/// Invariant: [`ProjectVersion::Empty`] is never stored. An empty project
/// could resolve either way on its next write, so caching it would wrongly
/// pin an undecided answer; `Legacy` and `Current` are stable facts once
/// observed.
pub struct LocalVersionCache {
    entries: DashMap<String, Entry>,
    capacity: usize,
    ttl: Duration,
    /// Monotonic use counter driving LRU ordering.
    clock: AtomicU64,
}

impl LocalVersionCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up a project, expiring the entry if its TTL has lapsed.
    pub fn get(&self, project_id: &str) -> Lookup {
        let expired = match self.entries.get(project_id) {
            Some(entry) => {
                if entry.inserted_at.elapsed() <= self.ttl {
                    entry.last_used.store(self.tick(), Ordering::Relaxed);
                    return Lookup::Hit(entry.version);
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(project_id);
        }
        Lookup::Miss
    }

    /// Cache a resolved version.
    ///
    /// Silently refuses `Empty` to uphold the never-cache-undecided
    /// invariant. Evicts least-recently-used entries once over capacity.
    pub fn insert(&self, project_id: &str, version: ProjectVersion) {
        if !version.is_cacheable() {
            return;
        }
        self.entries.insert(
            project_id.to_string(),
            Entry {
                version,
                inserted_at: Instant::now(),
                last_used: AtomicU64::new(self.tick()),
            },
        );
        while self.entries.len() > self.capacity {
            self.evict_lru();
        }
    }

    /// Drop a single project's entry.
    pub fn invalidate(&self, project_id: &str) {
        self.entries.remove(project_id);
    }

    /// Number of live entries, counting not-yet-expired TTLs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove the least-recently-used entry. Linear scan; runs only on
    /// the insert path, at most once per project per TTL window.
    fn evict_lru(&self) {
        let mut oldest: Option<(String, u64)> = None;
        for entry in self.entries.iter() {
            let used = entry.value().last_used.load(Ordering::Relaxed);
            match &oldest {
                Some((_, best)) if *best <= used => {}
                _ => oldest = Some((entry.key().clone(), used)),
            }
        }
        if let Some((key, _)) = oldest {
            self.entries.remove(&key);
        }
    }
}
