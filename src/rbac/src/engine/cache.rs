//! Per-principal permission cache with generation-guarded invalidation
//!
//! Entries are keyed by principal and hold the principal's resolved roles and
//! aggregated permissions. Consistency under concurrent writers rests on a
//! monotonically increasing generation counter:
//!
//! 1. A reader that misses calls [`PermissionCache::begin`] *before* touching
//!    the store and keeps the returned [`CacheToken`].
//! 2. Every invalidation bumps the generation and raises a floor: the global
//!    floor, the principal's slot floor, or, for a principal without a slot,
//!    the shared orphan floor.
//! 3. [`PermissionCache::put`] discards the write-back when the token is below
//!    any floor that applies, and [`PermissionCache::get`] ignores entries
//!    that are.
//!
//! A resolution that raced with an invalidation can therefore never be served,
//! even if its write-back lands after the clear.
//!
//! The slot map never exceeds its capacity. Evicting a slot folds its floor
//! into the orphan floor, so forgetting a principal never forgets an
//! invalidation; at worst a later write-back for an uncached principal is
//! dropped and recomputed.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{info, warn};

use super::change::{ChangeListener, GraphChange, InvalidationScope};
use crate::config::CacheSection;
use crate::types::{EffectiveAccess, PrincipalId};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached principals
    pub capacity: usize,

    /// Time-to-live for cached entries (`None` = no expiry)
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: Some(Duration::from_secs(300)),
        }
    }
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        Self {
            capacity: section.capacity,
            ttl: section.ttl(),
        }
    }
}

/// Generation observed before a resolution started
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheToken(u64);

/// Cached entry with TTL
#[derive(Clone)]
struct CachedEntry {
    access: Arc<EffectiveAccess>,
    generation: u64,
    cached_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.map_or(false, |ttl| self.cached_at.elapsed() > ttl)
    }
}

/// One principal's slot: the entry, if any, and the principal's floor
#[derive(Default)]
struct Slot {
    entry: Option<CachedEntry>,
    floor: u64,
}

/// Per-principal permission cache
pub struct PermissionCache {
    slots: DashMap<PrincipalId, Slot>,
    generation: AtomicU64,
    global_floor: AtomicU64,
    /// Highest floor of any principal that has no slot
    orphan_floor: AtomicU64,
    config: CacheConfig,
    stats: CacheCounters,
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicUsize,
    misses: AtomicUsize,
    expirations: AtomicUsize,
    stale_writes: AtomicUsize,
    invalidations: AtomicUsize,
}

impl PermissionCache {
    /// Create a new permission cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            slots: DashMap::new(),
            generation: AtomicU64::new(0),
            global_floor: AtomicU64::new(0),
            orphan_floor: AtomicU64::new(0),
            config,
            stats: CacheCounters::default(),
        }
    }

    /// Snapshot the generation; call before reading the store on a miss
    pub fn begin(&self) -> CacheToken {
        CacheToken(self.generation.load(Ordering::SeqCst))
    }

    /// Get a principal's cached access
    pub fn get(&self, principal: &str) -> Option<Arc<EffectiveAccess>> {
        let global_floor = self.global_floor.load(Ordering::SeqCst);

        let expired = match self.slots.get(principal) {
            Some(slot) => match &slot.entry {
                Some(entry) if entry.generation >= global_floor && entry.generation >= slot.floor => {
                    if entry.is_expired(self.config.ttl) {
                        true
                    } else {
                        self.stats.hits.fetch_add(1, Ordering::Relaxed);
                        return Some(Arc::clone(&entry.access));
                    }
                }
                _ => false,
            },
            None => false,
        };

        if expired {
            if let Some(mut slot) = self.slots.get_mut(principal) {
                slot.entry = None;
            }
            self.stats.expirations.fetch_add(1, Ordering::Relaxed);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a principal's access computed under `token`
    ///
    /// Returns false, and stores nothing, when an invalidation affecting the
    /// principal happened after `token` was taken.
    pub fn put(&self, principal: &str, access: Arc<EffectiveAccess>, token: CacheToken) -> bool {
        if !self.slots.contains_key(principal) && self.slots.len() >= self.config.capacity {
            self.evict();
        }

        // Checked under the slot's shard lock, so a per-principal
        // invalidation or an eviction cannot interleave between check and write.
        let mut slot = match self.slots.entry(principal.to_string()) {
            Entry::Occupied(occupied) => occupied.into_ref(),
            Entry::Vacant(vacant) => {
                if token.0 < self.orphan_floor.load(Ordering::SeqCst) {
                    return self.reject_stale(principal);
                }
                vacant.insert(Slot::default())
            }
        };

        if token.0 < slot.floor || token.0 < self.global_floor.load(Ordering::SeqCst) {
            return self.reject_stale(principal);
        }

        slot.entry = Some(CachedEntry {
            access,
            generation: token.0,
            cached_at: Instant::now(),
        });
        true
    }

    fn reject_stale(&self, principal: &str) -> bool {
        self.stats.stale_writes.fetch_add(1, Ordering::Relaxed);
        warn!(principal, "Dropping stale cache write-back");
        false
    }

    /// Invalidate one principal's entry
    ///
    /// Never allocates a slot: a principal without one has its floor folded
    /// into the orphan floor.
    pub fn invalidate_principal(&self, principal: &str) {
        let floor = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match self.slots.entry(principal.to_string()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                slot.floor = floor;
                slot.entry = None;
            }
            Entry::Vacant(_) => {
                self.orphan_floor.fetch_max(floor, Ordering::SeqCst);
            }
        }
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Invalidate every entry
    pub fn invalidate_all(&self) {
        let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.global_floor.fetch_max(next, Ordering::SeqCst);
        self.slots.clear();
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
        info!(generation = next, "Permission cache invalidated");
    }

    /// Apply the invalidation a graph change calls for
    pub fn apply(&self, change: &GraphChange) {
        match change.scope() {
            InvalidationScope::All => self.invalidate_all(),
            InvalidationScope::Principal(principal) => self.invalidate_principal(principal),
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            expirations: self.stats.expirations.load(Ordering::Relaxed),
            stale_writes: self.stats.stale_writes.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
            entries: self.slots.iter().filter(|slot| slot.entry.is_some()).count(),
            slots: self.slots.len(),
            max_entries: self.config.capacity,
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    /// Evict roughly 10% of the slots (at least one), empty slots first
    fn evict(&self) {
        let to_remove = (self.config.capacity / 10).max(1);
        let mut removed = 0;

        for drop_populated in [false, true] {
            self.slots.retain(|_, slot| {
                if removed >= to_remove || (slot.entry.is_some() && !drop_populated) {
                    return true;
                }
                // Raised before the shard lock is released, so a put that
                // recreates the slot already sees it.
                self.orphan_floor.fetch_max(slot.floor, Ordering::SeqCst);
                removed += 1;
                false
            });
            if removed >= to_remove {
                break;
            }
        }
    }
}

impl ChangeListener for PermissionCache {
    fn on_change(&self, change: &GraphChange) {
        self.apply(change);
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    /// Write-backs dropped because an invalidation overtook them
    pub stale_writes: usize,
    pub invalidations: usize,
    pub entries: usize,
    /// Principals tracked, with or without an entry
    pub slots: usize,
    pub max_entries: usize,
    pub generation: u64,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access() -> Arc<EffectiveAccess> {
        Arc::new(EffectiveAccess::default())
    }

    #[test]
    fn test_cache_put_get() {
        let cache = PermissionCache::new(CacheConfig::default());

        assert!(cache.get("user:1").is_none());

        let token = cache.begin();
        assert!(cache.put("user:1", access(), token));
        assert!(cache.get("user:1").is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stale_write_after_global_invalidation_is_dropped() {
        let cache = PermissionCache::new(CacheConfig::default());

        let token = cache.begin();
        cache.invalidate_all();

        assert!(!cache.put("user:1", access(), token));
        assert!(cache.get("user:1").is_none());
        assert_eq!(cache.stats().stale_writes, 1);

        // A resolution started after the invalidation is cacheable
        let fresh = cache.begin();
        assert!(cache.put("user:1", access(), fresh));
        assert!(cache.get("user:1").is_some());
    }

    #[test]
    fn test_stale_write_after_principal_invalidation_is_dropped() {
        let cache = PermissionCache::new(CacheConfig::default());

        let token = cache.begin();
        cache.put("user:1", access(), token);
        cache.put("user:2", access(), token);
        cache.invalidate_principal("user:1");

        assert!(!cache.put("user:1", access(), token));
        // Other cached principals are unaffected by a per-principal invalidation
        assert!(cache.put("user:2", access(), token));
        assert!(cache.get("user:2").is_some());
    }

    #[test]
    fn test_stale_write_for_uncached_principal_is_dropped() {
        let cache = PermissionCache::new(CacheConfig::default());

        let token = cache.begin();
        cache.invalidate_principal("user:1");

        assert!(!cache.put("user:1", access(), token));
        assert_eq!(cache.stats().slots, 0);
        assert!(cache.put("user:1", access(), cache.begin()));
    }

    #[test]
    fn test_principal_invalidations_never_grow_slot_map() {
        let cache = PermissionCache::new(CacheConfig {
            capacity: 10,
            ttl: None,
        });

        for i in 0..10_000 {
            cache.invalidate_principal(&format!("user:{}", i));
        }

        assert_eq!(cache.stats().slots, 0);
        assert_eq!(cache.stats().invalidations, 10_000);
    }

    #[test]
    fn test_capacity_holds_under_interleaved_invalidation() {
        let cache = PermissionCache::new(CacheConfig {
            capacity: 10,
            ttl: None,
        });

        for i in 0..100 {
            let principal = format!("user:{}", i);
            cache.invalidate_principal(&principal);
            assert!(cache.put(&principal, access(), cache.begin()));

            // Invalidate a cached principal too, leaving an empty slot behind
            if i % 3 == 0 {
                cache.invalidate_principal(&principal);
            }

            let stats = cache.stats();
            assert!(stats.slots <= 10, "slot map grew to {}", stats.slots);
            assert!(stats.entries <= 10);
        }
    }

    #[test]
    fn test_evicted_floor_still_rejects_stale_write() {
        let cache = PermissionCache::new(CacheConfig {
            capacity: 1,
            ttl: None,
        });

        cache.put("user:a", access(), cache.begin());
        let stale = cache.begin();
        cache.invalidate_principal("user:a");

        // Evicts user:a's slot, floor included
        assert!(cache.put("user:b", access(), cache.begin()));
        assert_eq!(cache.stats().slots, 1);

        assert!(!cache.put("user:a", access(), stale));
        assert!(cache.get("user:a").is_none());
    }

    #[test]
    fn test_principal_invalidation_is_scoped() {
        let cache = PermissionCache::new(CacheConfig::default());
        let token = cache.begin();
        cache.put("user:1", access(), token);
        cache.put("user:2", access(), token);

        cache.invalidate_principal("user:1");

        assert!(cache.get("user:1").is_none());
        assert!(cache.get("user:2").is_some());
    }

    #[test]
    fn test_global_invalidation_clears_everything() {
        let cache = PermissionCache::new(CacheConfig::default());
        let token = cache.begin();
        cache.put("user:1", access(), token);
        cache.put("user:2", access(), token);

        cache.invalidate_all();

        assert!(cache.get("user:1").is_none());
        assert!(cache.get("user:2").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = PermissionCache::new(CacheConfig {
            ttl: Some(Duration::from_millis(20)),
            ..Default::default()
        });

        cache.put("user:1", access(), cache.begin());
        assert!(cache.get("user:1").is_some());

        std::thread::sleep(Duration::from_millis(50));

        assert!(cache.get("user:1").is_none());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = PermissionCache::new(CacheConfig {
            capacity: 10,
            ttl: None,
        });

        for i in 0..25 {
            cache.put(&format!("user:{}", i), access(), cache.begin());
        }

        assert!(cache.stats().entries <= 10);
    }

    #[test]
    fn test_concurrent_invalidation_never_serves_stale_entry() {
        let cache = Arc::new(PermissionCache::new(CacheConfig::default()));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for _ in 0..500 {
                        let token = cache.begin();
                        cache.put("user:1", access(), token);
                    }
                });
            }
            let invalidator = Arc::clone(&cache);
            scope.spawn(move || {
                for _ in 0..500 {
                    invalidator.invalidate_all();
                }
            });
        });

        // After the final invalidation any surviving entry must predate it
        cache.invalidate_all();
        assert!(cache.get("user:1").is_none());
    }
}
