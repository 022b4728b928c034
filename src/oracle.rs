//! Cached point-in-region queries against the host's spatial engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::session::PlayerId;

/// Failure reported by a [`SpatialEngine`].
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("world `{0}` is not known to the spatial engine")]
    UnknownWorld(String),
    #[error("spatial engine unavailable: {0}")]
    Unavailable(String),
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// A player's position in a named world.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    /// A location in `world`.
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// The block containing this location, flooring each coordinate.
    pub fn block(&self) -> BlockPos {
        BlockPos {
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
            z: self.z.floor() as i32,
        }
    }

    /// True when both locations fall in the same block of the same world.
    pub fn same_block(&self, other: &Location) -> bool {
        self.world == other.world && self.block() == other.block()
    }
}

/// The external region engine that owns the geometry.
///
/// Calls may block; the core runs them off the owner thread when
/// asynchronous region checks are enabled.
pub trait SpatialEngine: Send + Sync {
    fn point_in_region(&self, world: &str, pos: BlockPos, region: &str)
        -> Result<bool, SpatialError>;

    /// Confirms the engine is reachable. Called once at startup.
    fn probe(&self) -> Result<(), SpatialError>;
}

#[derive(Debug, Clone)]
struct CachedMembership {
    world: String,
    block: BlockPos,
    inside: bool,
    stored_at: Instant,
}

/// Snapshot of cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache; `0.0` before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded, time-expiring cache of membership answers.
///
/// An entry only answers for the block it was computed at. When full, expired
/// entries are purged first and then the oldest entry is evicted.
#[derive(Debug)]
pub struct RegionCache {
    entries: Mutex<HashMap<PlayerId, CachedMembership>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RegionCache {
    /// A cache holding at most `max_entries` answers, each for `ttl`.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lookup(&self, player: PlayerId, location: &Location) -> Option<bool> {
        let block = location.block();
        let mut entries = self.entries.lock();
        let cached = entries.get(&player).map(|e| {
            let fresh = e.stored_at.elapsed() < self.ttl;
            let same_spot = e.world == location.world && e.block == block;
            (fresh, same_spot, e.inside)
        });
        let answer = match cached {
            Some((false, _, _)) => {
                entries.remove(&player);
                None
            }
            Some((true, true, inside)) => Some(inside),
            _ => None,
        };
        drop(entries);

        match answer {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        answer
    }

    fn store(&self, player: PlayerId, location: &Location, inside: bool) {
        if self.max_entries == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        if !entries.contains_key(&player) && entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, e| e.stored_at.elapsed() < ttl);
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.stored_at)
                    .map(|(id, _)| *id);
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            player,
            CachedMembership {
                world: location.world.clone(),
                block: location.block(),
                inside,
                stored_at: Instant::now(),
            },
        );
    }

    /// Forgets the cached answer for `player`.
    pub fn invalidate(&self, player: PlayerId) {
        self.entries.lock().remove(&player);
    }

    /// Empties the cache.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of cached answers.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current size plus lifetime hit and miss counts.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Answers "is this player inside the AFK region?".
///
/// Pure read: it consults the cache and the engine but never touches session
/// state, so it can run on any thread.
pub struct RegionMembershipOracle {
    engine: Arc<dyn SpatialEngine>,
    region: String,
    cache: RegionCache,
}

impl RegionMembershipOracle {
    /// An oracle for `region` with its own cache.
    pub fn new(
        engine: Arc<dyn SpatialEngine>,
        region: impl Into<String>,
        ttl: Duration,
        max_entries: usize,
    ) -> Self {
        Self {
            engine,
            region: region.into(),
            cache: RegionCache::new(ttl, max_entries),
        }
    }

    /// Name of the region being checked.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Engine failures count as "outside" and are not cached, so the next
    /// scheduled check asks again.
    pub fn is_in_region(&self, player: PlayerId, location: &Location) -> bool {
        if let Some(inside) = self.cache.lookup(player, location) {
            return inside;
        }

        match self
            .engine
            .point_in_region(&location.world, location.block(), &self.region)
        {
            Ok(inside) => {
                self.cache.store(player, location, inside);
                inside
            }
            Err(e) => {
                debug!(%player, region = %self.region, "region check failed: {e}");
                false
            }
        }
    }

    /// Drops the cached answer for `player`, e.g. on quit or teleport.
    pub fn invalidate(&self, player: PlayerId) {
        self.cache.invalidate(player);
    }

    /// Drops every cached answer. Hit and miss counters are kept.
    pub fn clear_all(&self) {
        self.cache.clear();
    }

    /// Current cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl std::fmt::Debug for RegionMembershipOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionMembershipOracle")
            .field("region", &self.region)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use uuid::Uuid;

    use super::*;

    /// Inside when x is non-negative; fails for the "void" world.
    #[derive(Default)]
    struct HalfSpace {
        calls: AtomicUsize,
    }

    impl SpatialEngine for HalfSpace {
        fn point_in_region(
            &self,
            world: &str,
            pos: BlockPos,
            _region: &str,
        ) -> Result<bool, SpatialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if world == "void" {
                return Err(SpatialError::UnknownWorld(world.to_string()));
            }
            Ok(pos.x >= 0)
        }

        fn probe(&self) -> Result<(), SpatialError> {
            Ok(())
        }
    }

    fn oracle(engine: Arc<HalfSpace>, ttl: Duration, max: usize) -> RegionMembershipOracle {
        RegionMembershipOracle::new(engine, "afk", ttl, max)
    }

    #[test]
    fn block_floor_handles_negative_coordinates() {
        let loc = Location::new("world", -0.5, 64.9, 3.0);
        assert_eq!(loc.block(), BlockPos { x: -1, y: 64, z: 3 });
        assert!(loc.same_block(&Location::new("world", -0.1, 64.0, 3.99)));
        assert!(!loc.same_block(&Location::new("nether", -0.1, 64.0, 3.99)));
    }

    #[test]
    fn repeated_query_in_same_block_hits_cache() {
        let engine = Arc::new(HalfSpace::default());
        let oracle = oracle(Arc::clone(&engine), Duration::from_secs(60), 10);
        let player = Uuid::new_v4();
        let here = Location::new("world", 4.2, 70.0, 1.0);

        assert!(oracle.is_in_region(player, &here));
        assert!(oracle.is_in_region(player, &Location::new("world", 4.8, 70.5, 1.1)));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);

        let stats = oracle.cache_stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn moving_to_another_block_requeries() {
        let engine = Arc::new(HalfSpace::default());
        let oracle = oracle(Arc::clone(&engine), Duration::from_secs(60), 10);
        let player = Uuid::new_v4();

        assert!(oracle.is_in_region(player, &Location::new("world", 1.0, 64.0, 0.0)));
        assert!(!oracle.is_in_region(player, &Location::new("world", -3.0, 64.0, 0.0)));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_ttl_always_misses() {
        let engine = Arc::new(HalfSpace::default());
        let oracle = oracle(Arc::clone(&engine), Duration::ZERO, 10);
        let player = Uuid::new_v4();
        let here = Location::new("world", 1.0, 64.0, 0.0);

        oracle.is_in_region(player, &here);
        oracle.is_in_region(player, &here);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn engine_errors_read_as_outside_and_are_not_cached() {
        let engine = Arc::new(HalfSpace::default());
        let oracle = oracle(Arc::clone(&engine), Duration::from_secs(60), 10);
        let player = Uuid::new_v4();
        let nowhere = Location::new("void", 5.0, 0.0, 0.0);

        assert!(!oracle.is_in_region(player, &nowhere));
        assert!(!oracle.is_in_region(player, &nowhere));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert_eq!(oracle.cache_stats().size, 0);
    }

    #[test]
    fn cache_stays_within_its_bound() {
        let engine = Arc::new(HalfSpace::default());
        let oracle = oracle(engine, Duration::from_secs(60), 2);
        let here = Location::new("world", 1.0, 64.0, 0.0);

        let first = Uuid::new_v4();
        oracle.is_in_region(first, &here);
        for _ in 0..4 {
            oracle.is_in_region(Uuid::new_v4(), &here);
        }
        assert_eq!(oracle.cache_stats().size, 2);
    }

    #[test]
    fn invalidate_and_clear_bust_the_cache() {
        let engine = Arc::new(HalfSpace::default());
        let oracle = oracle(Arc::clone(&engine), Duration::from_secs(60), 10);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let here = Location::new("world", 1.0, 64.0, 0.0);

        oracle.is_in_region(a, &here);
        oracle.is_in_region(b, &here);
        oracle.invalidate(a);
        assert_eq!(oracle.cache_stats().size, 1);

        oracle.is_in_region(a, &here);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);

        oracle.clear_all();
        assert_eq!(oracle.cache_stats().size, 0);
    }
}
