//! The live set of reward pools, replaced wholesale on reload.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::host::PermissionCheck;
use crate::resolver::RewardPoolResolver;
use crate::rewards::{RewardPool, SharedPool};
use crate::session::PlayerId;

/// Pools plus the tier order used to pick among them.
#[derive(Debug, Clone)]
pub struct RewardSet {
    resolver: RewardPoolResolver,
    pools: HashMap<String, SharedPool>,
}

impl RewardSet {
    /// Builds a set from loaded pools, keyed by pool name. A later pool with
    /// a duplicate name replaces the earlier one.
    pub fn new(tier_priority: Vec<String>, pools: Vec<RewardPool>) -> Self {
        Self {
            resolver: RewardPoolResolver::new(tier_priority),
            pools: pools
                .into_iter()
                .map(|p| (p.name().to_string(), Arc::new(p)))
                .collect(),
        }
    }

    /// The pool registered under `name`.
    pub fn pool(&self, name: &str) -> Option<&SharedPool> {
        self.pools.get(name)
    }

    /// Number of registered pools.
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// The pool `player` draws from, or `None` when no tier is satisfied.
    ///
    /// See [`RewardPoolResolver::resolve`].
    pub fn resolve(&self, player: PlayerId, permissions: &dyn PermissionCheck) -> Option<SharedPool> {
        self.resolver.resolve(player, permissions, &self.pools)
    }
}

/// Holder of the current [`RewardSet`].
///
/// Readers take a cheap `Arc` snapshot; a reload swaps in a new set in one
/// step, so a distribution pass never sees a half-loaded configuration.
#[derive(Debug)]
pub struct RewardCatalog {
    current: RwLock<Arc<RewardSet>>,
}

impl RewardCatalog {
    /// A catalog serving `set` until the first reload.
    pub fn new(set: RewardSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(set)),
        }
    }

    /// The current set. Holding the snapshot does not block a reload.
    pub fn snapshot(&self) -> Arc<RewardSet> {
        Arc::clone(&self.current.read())
    }

    /// Swaps in `set`; passes already holding a snapshot finish on the old one.
    pub fn replace(&self, set: RewardSet) {
        *self.current.write() = Arc::new(set);
    }
}
