//! Permission-tier pool resolution.

use std::collections::HashMap;

use crate::host::PermissionCheck;
use crate::rewards::SharedPool;
use crate::session::PlayerId;

/// Tier identifier that every player satisfies.
pub const DEFAULT_TIER: &str = "default";

/// Pool name for a tier: the part after the last `.`, e.g. `afkpool.vip` ->
/// `vip`.
pub fn pool_name_for_tier(tier: &str) -> &str {
    if tier == DEFAULT_TIER {
        return DEFAULT_TIER;
    }
    match tier.rfind('.') {
        Some(idx) => &tier[idx + 1..],
        None => tier,
    }
}

/// Whether `player` qualifies for `tier`.
///
/// Operators implicitly hold every permission; for them the node must have
/// been granted explicitly, otherwise every operator would land in the top
/// tier.
pub fn tier_satisfied(permissions: &dyn PermissionCheck, player: PlayerId, tier: &str) -> bool {
    if tier == DEFAULT_TIER {
        return true;
    }
    permissions.has_permission(player, tier)
        && (permissions.is_explicitly_granted(player, tier) || !permissions.is_elevated(player))
}

/// Picks the pool a player draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardPoolResolver {
    tier_priority: Vec<String>,
}

impl RewardPoolResolver {
    /// A resolver walking `tier_priority` from first to last.
    pub fn new(tier_priority: Vec<String>) -> Self {
        Self { tier_priority }
    }

    /// Tiers in the order they are tried.
    pub fn tier_priority(&self) -> &[String] {
        &self.tier_priority
    }

    /// Walks the tiers in priority order and returns the first satisfied
    /// tier's pool that exists and is enabled. A satisfied tier whose pool is
    /// missing or disabled does not end the walk.
    pub fn resolve(
        &self,
        player: PlayerId,
        permissions: &dyn PermissionCheck,
        pools: &HashMap<String, SharedPool>,
    ) -> Option<SharedPool> {
        self.tier_priority
            .iter()
            .filter(|tier| tier_satisfied(permissions, player, tier))
            .filter_map(|tier| pools.get(pool_name_for_tier(tier)))
            .find(|pool| pool.is_enabled())
            .cloned()
    }
}
