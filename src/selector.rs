//! Weighted random draw from a pool.

use rand::Rng;

use crate::rewards::{Reward, RewardPool};

/// Draws one reward from `pool` in proportion to the reward weights.
///
/// Returns `None` for an empty pool or one whose total weight is not positive.
/// If floating-point accumulation leaves the walk without a match, the first
/// reward is returned.
pub fn select_reward<'a, R: Rng + ?Sized>(pool: &'a RewardPool, rng: &mut R) -> Option<&'a Reward> {
    let total = pool.total_weight();
    let first = pool.rewards().first()?;
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    let draw = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for reward in pool.rewards() {
        cumulative += reward.weight();
        if cumulative >= draw {
            return Some(reward);
        }
    }
    Some(first)
}
