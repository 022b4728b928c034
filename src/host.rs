//! Seams to the game server hosting the pool.

use time::Duration;

use crate::error::Result;
use crate::rewards::Reward;
use crate::session::{AfkSession, PlayerId};

/// Permission queries for tier resolution.
pub trait PermissionCheck: Send + Sync {
    /// Whether the player effectively holds `node`, however it was obtained.
    fn has_permission(&self, player: PlayerId, node: &str) -> bool;

    /// Whether `node` was set on the player directly rather than implied.
    fn is_explicitly_granted(&self, player: PlayerId, node: &str) -> bool;

    /// Whether the player has operator status that implies every permission.
    fn is_elevated(&self, player: PlayerId) -> bool;
}

/// Who is connected right now.
pub trait PlayerDirectory: Send + Sync {
    fn is_online(&self, player: PlayerId) -> bool;
}

/// Applies a selected reward to a player (items, commands, experience).
pub trait RewardGranter: Send + Sync {
    fn grant(&self, player: PlayerId, reward: &Reward) -> Result<()>;
}

/// Receives region entry and exit notifications.
pub trait MembershipObserver: Send + Sync {
    fn on_enter(&self, _session: &AfkSession) {}

    fn on_exit(&self, _session: &AfkSession, _stint: Duration) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl MembershipObserver for NoopObserver {}
