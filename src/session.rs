//! Per-player AFK session state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Stable identity of a player across reconnects.
pub type PlayerId = Uuid;

/// Tier assigned to new sessions.
pub const DEFAULT_TIER: &str = "default";

/// Label shown before a player has received any reward.
pub const NO_REWARD_LABEL: &str = "None";

/// Whether a session is currently inside the AFK region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipState {
    Out,
    In,
}

/// AFK bookkeeping for a single player.
///
/// `entered_at` is present if and only if the player is in the region. Every
/// entry resets `last_reward_at` to the entry time, so the first reward is due
/// one full interval after entering rather than one interval after the last
/// reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AfkSession {
    pub id: PlayerId,
    pub name: String,
    pub entered_at: Option<OffsetDateTime>,
    pub accumulated: Duration,
    pub last_reward_at: OffsetDateTime,
    pub rewards_disabled: bool,
    pub tier: String,
    pub total_rewards: u64,
    pub last_reward_label: String,
    pub rewards_by_kind: HashMap<String, u64>,
}

impl AfkSession {
    /// A fresh session: outside the region, no rewards, default tier.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            entered_at: None,
            accumulated: Duration::ZERO,
            last_reward_at: OffsetDateTime::UNIX_EPOCH,
            rewards_disabled: false,
            tier: DEFAULT_TIER.to_string(),
            total_rewards: 0,
            last_reward_label: NO_REWARD_LABEL.to_string(),
            rewards_by_kind: HashMap::new(),
        }
    }

    /// The membership state implied by `entered_at`.
    pub fn state(&self) -> MembershipState {
        if self.entered_at.is_some() {
            MembershipState::In
        } else {
            MembershipState::Out
        }
    }

    /// Whether the player is inside the region.
    pub fn is_in_region(&self) -> bool {
        self.entered_at.is_some()
    }

    /// Time spent in the region during the current stint, zero when outside.
    pub fn time_in_region(&self, now: OffsetDateTime) -> Duration {
        match self.entered_at {
            Some(entered) => (now - entered).max(Duration::ZERO),
            None => Duration::ZERO,
        }
    }

    /// Accumulated time plus the current stint.
    pub fn session_time(&self, now: OffsetDateTime) -> Duration {
        self.accumulated + self.time_in_region(now)
    }

    /// Time left before the next reward is due, never negative.
    pub fn time_remaining(&self, now: OffsetDateTime, interval: Duration) -> Duration {
        interval
            .saturating_sub(now - self.last_reward_at)
            .max(Duration::ZERO)
    }

    /// Inside, not opted out, and at least `interval` since the last reward
    /// (or entry).
    pub fn is_eligible_for_reward(&self, now: OffsetDateTime, interval: Duration) -> bool {
        self.is_in_region() && !self.rewards_disabled && now - self.last_reward_at >= interval
    }

    /// Out -> In. Returns `false` when already inside.
    pub(crate) fn enter(&mut self, now: OffsetDateTime) -> bool {
        if self.is_in_region() {
            return false;
        }
        self.entered_at = Some(now);
        self.last_reward_at = now;
        true
    }

    /// In -> Out, folding the stint into `accumulated`. Returns the stint
    /// length, or `None` when already outside.
    pub(crate) fn exit(&mut self, now: OffsetDateTime) -> Option<Duration> {
        let entered = self.entered_at.take()?;
        let stint = (now - entered).max(Duration::ZERO);
        self.accumulated += stint;
        Some(stint)
    }

    pub(crate) fn reset(&mut self) {
        self.entered_at = None;
        self.accumulated = Duration::ZERO;
        self.last_reward_at = OffsetDateTime::UNIX_EPOCH;
    }

    pub(crate) fn record_grant(&mut self, now: OffsetDateTime, label: &str, kind: &str) {
        self.last_reward_at = now;
        self.total_rewards += 1;
        self.last_reward_label = label.to_string();
        *self.rewards_by_kind.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// Takes the persisted statistics from `stored` while keeping this
    /// session's live region state.
    ///
    /// Used when a background load finishes after the player has already been
    /// observed moving.
    pub(crate) fn absorb_persisted(&mut self, stored: AfkSession) {
        self.accumulated = stored.accumulated;
        self.rewards_disabled = stored.rewards_disabled;
        self.tier = stored.tier;
        self.total_rewards = stored.total_rewards;
        self.last_reward_label = stored.last_reward_label;
        self.rewards_by_kind = stored.rewards_by_kind;
        if !self.is_in_region() {
            self.last_reward_at = stored.last_reward_at;
        }
    }
}
