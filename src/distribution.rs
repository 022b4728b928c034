//! Periodic reward distribution.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::catalog::RewardCatalog;
use crate::clock::Clock;
use crate::context::OwnerContext;
use crate::host::{PermissionCheck, PlayerDirectory, RewardGranter};
use crate::rewards::Reward;
use crate::selector::select_reward;
use crate::session::PlayerId;
use crate::store::PlayerSessionStore;

/// What happened when a player was considered for a reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    /// The reward was applied and recorded on the session.
    Granted { label: String, kind: &'static str },
    Offline,
    /// Outside the region or not yet due.
    NotEligible,
    /// No tier resolved to a pool.
    NoPool,
    /// The resolved pool produced nothing.
    NoReward,
    /// The host rejected the grant.
    GrantFailed,
    /// The session was dropped before the reward could be recorded.
    MissingSession,
}

/// Scans in-region sessions on a fixed period and grants rewards.
#[derive(Clone)]
pub struct RewardDistributionScheduler {
    store: Arc<PlayerSessionStore>,
    catalog: Arc<RewardCatalog>,
    permissions: Arc<dyn PermissionCheck>,
    directory: Arc<dyn PlayerDirectory>,
    granter: Arc<dyn RewardGranter>,
    context: Arc<dyn OwnerContext>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl RewardDistributionScheduler {
    /// Wires a scheduler. Nothing runs until [`tick`](Self::tick) or
    /// [`spawn`](Self::spawn) is called.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<PlayerSessionStore>,
        catalog: Arc<RewardCatalog>,
        permissions: Arc<dyn PermissionCheck>,
        directory: Arc<dyn PlayerDirectory>,
        granter: Arc<dyn RewardGranter>,
        context: Arc<dyn OwnerContext>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            permissions,
            directory,
            granter,
            context,
            clock,
            interval,
        }
    }

    /// Time a player must spend in the region between rewards.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One distribution pass. Eligible players are handed to their owner
    /// context; returns how many were dispatched.
    pub fn tick(&self) -> usize {
        let now = self.clock.now();
        let mut dispatched = 0;
        for session in self.store.in_region() {
            if !self.directory.is_online(session.id) {
                continue;
            }
            if !session.is_eligible_for_reward(now, self.interval) {
                continue;
            }
            let this = self.clone();
            let player = session.id;
            self.context.run_on_owner(
                player,
                Box::new(move || {
                    this.distribute_to(player);
                }),
            );
            dispatched += 1;
        }
        dispatched
    }

    /// Resolves, selects and grants a reward for one player. Runs on the
    /// player's owner context.
    pub fn distribute_to(&self, player: PlayerId) -> GrantOutcome {
        if !self.directory.is_online(player) {
            return GrantOutcome::Offline;
        }
        let now = self.clock.now();
        // Re-check against the live session: the player may have left or been
        // rewarded since the snapshot was taken.
        match self
            .store
            .update(player, |s| s.is_eligible_for_reward(now, self.interval))
        {
            None => return GrantOutcome::MissingSession,
            Some(false) => return GrantOutcome::NotEligible,
            Some(true) => {}
        }

        let rewards = self.catalog.snapshot();
        let Some(pool) = rewards.resolve(player, self.permissions.as_ref()) else {
            debug!(%player, "no reward pool resolves for player");
            return GrantOutcome::NoPool;
        };
        let reward = select_reward(&pool, &mut rand::thread_rng());
        if reward.is_none() {
            debug!(%player, pool = %pool.name(), "reward pool is empty");
        }
        self.grant(player, reward)
    }

    /// Applies `reward` and records it on the session. An absent reward or a
    /// failing grant is logged and leaves the session untouched.
    pub fn grant(&self, player: PlayerId, reward: Option<&Reward>) -> GrantOutcome {
        let Some(reward) = reward else {
            warn!(%player, "attempted to grant an absent reward");
            return GrantOutcome::NoReward;
        };

        if let Err(e) = self.granter.grant(player, reward) {
            warn!(%player, reward = %reward.label(), "grant failed: {e}");
            return GrantOutcome::GrantFailed;
        }

        let now = self.clock.now();
        let label = reward.label();
        let kind = reward.kind().name();
        if self
            .store
            .update(player, |s| s.record_grant(now, label, kind))
            .is_none()
        {
            return GrantOutcome::MissingSession;
        }
        debug!(%player, reward = %label, "granted reward");
        GrantOutcome::Granted {
            label: label.to_string(),
            kind,
        }
    }

    /// Runs [`tick`](Self::tick) every `period` on `runtime` until the handle
    /// is aborted.
    pub fn spawn(&self, runtime: &Handle, period: StdDuration) -> JoinHandle<()> {
        let this = self.clone();
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period.max(StdDuration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                this.tick();
            }
        })
    }
}

impl std::fmt::Debug for RewardDistributionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewardDistributionScheduler")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
