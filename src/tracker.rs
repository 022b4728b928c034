//! Movement-driven membership checks.
//!
//! Two stages: the spatial query (pure read, may run on the blocking pool)
//! and the transition (session mutation, always on the owner context). The
//! only link between them is [`OwnerContext::run_on_owner`].

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::context::OwnerContext;
use crate::membership::MembershipStateMachine;
use crate::oracle::{Location, RegionMembershipOracle};
use crate::session::PlayerId;
use crate::store::PlayerSessionStore;

/// Turns host movement events into membership checks.
///
/// Checks run inline or on the runtime depending on `async_checks`; the
/// result is applied on the player's owner context either way.
#[derive(Clone)]
pub struct RegionTracker {
    oracle: Arc<RegionMembershipOracle>,
    machine: MembershipStateMachine,
    store: Arc<PlayerSessionStore>,
    context: Arc<dyn OwnerContext>,
    runtime: Handle,
    async_checks: bool,
}

impl RegionTracker {
    /// Wires a tracker. `runtime` runs asynchronous checks.
    pub fn new(
        oracle: Arc<RegionMembershipOracle>,
        machine: MembershipStateMachine,
        store: Arc<PlayerSessionStore>,
        context: Arc<dyn OwnerContext>,
        runtime: Handle,
        async_checks: bool,
    ) -> Self {
        Self {
            oracle,
            machine,
            store,
            context,
            runtime,
            async_checks,
        }
    }

    /// Movement hook, called on the player's owner. Moves within one block
    /// are ignored.
    pub fn player_moved(&self, player: PlayerId, name: &str, from: &Location, to: &Location) {
        if from.same_block(to) {
            return;
        }
        self.observe(player, name, to.clone());
    }

    /// Ensures a session exists and schedules a membership check at
    /// `location`.
    pub fn observe(&self, player: PlayerId, name: &str, location: Location) {
        self.store.get_or_create(player, name);

        if !self.async_checks {
            let inside = self.oracle.is_in_region(player, &location);
            self.machine.update_membership(player, inside);
            return;
        }

        let oracle = Arc::clone(&self.oracle);
        let machine = self.machine.clone();
        let context = Arc::clone(&self.context);
        self.runtime.spawn_blocking(move || {
            let inside = oracle.is_in_region(player, &location);
            context.run_on_owner(
                player,
                Box::new(move || {
                    machine.update_membership(player, inside);
                }),
            );
        });
    }
}

impl std::fmt::Debug for RegionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionTracker")
            .field("oracle", &self.oracle)
            .field("async_checks", &self.async_checks)
            .finish_non_exhaustive()
    }
}
