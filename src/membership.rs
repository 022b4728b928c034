//! Edge-triggered region membership transitions.

use std::sync::Arc;

use time::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::host::{MembershipObserver, PlayerDirectory};
use crate::persistence::PersistenceGateway;
use crate::session::{AfkSession, PlayerId};
use crate::store::PlayerSessionStore;

/// A transition that actually fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Entered,
    Exited { stint: Duration },
}

/// Applies observed membership to sessions.
///
/// Must be driven from the player's owner context. Repeated observations of
/// the current state are no-ops, and observations for players that went
/// offline or whose session was dropped are discarded.
#[derive(Clone)]
pub struct MembershipStateMachine {
    store: Arc<PlayerSessionStore>,
    directory: Arc<dyn PlayerDirectory>,
    observer: Arc<dyn MembershipObserver>,
    persistence: PersistenceGateway,
    clock: Arc<dyn Clock>,
}

impl MembershipStateMachine {
    /// Wires the state machine over the shared store.
    pub fn new(
        store: Arc<PlayerSessionStore>,
        directory: Arc<dyn PlayerDirectory>,
        observer: Arc<dyn MembershipObserver>,
        persistence: PersistenceGateway,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            observer,
            persistence,
            clock,
        }
    }

    /// Applies one observation for an online player.
    ///
    /// # Returns
    ///
    /// The transition that fired, or `None` when the observation matched the
    /// current state, the player is offline, or no session exists.
    pub fn update_membership(&self, player: PlayerId, inside: bool) -> Option<Transition> {
        if !self.directory.is_online(player) {
            debug!(%player, "dropping membership result for offline player");
            return None;
        }
        self.apply(player, inside)
    }

    /// Forces the player out without the online check; used on disconnect.
    pub fn force_exit(&self, player: PlayerId) -> Option<Transition> {
        self.apply(player, false)
    }

    fn apply(&self, player: PlayerId, inside: bool) -> Option<Transition> {
        let now = self.clock.now();
        let (transition, snapshot) = self.store.update(player, |session| {
            let transition = if inside {
                session.enter(now).then_some(Transition::Entered)
            } else {
                session.exit(now).map(|stint| Transition::Exited { stint })
            };
            (transition, transition.map(|_| session.clone()))
        })?;

        let (Some(transition), Some(snapshot)) = (transition, snapshot) else {
            return None;
        };
        self.notify(transition, &snapshot);
        self.persistence.save_in_background(snapshot);
        Some(transition)
    }

    fn notify(&self, transition: Transition, session: &AfkSession) {
        match transition {
            Transition::Entered => {
                debug!(player = %session.id, name = %session.name, "entered afk region");
                self.observer.on_enter(session);
            }
            Transition::Exited { stint } => {
                debug!(
                    player = %session.id,
                    name = %session.name,
                    stint_ms = stint.whole_milliseconds() as i64,
                    "exited afk region"
                );
                self.observer.on_exit(session, stint);
            }
        }
    }

    /// Forces `Out` and zeroes entry time, accumulated time and last reward
    /// time, regardless of the current state. Returns `false` for unknown
    /// players.
    pub fn reset(&self, player: PlayerId) -> bool {
        self.store.update(player, AfkSession::reset).is_some()
    }
}

impl std::fmt::Debug for MembershipStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipStateMachine")
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use parking_lot::Mutex;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::clock::ManualClock;

    #[derive(Default)]
    struct Online(Mutex<HashSet<PlayerId>>);

    impl PlayerDirectory for Online {
        fn is_online(&self, player: PlayerId) -> bool {
            self.0.lock().contains(&player)
        }
    }

    #[derive(Default)]
    struct Recorder {
        entered: Mutex<Vec<PlayerId>>,
        exited: Mutex<Vec<(PlayerId, Duration)>>,
    }

    impl MembershipObserver for Recorder {
        fn on_enter(&self, session: &AfkSession) {
            self.entered.lock().push(session.id);
        }

        fn on_exit(&self, session: &AfkSession, stint: Duration) {
            self.exited.lock().push((session.id, stint));
        }
    }

    struct Fixture {
        machine: MembershipStateMachine,
        store: Arc<PlayerSessionStore>,
        online: Arc<Online>,
        recorder: Arc<Recorder>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(PlayerSessionStore::new());
        let online = Arc::new(Online::default());
        let recorder = Arc::new(Recorder::default());
        let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH + Duration::days(1)));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let machine = MembershipStateMachine::new(
            Arc::clone(&store),
            online.clone(),
            recorder.clone(),
            PersistenceGateway::disabled(runtime.handle().clone()),
            clock.clone(),
        );
        Fixture {
            machine,
            store,
            online,
            recorder,
            clock,
        }
    }

    fn join(f: &Fixture) -> PlayerId {
        let id = Uuid::new_v4();
        f.online.0.lock().insert(id);
        f.store.get_or_create(id, "Steve");
        id
    }

    #[test]
    fn entering_twice_notifies_once() {
        let f = fixture();
        let id = join(&f);

        assert_eq!(f.machine.update_membership(id, true), Some(Transition::Entered));
        assert_eq!(f.machine.update_membership(id, true), None);
        assert_eq!(*f.recorder.entered.lock(), vec![id]);

        let session = f.store.get(id).unwrap();
        assert_eq!(session.entered_at, Some(f.clock.now()));
        assert_eq!(session.last_reward_at, f.clock.now());
    }

    #[test]
    fn exit_adds_exactly_the_elapsed_time() {
        let f = fixture();
        let id = join(&f);

        f.machine.update_membership(id, true);
        f.clock.advance(Duration::milliseconds(42_500));
        assert_eq!(
            f.machine.update_membership(id, false),
            Some(Transition::Exited {
                stint: Duration::milliseconds(42_500)
            })
        );
        assert_eq!(f.machine.update_membership(id, false), None);

        f.machine.update_membership(id, true);
        f.clock.advance(Duration::seconds(10));
        f.machine.update_membership(id, false);

        let session = f.store.get(id).unwrap();
        assert_eq!(session.accumulated, Duration::milliseconds(52_500));
        assert!(session.entered_at.is_none());
        assert_eq!(f.recorder.exited.lock().len(), 2);
    }

    #[test]
    fn late_results_never_resurrect_sessions() {
        let f = fixture();
        let id = join(&f);
        f.store.remove(id);

        assert_eq!(f.machine.update_membership(id, true), None);
        assert!(f.store.get(id).is_none());
    }

    #[test]
    fn offline_players_are_ignored() {
        let f = fixture();
        let id = join(&f);
        f.online.0.lock().remove(&id);

        assert_eq!(f.machine.update_membership(id, true), None);
        assert!(!f.store.get(id).unwrap().is_in_region());
    }

    #[test]
    fn force_exit_works_for_departing_players() {
        let f = fixture();
        let id = join(&f);
        f.machine.update_membership(id, true);
        f.online.0.lock().remove(&id);
        f.clock.advance(Duration::seconds(5));

        assert_eq!(
            f.machine.force_exit(id),
            Some(Transition::Exited {
                stint: Duration::seconds(5)
            })
        );
    }

    #[test]
    fn reset_zeroes_progress_unconditionally() {
        let f = fixture();
        let id = join(&f);
        f.machine.update_membership(id, true);
        f.clock.advance(Duration::minutes(2));
        f.machine.update_membership(id, false);
        f.machine.update_membership(id, true);

        assert!(f.machine.reset(id));
        let session = f.store.get(id).unwrap();
        assert!(session.entered_at.is_none());
        assert_eq!(session.accumulated, Duration::ZERO);
        assert_eq!(session.last_reward_at, OffsetDateTime::UNIX_EPOCH);
        assert!(!f.machine.reset(Uuid::new_v4()));

        // The next observation re-enters normally.
        assert_eq!(f.machine.update_membership(id, true), Some(Transition::Entered));
    }
}
