//! Concurrent keyed store of live AFK sessions.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::session::{AfkSession, PlayerId};

/// Live sessions, keyed by player.
///
/// All operations are safe from any thread. Snapshots returned by
/// [`PlayerSessionStore::all`] and [`PlayerSessionStore::in_region`] are
/// cloned out shard by shard: sessions inserted or removed while a snapshot
/// is being taken may or may not appear, but every session in it is a
/// complete copy.
#[derive(Debug, Default)]
pub struct PlayerSessionStore {
    sessions: DashMap<PlayerId, AfkSession>,
}

impl PlayerSessionStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `id`, creating a default one if absent.
    ///
    /// Creation goes through the map's entry lock, so concurrent callers for
    /// the same player observe a single session.
    pub fn get_or_create(&self, id: PlayerId, name: &str) -> AfkSession {
        self.sessions
            .entry(id)
            .or_insert_with(|| AfkSession::new(id, name))
            .clone()
    }

    /// A copy of the session for `id`, if tracked.
    pub fn get(&self, id: PlayerId) -> Option<AfkSession> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    /// Whether a session is tracked for `id`.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Drops the session for `id`.
    ///
    /// # Returns
    ///
    /// The removed session, or `None` if it was not tracked.
    pub fn remove(&self, id: PlayerId) -> Option<AfkSession> {
        self.sessions.remove(&id).map(|(_, s)| s)
    }

    /// Mutates the session for `id` in place and returns the closure result,
    /// or `None` if there is no such session.
    pub fn update<R>(&self, id: PlayerId, f: impl FnOnce(&mut AfkSession) -> R) -> Option<R> {
        self.sessions.get_mut(&id).map(|mut s| f(s.value_mut()))
    }

    /// Installs a session loaded from persistence.
    ///
    /// If the player was already observed (and possibly entered the region)
    /// before the load finished, the live region state is kept and only the
    /// stored statistics are taken over.
    pub fn attach_persisted(&self, stored: AfkSession, name: &str) {
        match self.sessions.entry(stored.id) {
            Entry::Occupied(mut live) => {
                let live = live.get_mut();
                live.absorb_persisted(stored);
                live.name = name.to_string();
            }
            Entry::Vacant(slot) => {
                let mut stored = stored;
                stored.entered_at = None;
                stored.name = name.to_string();
                slot.insert(stored);
            }
        }
    }

    /// Snapshot of every tracked session, in no particular order.
    pub fn all(&self) -> Vec<AfkSession> {
        self.sessions.iter().map(|s| s.value().clone()).collect()
    }

    /// Snapshot of the sessions currently inside the region.
    pub fn in_region(&self) -> Vec<AfkSession> {
        self.sessions
            .iter()
            .filter(|s| s.is_in_region())
            .map(|s| s.value().clone())
            .collect()
    }

    /// Number of tracked sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of sessions inside the region, counted without cloning.
    pub fn in_region_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_in_region()).count()
    }

    /// Drops every session. Nothing is saved.
    pub fn clear(&self) {
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn get_or_create_returns_existing_session() {
        let store = PlayerSessionStore::new();
        let id = Uuid::new_v4();
        store.get_or_create(id, "Steve");
        store.update(id, |s| s.total_rewards = 4);

        let again = store.get_or_create(id, "Renamed");
        assert_eq!(again.total_rewards, 4);
        assert_eq!(again.name, "Steve");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_creation_yields_one_session() {
        let store = Arc::new(PlayerSessionStore::new());
        let id = Uuid::new_v4();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.get_or_create(id, "Steve");
                        store.update(id, |s| s.total_rewards += 1);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id).unwrap().total_rewards, 800);
    }

    #[test]
    fn in_region_snapshot_filters_on_entry() {
        let store = PlayerSessionStore::new();
        let inside = Uuid::new_v4();
        let outside = Uuid::new_v4();
        store.get_or_create(inside, "In");
        store.get_or_create(outside, "Out");
        store.update(inside, |s| s.enter(OffsetDateTime::UNIX_EPOCH));

        let snapshot = store.in_region();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, inside);
        assert_eq!(store.in_region_count(), 1);
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn update_and_remove_on_missing_player() {
        let store = PlayerSessionStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.update(id, |s| s.total_rewards), None);
        assert!(store.remove(id).is_none());
        assert!(store.get(id).is_none());
    }

    #[test]
    fn attach_persisted_inserts_out_of_region() {
        let store = PlayerSessionStore::new();
        let id = Uuid::new_v4();
        let mut stored = AfkSession::new(id, "Old");
        stored.total_rewards = 12;
        stored.entered_at = Some(OffsetDateTime::UNIX_EPOCH);

        store.attach_persisted(stored, "New");
        let session = store.get(id).unwrap();
        assert_eq!(session.total_rewards, 12);
        assert_eq!(session.name, "New");
        assert!(!session.is_in_region());
    }
}
