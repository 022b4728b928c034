//! Persistence gateway.
//!
//! The core never waits on storage from an owner thread. Every repository
//! call goes through a single writer task on the tokio runtime, so saves and
//! loads for a player reach the backend in the order they were issued.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::session::{AfkSession, PlayerId};
use crate::store::PlayerSessionStore;

/// Storage backend for AFK sessions.
///
/// Only the persisted statistics round-trip: a loaded session is always
/// outside the region.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Fetches the stored session for `player`.
    ///
    /// # Returns
    ///
    /// `None` when nothing has been stored for the player yet.
    async fn load(&self, player: PlayerId) -> Result<Option<AfkSession>>;

    /// Inserts or replaces the stored statistics for `session.id`.
    async fn save(&self, session: &AfkSession) -> Result<()>;

    /// Removes the stored session. Deleting an unknown player is not an error.
    async fn delete(&self, player: PlayerId) -> Result<()>;

    /// Number of stored sessions.
    async fn count(&self) -> Result<u64>;
}

enum Command {
    Save(AfkSession),
    SaveAll(Vec<AfkSession>, oneshot::Sender<usize>),
    Load(PlayerId, oneshot::Sender<Option<AfkSession>>),
    Flush(oneshot::Sender<()>),
}

/// Dispatches repository work off the caller's thread.
///
/// Commands are queued to one writer task per gateway, which runs them
/// strictly in order. With no repository configured (persistence disabled)
/// every call is a no-op.
#[derive(Clone)]
pub struct PersistenceGateway {
    queue: Option<mpsc::UnboundedSender<Command>>,
    runtime: Handle,
}

impl PersistenceGateway {
    /// Creates a gateway and, when `repository` is set, spawns its writer
    /// task on `runtime`.
    pub fn new(repository: Option<Arc<dyn SessionRepository>>, runtime: Handle) -> Self {
        let queue = repository.map(|repository| {
            let (tx, rx) = mpsc::unbounded_channel();
            runtime.spawn(run_writer(repository, rx));
            tx
        });
        Self { queue, runtime }
    }

    /// A gateway with persistence turned off.
    pub fn disabled(runtime: Handle) -> Self {
        Self::new(None, runtime)
    }

    /// Whether a repository is configured.
    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    fn send(&self, command: Command) -> bool {
        match &self.queue {
            Some(queue) => queue.send(command).is_ok(),
            None => false,
        }
    }

    /// Loads a stored session, logging and swallowing backend errors.
    ///
    /// The load runs after every save queued before it.
    pub async fn load(&self, player: PlayerId) -> Option<AfkSession> {
        let (tx, rx) = oneshot::channel();
        if !self.send(Command::Load(player, tx)) {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Queues a save of `session` behind every earlier save.
    pub fn save_in_background(&self, session: AfkSession) {
        if self.is_enabled() && !self.send(Command::Save(session)) {
            error!("persistence writer has stopped; save dropped");
        }
    }

    /// Saves every session in `store`, returning how many were written.
    pub async fn save_all(&self, store: &PlayerSessionStore) -> usize {
        let (tx, rx) = oneshot::channel();
        if !self.send(Command::SaveAll(store.all(), tx)) {
            return 0;
        }
        let saved = rx.await.unwrap_or(0);
        info!(saved, "saved afk sessions");
        saved
    }

    /// Completes once every command queued before it has run.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::Flush(tx)) {
            let _ = rx.await;
        }
    }

    /// Starts the periodic save sweep. Returns `None` when persistence is
    /// disabled.
    pub fn spawn_autosave(
        &self,
        store: Arc<PlayerSessionStore>,
        period: Duration,
    ) -> Option<JoinHandle<()>> {
        if !self.is_enabled() || period.is_zero() {
            return None;
        }
        let gateway = self.clone();
        Some(self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                gateway.save_all(&store).await;
            }
        }))
    }
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

async fn run_writer(
    repository: Arc<dyn SessionRepository>,
    mut queue: mpsc::UnboundedReceiver<Command>,
) {
    while let Some(command) = queue.recv().await {
        match command {
            Command::Save(session) => {
                write(repository.as_ref(), &session).await;
            }
            Command::SaveAll(sessions, reply) => {
                let mut saved = 0;
                for session in &sessions {
                    if write(repository.as_ref(), session).await {
                        saved += 1;
                    }
                }
                let _ = reply.send(saved);
            }
            Command::Load(player, reply) => {
                let found = match repository.load(player).await {
                    Ok(found) => {
                        debug!(%player, found = found.is_some(), "loaded afk session");
                        found
                    }
                    Err(e) => {
                        error!(%player, "failed to load afk session: {e}");
                        None
                    }
                };
                let _ = reply.send(found);
            }
            Command::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }
    debug!("persistence writer stopped");
}

async fn write(repository: &dyn SessionRepository, session: &AfkSession) -> bool {
    match repository.save(session).await {
        Ok(()) => {
            debug!(player = %session.id, "saved afk session");
            true
        }
        Err(e) => {
            error!(player = %session.id, "failed to save afk session: {e}");
            false
        }
    }
}


#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::memory::MemoryRepository;
    use super::*;

    #[tokio::test]
    async fn disabled_gateway_does_nothing() {
        let gateway = PersistenceGateway::disabled(Handle::current());
        let store = PlayerSessionStore::new();
        store.get_or_create(Uuid::new_v4(), "Steve");

        assert!(!gateway.is_enabled());
        assert_eq!(gateway.save_all(&store).await, 0);
        assert!(gateway.load(Uuid::new_v4()).await.is_none());
        assert!(gateway
            .spawn_autosave(Arc::new(store), Duration::from_secs(1))
            .is_none());
    }

    #[tokio::test]
    async fn save_all_writes_every_session() {
        let repo = Arc::new(MemoryRepository::default());
        let gateway = PersistenceGateway::new(Some(repo.clone()), Handle::current());
        let store = PlayerSessionStore::new();
        let id = Uuid::new_v4();
        store.get_or_create(id, "Steve");
        store.get_or_create(Uuid::new_v4(), "Alex");

        assert_eq!(gateway.save_all(&store).await, 2);
        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(gateway.load(id).await.unwrap().name, "Steve");
    }

    #[tokio::test]
    async fn background_save_lands_after_flush() {
        let repo = Arc::new(MemoryRepository::default());
        let gateway = PersistenceGateway::new(Some(repo.clone()), Handle::current());
        let session = AfkSession::new(Uuid::new_v4(), "Steve");

        gateway.save_in_background(session.clone());
        gateway.flush().await;
        assert_eq!(repo.load(session.id).await.unwrap(), Some(session));
    }

    /// Records save order and stalls on snapshots with no accumulated time.
    #[derive(Default)]
    struct SlowRepository {
        inner: MemoryRepository,
        order: parking_lot::Mutex<Vec<time::Duration>>,
    }

    #[async_trait]
    impl SessionRepository for SlowRepository {
        async fn load(&self, player: PlayerId) -> Result<Option<AfkSession>> {
            self.inner.load(player).await
        }

        async fn save(&self, session: &AfkSession) -> Result<()> {
            if session.accumulated.is_zero() {
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
            self.order.lock().push(session.accumulated);
            self.inner.save(session).await
        }

        async fn delete(&self, player: PlayerId) -> Result<()> {
            self.inner.delete(player).await
        }

        async fn count(&self) -> Result<u64> {
            self.inner.count().await
        }
    }

    #[tokio::test]
    async fn slow_saves_do_not_overtake_later_ones() {
        let repo = Arc::new(SlowRepository::default());
        let gateway = PersistenceGateway::new(Some(repo.clone()), Handle::current());
        let mut session = AfkSession::new(Uuid::new_v4(), "Steve");

        // Enter snapshot, then the exit snapshot 30 s later.
        gateway.save_in_background(session.clone());
        session.accumulated = time::Duration::seconds(30);
        gateway.save_in_background(session.clone());
        gateway.flush().await;

        assert_eq!(
            *repo.order.lock(),
            vec![time::Duration::ZERO, time::Duration::seconds(30)]
        );
        let stored = repo.load(session.id).await.unwrap().unwrap();
        assert_eq!(stored.accumulated, time::Duration::seconds(30));
    }

    #[tokio::test]
    async fn loads_wait_for_queued_saves() {
        let repo = Arc::new(SlowRepository::default());
        let gateway = PersistenceGateway::new(Some(repo.clone()), Handle::current());
        let session = AfkSession::new(Uuid::new_v4(), "Alex");

        gateway.save_in_background(session.clone());
        assert_eq!(gateway.load(session.id).await, Some(session));
    }

    #[tokio::test]
    async fn save_all_runs_behind_queued_saves() {
        let repo = Arc::new(SlowRepository::default());
        let gateway = PersistenceGateway::new(Some(repo.clone()), Handle::current());
        let store = PlayerSessionStore::new();
        let id = Uuid::new_v4();
        store.get_or_create(id, "Steve");

        let stale = store.get(id).unwrap();
        store.update(id, |s| s.accumulated = time::Duration::seconds(5));
        gateway.save_in_background(stale);

        assert_eq!(gateway.save_all(&store).await, 1);
        let stored = repo.load(id).await.unwrap().unwrap();
        assert_eq!(stored.accumulated, time::Duration::seconds(5));
    }
}
