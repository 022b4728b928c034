//! The assembled AFK pool: wiring, player lifecycle and admin operations.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::{RewardCatalog, RewardSet};
use crate::clock::{Clock, SystemClock};
use crate::config::AfkConfig;
use crate::context::{InlineContext, OwnerContext};
use crate::display::SessionDisplay;
use crate::distribution::RewardDistributionScheduler;
use crate::error::{Error, Result};
use crate::host::{MembershipObserver, NoopObserver, PermissionCheck, PlayerDirectory, RewardGranter};
use crate::loader::{load_pools, PoolDefinition};
use crate::membership::MembershipStateMachine;
use crate::oracle::{CacheStats, Location, RegionMembershipOracle, SpatialEngine};
use crate::persistence::{PersistenceGateway, SessionRepository};
use crate::ranking::{RankMetric, RankingIndex};
use crate::session::{AfkSession, PlayerId};
use crate::store::PlayerSessionStore;
use crate::tracker::RegionTracker;

/// Collects the host seams and settings needed to start an [`AfkPool`].
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use afkpool_sessions::{AfkConfig, AfkPoolBuilder};
/// # async fn example(
/// #     engine: Arc<dyn afkpool_sessions::SpatialEngine>,
/// #     directory: Arc<dyn afkpool_sessions::PlayerDirectory>,
/// #     permissions: Arc<dyn afkpool_sessions::PermissionCheck>,
/// #     granter: Arc<dyn afkpool_sessions::RewardGranter>,
/// #     repository: Arc<dyn afkpool_sessions::SessionRepository>,
/// # ) -> afkpool_sessions::Result<()> {
/// let pool = AfkPoolBuilder::new(AfkConfig::default(), engine, directory, permissions, granter)
///     .with_repository(repository)
///     .start()
///     .await?;
/// pool.spawn_background_tasks();
/// # Ok(())
/// # }
/// ```
pub struct AfkPoolBuilder {
    config: AfkConfig,
    engine: Arc<dyn SpatialEngine>,
    directory: Arc<dyn PlayerDirectory>,
    permissions: Arc<dyn PermissionCheck>,
    granter: Arc<dyn RewardGranter>,
    repository: Option<Arc<dyn SessionRepository>>,
    context: Arc<dyn OwnerContext>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn MembershipObserver>,
    pools: Vec<PoolDefinition>,
}

impl AfkPoolBuilder {
    /// Starts a builder with the four required host seams. Persistence is
    /// off until [`with_repository`](Self::with_repository) is called.
    pub fn new(
        config: AfkConfig,
        engine: Arc<dyn SpatialEngine>,
        directory: Arc<dyn PlayerDirectory>,
        permissions: Arc<dyn PermissionCheck>,
        granter: Arc<dyn RewardGranter>,
    ) -> Self {
        Self {
            config,
            engine,
            directory,
            permissions,
            granter,
            repository: None,
            context: Arc::new(InlineContext),
            clock: Arc::new(SystemClock),
            observer: Arc::new(NoopObserver),
            pools: Vec::new(),
        }
    }

    /// Storage for sessions. Ignored when `persist-data` is off.
    pub fn with_repository(mut self, repository: Arc<dyn SessionRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Where session mutations run. Defaults to [`InlineContext`].
    pub fn with_owner_context(mut self, context: Arc<dyn OwnerContext>) -> Self {
        self.context = context;
        self
    }

    /// Time source for entry, exit and reward timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Receives enter and exit callbacks.
    pub fn with_observer(mut self, observer: Arc<dyn MembershipObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Reward pool definitions registered at start.
    pub fn with_pools(mut self, pools: Vec<PoolDefinition>) -> Self {
        self.pools = pools;
        self
    }

    /// Probes the spatial engine and wires every component.
    ///
    /// Must be called from within a tokio runtime; background saves and
    /// scheduled tasks run on it.
    ///
    /// # Errors
    ///
    /// [`Error::SpatialEngineUnavailable`] when the engine probe fails.
    pub async fn start(self) -> Result<AfkPool> {
        self.engine
            .probe()
            .map_err(|e| Error::SpatialEngineUnavailable(e.to_string()))?;

        let runtime = Handle::current();
        let config = self.config;
        let repository = if config.persist_data {
            self.repository
        } else {
            None
        };
        let persistence = PersistenceGateway::new(repository, runtime.clone());

        let store = Arc::new(PlayerSessionStore::new());
        let oracle = Arc::new(RegionMembershipOracle::new(
            self.engine,
            config.region_name.clone(),
            config.region_cache_ttl(),
            config.region_cache_max_entries,
        ));
        let machine = MembershipStateMachine::new(
            Arc::clone(&store),
            Arc::clone(&self.directory),
            self.observer,
            persistence.clone(),
            Arc::clone(&self.clock),
        );
        let tracker = RegionTracker::new(
            Arc::clone(&oracle),
            machine.clone(),
            Arc::clone(&store),
            Arc::clone(&self.context),
            runtime.clone(),
            config.async_region_checks,
        );
        let catalog = Arc::new(RewardCatalog::new(RewardSet::new(
            config.tier_priority.clone(),
            load_pools(&self.pools),
        )));
        let scheduler = RewardDistributionScheduler::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            self.permissions,
            Arc::clone(&self.directory),
            self.granter,
            Arc::clone(&self.context),
            Arc::clone(&self.clock),
            config.reward_interval(),
        );

        info!(
            region = %config.region_name,
            pools = catalog.snapshot().pool_count(),
            persistence = persistence.is_enabled(),
            "afk pool started"
        );

        Ok(AfkPool {
            rankings: RankingIndex::new(Arc::clone(&store)),
            config,
            store,
            oracle,
            machine,
            tracker,
            catalog,
            scheduler,
            persistence,
            directory: self.directory,
            context: self.context,
            clock: self.clock,
            runtime,
            tasks: Mutex::new(Vec::new()),
        })
    }
}

/// A running AFK pool.
pub struct AfkPool {
    config: AfkConfig,
    store: Arc<PlayerSessionStore>,
    oracle: Arc<RegionMembershipOracle>,
    machine: MembershipStateMachine,
    tracker: RegionTracker,
    catalog: Arc<RewardCatalog>,
    scheduler: RewardDistributionScheduler,
    rankings: RankingIndex,
    persistence: PersistenceGateway,
    directory: Arc<dyn PlayerDirectory>,
    context: Arc<dyn OwnerContext>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AfkPool {
    /// Settings the pool was started with.
    pub fn config(&self) -> &AfkConfig {
        &self.config
    }

    /// The live session store.
    pub fn store(&self) -> &Arc<PlayerSessionStore> {
        &self.store
    }

    /// The reward distribution scheduler, for driving passes by hand.
    pub fn scheduler(&self) -> &RewardDistributionScheduler {
        &self.scheduler
    }

    /// Leaderboard queries over the live store.
    pub fn rankings(&self) -> &RankingIndex {
        &self.rankings
    }

    /// Join hook. With persistence on, the stored session is loaded in the
    /// background and attached on the player's owner.
    pub fn player_joined(&self, player: PlayerId, name: &str) {
        if !self.persistence.is_enabled() {
            self.store.get_or_create(player, name);
            return;
        }
        let loader = self.loader();
        let name = name.to_string();
        self.runtime.spawn(async move {
            loader.load(player, name).await;
        });
    }

    /// Loads and attaches a player's stored session, completing when the
    /// attach has been handed to the owner.
    pub async fn load_player(&self, player: PlayerId, name: &str) {
        self.loader().load(player, name.to_string()).await;
    }

    fn loader(&self) -> SessionLoader {
        SessionLoader {
            store: Arc::clone(&self.store),
            persistence: self.persistence.clone(),
            directory: Arc::clone(&self.directory),
            context: Arc::clone(&self.context),
        }
    }

    /// Quit hook: leaves the region, saves once, and drops the session when
    /// persistence is off.
    ///
    /// # Returns
    ///
    /// The final session state, or `None` for untracked players.
    pub fn player_quit(&self, player: PlayerId) -> Option<AfkSession> {
        // An exit transition queues its own save.
        let exited = self.machine.force_exit(player).is_some();
        self.oracle.invalidate(player);

        if self.persistence.is_enabled() {
            let session = self.store.get(player)?;
            if !exited {
                self.persistence.save_in_background(session.clone());
            }
            Some(session)
        } else {
            self.store.remove(player)
        }
    }

    /// Movement hook. Only block changes reach the region check.
    pub fn player_moved(&self, player: PlayerId, name: &str, from: &Location, to: &Location) {
        self.tracker.player_moved(player, name, from, to);
    }

    /// Checks membership at `location` unconditionally, e.g. after a teleport.
    pub fn observe(&self, player: PlayerId, name: &str, location: Location) {
        self.tracker.observe(player, name, location);
    }

    /// A snapshot of the player's session, if one is tracked.
    pub fn session(&self, player: PlayerId) -> Option<AfkSession> {
        self.store.get(player)
    }

    /// Administrative reset of entry time, accumulated time and last reward
    /// time. The reset session is saved.
    pub fn reset_session(&self, player: PlayerId) -> bool {
        if !self.machine.reset(player) {
            return false;
        }
        if let Some(session) = self.store.get(player) {
            self.persistence.save_in_background(session);
        }
        true
    }

    /// Flips the player's opt-out flag.
    ///
    /// # Returns
    ///
    /// The new value, or `None` for untracked players.
    pub fn toggle_rewards_disabled(&self, player: PlayerId) -> Option<bool> {
        self.store.update(player, |s| {
            s.rewards_disabled = !s.rewards_disabled;
            s.rewards_disabled
        })
    }

    /// Records the player's reward tier label. Returns `false` for untracked
    /// players.
    pub fn set_tier(&self, player: PlayerId, tier: impl Into<String>) -> bool {
        let tier = tier.into();
        self.store.update(player, |s| s.tier = tier).is_some()
    }

    /// Up to `limit` sessions with the most rewards, best first.
    pub fn top_by_reward_count(&self, limit: usize) -> Vec<AfkSession> {
        self.rankings.top_by_reward_count(limit)
    }

    /// Up to `limit` sessions with the most banked AFK time, best first.
    pub fn top_by_accumulated_duration(&self, limit: usize) -> Vec<AfkSession> {
        self.rankings.top_by_accumulated_duration(limit)
    }

    /// One-based rank of `player` under `metric`.
    pub fn rank_of(&self, player: PlayerId, metric: RankMetric) -> Option<usize> {
        self.rankings.rank_of(player, metric)
    }

    /// Display values for status messages and placeholders.
    pub fn display(&self, player: PlayerId) -> Option<SessionDisplay> {
        let session = self.store.get(player)?;
        Some(SessionDisplay::new(
            &session,
            self.clock.now(),
            self.config.reward_interval(),
        ))
    }

    /// Replaces every reward pool and the tier order in one step. Returns the
    /// number of pools registered.
    pub fn reload_rewards(&self, config: &AfkConfig, pools: &[PoolDefinition]) -> usize {
        let set = RewardSet::new(config.tier_priority.clone(), load_pools(pools));
        let count = set.pool_count();
        self.catalog.replace(set);
        info!(pools = count, "reloaded reward pools");
        count
    }

    /// Number of sessions currently tracked.
    pub fn tracked_players(&self) -> usize {
        self.store.len()
    }

    /// Number of tracked players inside the region.
    pub fn players_in_region(&self) -> usize {
        self.store.in_region_count()
    }

    /// Membership cache size and hit counts.
    pub fn cache_stats(&self) -> CacheStats {
        self.oracle.cache_stats()
    }

    /// Starts the distribution pass and, with persistence on, the autosave
    /// sweep. Both stop on [`shutdown`](Self::shutdown).
    pub fn spawn_background_tasks(&self) {
        let mut tasks = self.tasks.lock();
        tasks.push(
            self.scheduler
                .spawn(&self.runtime, self.config.distribution_period()),
        );
        if let Some(autosave) = self
            .persistence
            .spawn_autosave(Arc::clone(&self.store), self.config.save_period())
        {
            tasks.push(autosave);
        }
        debug!(tasks = tasks.len(), "background tasks started");
    }

    /// Saves every tracked session behind any queued saves.
    ///
    /// # Returns
    ///
    /// How many sessions were written; `0` with persistence off.
    pub async fn save_all(&self) -> usize {
        self.persistence.save_all(&self.store).await
    }

    /// Completes once every save queued so far has reached the repository.
    pub async fn flush(&self) {
        self.persistence.flush().await;
    }

    /// Stops background tasks, saves every session and clears the membership
    /// cache.
    pub async fn shutdown(&self) -> usize {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        let saved = self.save_all().await;
        self.oracle.clear_all();
        info!(saved, "afk pool stopped");
        saved
    }
}

impl std::fmt::Debug for AfkPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AfkPool")
            .field("region", &self.config.region_name)
            .field("tracked", &self.store.len())
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}

struct SessionLoader {
    store: Arc<PlayerSessionStore>,
    persistence: PersistenceGateway,
    directory: Arc<dyn PlayerDirectory>,
    context: Arc<dyn OwnerContext>,
}

impl SessionLoader {
    async fn load(self, player: PlayerId, name: String) {
        let stored = self.persistence.load(player).await;
        let store = self.store;
        let directory = self.directory;
        self.context.run_on_owner(
            player,
            Box::new(move || {
                // The player may have left while the load was in flight.
                if !directory.is_online(player) {
                    return;
                }
                match stored {
                    Some(stored) => store.attach_persisted(stored, &name),
                    None => {
                        store.get_or_create(player, &name);
                    }
                }
            }),
        );
    }
}
