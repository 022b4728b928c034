//! Owner-context hand-off.
//!
//! Session mutations must run on the execution context that owns the player.
//! A single-threaded host owns every player on its one tick thread, so
//! [`InlineContext`] simply runs the task. A region-threaded host owns each
//! player on the thread of the region the player stands in;
//! [`PartitionedContext`] models that with one worker thread per lane and an
//! [`OwnerLocator`] that maps players to lanes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::session::PlayerId;

/// Work to run on a player's owner.
pub type OwnerTask = Box<dyn FnOnce() + Send + 'static>;

/// Schedules work onto the context that owns a player.
pub trait OwnerContext: Send + Sync {
    fn run_on_owner(&self, player: PlayerId, task: OwnerTask);
}

/// Runs tasks immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineContext;

impl OwnerContext for InlineContext {
    fn run_on_owner(&self, _player: PlayerId, task: OwnerTask) {
        task();
    }
}

/// Maps a player to the lane that currently owns it.
pub trait OwnerLocator: Send + Sync {
    fn lane_for(&self, player: PlayerId, lanes: usize) -> usize;
}

/// Stable assignment by hashing the player id.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashLocator;

impl OwnerLocator for HashLocator {
    fn lane_for(&self, player: PlayerId, lanes: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        player.hash(&mut hasher);
        (hasher.finish() % lanes.max(1) as u64) as usize
    }
}

/// One worker thread per lane, each draining its own queue in order.
pub struct PartitionedContext {
    lanes: RwLock<Vec<mpsc::UnboundedSender<OwnerTask>>>,
    lane_count: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    locator: Arc<dyn OwnerLocator>,
}

impl PartitionedContext {
    /// Starts `lanes` owner threads (at least one) with players assigned by
    /// hashing their id.
    ///
    /// # Errors
    ///
    /// Fails when a worker thread cannot be spawned.
    pub fn new(lanes: usize) -> std::io::Result<Self> {
        Self::with_locator(lanes, Arc::new(HashLocator))
    }

    /// Like [`new`](Self::new), with a custom player-to-lane mapping.
    pub fn with_locator(lanes: usize, locator: Arc<dyn OwnerLocator>) -> std::io::Result<Self> {
        let lanes = lanes.max(1);
        let mut senders = Vec::with_capacity(lanes);
        let mut workers = Vec::with_capacity(lanes);

        for lane in 0..lanes {
            let (tx, mut rx) = mpsc::unbounded_channel::<OwnerTask>();
            let worker = thread::Builder::new()
                .name(format!("afk-owner-{lane}"))
                .spawn(move || {
                    while let Some(task) = rx.blocking_recv() {
                        task();
                    }
                    debug!(lane, "owner lane drained");
                })?;
            senders.push(tx);
            workers.push(worker);
        }

        Ok(Self {
            lanes: RwLock::new(senders),
            lane_count: lanes,
            workers: Mutex::new(workers),
            locator,
        })
    }

    /// Number of owner lanes.
    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    /// Closes every queue and waits for the lanes to finish queued work.
    /// Tasks submitted afterwards are dropped.
    pub fn shutdown(&self) {
        self.lanes.write().clear();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                warn!("owner lane panicked during shutdown");
            }
        }
    }
}

impl OwnerContext for PartitionedContext {
    fn run_on_owner(&self, player: PlayerId, task: OwnerTask) {
        let lane = self.locator.lane_for(player, self.lane_count) % self.lane_count;
        let sent = match self.lanes.read().get(lane) {
            Some(tx) => tx.send(task).is_ok(),
            None => false,
        };
        if !sent {
            warn!(%player, lane, "owner lane closed; dropping task");
        }
    }
}

impl std::fmt::Debug for PartitionedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedContext")
            .field("lanes", &self.lane_count)
            .finish_non_exhaustive()
    }
}
