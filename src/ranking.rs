//! Leaderboard queries over the session store.

use std::sync::Arc;

use crate::session::{AfkSession, PlayerId};
use crate::store::PlayerSessionStore;

/// Metric a leaderboard is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMetric {
    RewardCount,
    AccumulatedDuration,
}

/// Read-only rankings. Each query sorts a fresh snapshot; ties keep snapshot
/// order.
#[derive(Debug, Clone)]
pub struct RankingIndex {
    store: Arc<PlayerSessionStore>,
}

impl RankingIndex {
    /// Rankings over `store`.
    pub fn new(store: Arc<PlayerSessionStore>) -> Self {
        Self { store }
    }

    /// Up to `limit` sessions, most rewards first.
    pub fn top_by_reward_count(&self, limit: usize) -> Vec<AfkSession> {
        self.top(RankMetric::RewardCount, limit)
    }

    /// Up to `limit` sessions, most banked AFK time first. The current
    /// stint is not counted.
    pub fn top_by_accumulated_duration(&self, limit: usize) -> Vec<AfkSession> {
        self.top(RankMetric::AccumulatedDuration, limit)
    }

    /// Up to `limit` sessions ordered by `metric`, best first.
    pub fn top(&self, metric: RankMetric, limit: usize) -> Vec<AfkSession> {
        let mut sorted = self.sorted(metric);
        sorted.truncate(limit);
        sorted
    }

    /// 1-indexed position of `player`, or `None` if it is not in the store.
    pub fn rank_of(&self, player: PlayerId, metric: RankMetric) -> Option<usize> {
        self.sorted(metric)
            .iter()
            .position(|s| s.id == player)
            .map(|idx| idx + 1)
    }

    fn sorted(&self, metric: RankMetric) -> Vec<AfkSession> {
        let mut sessions = self.store.all();
        // `sort_by` is stable.
        match metric {
            RankMetric::RewardCount => sessions.sort_by(|a, b| b.total_rewards.cmp(&a.total_rewards)),
            RankMetric::AccumulatedDuration => {
                sessions.sort_by(|a, b| b.accumulated.cmp(&a.accumulated))
            }
        }
        sessions
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;
    use uuid::Uuid;

    use super::*;

    fn seeded(stats: &[(u64, i64)]) -> (RankingIndex, Vec<PlayerId>) {
        let store = Arc::new(PlayerSessionStore::new());
        let ids = stats
            .iter()
            .map(|(rewards, minutes)| {
                let id = Uuid::new_v4();
                store.get_or_create(id, "p");
                store.update(id, |s| {
                    s.total_rewards = *rewards;
                    s.accumulated = Duration::minutes(*minutes);
                });
                id
            })
            .collect();
        (RankingIndex::new(store), ids)
    }

    #[test]
    fn empty_store_has_no_ranks() {
        let (index, _) = seeded(&[]);
        assert_eq!(index.rank_of(Uuid::new_v4(), RankMetric::RewardCount), None);
        assert!(index.top_by_reward_count(10).is_empty());
    }

    #[test]
    fn rankings_sort_descending_per_metric() {
        let (index, ids) = seeded(&[(5, 10), (9, 1), (1, 60)]);

        let top = index.top_by_reward_count(2);
        assert_eq!(top.iter().map(|s| s.id).collect::<Vec<_>>(), vec![ids[1], ids[0]]);

        let by_time = index.top_by_accumulated_duration(10);
        assert_eq!(by_time[0].id, ids[2]);
        assert_eq!(by_time.len(), 3);

        assert_eq!(index.rank_of(ids[1], RankMetric::RewardCount), Some(1));
        assert_eq!(index.rank_of(ids[2], RankMetric::RewardCount), Some(3));
        assert_eq!(index.rank_of(ids[2], RankMetric::AccumulatedDuration), Some(1));
        assert_eq!(index.rank_of(Uuid::new_v4(), RankMetric::AccumulatedDuration), None);
    }

    #[test]
    fn single_player_is_first() {
        let (index, ids) = seeded(&[(0, 0)]);
        assert_eq!(index.rank_of(ids[0], RankMetric::RewardCount), Some(1));
        assert_eq!(index.top(RankMetric::RewardCount, 0).len(), 0);
    }
}
