//! Runtime settings for the AFK pool.
//!
//! The host owns the on-disk format; it deserializes an [`AfkConfig`] from
//! whatever source it likes (every key is optional and kebab-cased) or builds
//! one with the `with_*` setters.

use serde::Deserialize;
use time::Duration;

const TICK_MILLIS: u64 = 50;

/// Length of one server tick.
pub const TICK: Duration = Duration::milliseconds(TICK_MILLIS as i64);

/// Settings that drive membership caching, reward timing and persistence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AfkConfig {
    /// Name of the region players stand in to earn rewards.
    pub region_name: String,
    /// Seconds a player must stay in the region between rewards.
    pub reward_interval_secs: u64,
    /// Permission tiers, highest priority first. `"default"` always matches.
    pub tier_priority: Vec<String>,
    /// Keep sessions across disconnects and save them through the repository.
    pub persist_data: bool,
    /// Ticks between autosave sweeps.
    pub save_interval_ticks: u64,
    /// Ticks a membership answer stays cached.
    pub region_cache_ticks: u64,
    /// Maximum number of cached membership answers.
    pub region_cache_max_entries: usize,
    /// Ticks between reward distribution passes.
    pub distribution_period_ticks: u64,
    /// Run spatial queries on the blocking pool instead of the owner thread.
    pub async_region_checks: bool,
}

impl Default for AfkConfig {
    fn default() -> Self {
        Self {
            region_name: "afk".to_string(),
            reward_interval_secs: 300,
            tier_priority: vec!["default".to_string()],
            persist_data: true,
            save_interval_ticks: 6000,
            region_cache_ticks: 20,
            region_cache_max_entries: 1000,
            distribution_period_ticks: 20,
            async_region_checks: true,
        }
    }
}

impl AfkConfig {
    /// Sets `region-name`.
    pub fn with_region_name(mut self, region_name: impl Into<String>) -> Self {
        self.region_name = region_name.into();
        self
    }

    /// Sets `reward-interval-secs`.
    pub fn with_reward_interval_secs(mut self, secs: u64) -> Self {
        self.reward_interval_secs = secs;
        self
    }

    /// Sets `tier-priority`, highest tier first.
    pub fn with_tier_priority<I, S>(mut self, tiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tier_priority = tiers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets `persist-data`.
    pub fn with_persist_data(mut self, persist: bool) -> Self {
        self.persist_data = persist;
        self
    }

    /// Sets `region-cache-ticks` and `region-cache-max-entries`.
    pub fn with_region_cache(mut self, ticks: u64, max_entries: usize) -> Self {
        self.region_cache_ticks = ticks;
        self.region_cache_max_entries = max_entries;
        self
    }

    /// Sets `async-region-checks`. Tests and single-threaded hosts usually
    /// turn it off so checks complete before the call returns.
    pub fn with_async_region_checks(mut self, enabled: bool) -> Self {
        self.async_region_checks = enabled;
        self
    }

    /// `reward-interval-secs` as a duration, saturating at `i64::MAX` seconds.
    pub fn reward_interval(&self) -> Duration {
        Duration::seconds(i64::try_from(self.reward_interval_secs).unwrap_or(i64::MAX))
    }

    /// How long a membership answer stays cached.
    pub fn region_cache_ttl(&self) -> std::time::Duration {
        ticks_to_std(self.region_cache_ticks)
    }

    /// Period of the autosave sweep. Zero disables it.
    pub fn save_period(&self) -> std::time::Duration {
        ticks_to_std(self.save_interval_ticks)
    }

    /// Period of the reward distribution pass.
    pub fn distribution_period(&self) -> std::time::Duration {
        ticks_to_std(self.distribution_period_ticks)
    }
}

fn ticks_to_std(ticks: u64) -> std::time::Duration {
    std::time::Duration::from_millis(ticks.saturating_mul(TICK_MILLIS))
}
