//! Display values derived from a session.
//!
//! Pure functions only: everything they need is passed in.

use time::{Duration, OffsetDateTime};

use crate::session::AfkSession;

/// `1h 2m 3s`, `2m 3s` or `3s`. Negative durations render as `0s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.whole_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Values shown by chat, action bars and placeholder services.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDisplay {
    pub time_in_region: Duration,
    pub time_remaining: Duration,
    pub session_time: Duration,
    pub total_afk_time: Duration,
    pub total_rewards: u64,
    pub last_reward: String,
    pub in_region: bool,
    pub reward_tier: String,
    pub rewards_disabled: bool,
}

impl SessionDisplay {
    /// Computes every display value for `session` as of `now`.
    pub fn new(session: &AfkSession, now: OffsetDateTime, reward_interval: Duration) -> Self {
        Self {
            time_in_region: session.time_in_region(now),
            time_remaining: session.time_remaining(now, reward_interval),
            session_time: session.session_time(now),
            total_afk_time: session.accumulated,
            total_rewards: session.total_rewards,
            last_reward: session.last_reward_label.clone(),
            in_region: session.is_in_region(),
            reward_tier: session.tier.clone(),
            rewards_disabled: session.rewards_disabled,
        }
    }

    /// Text for a placeholder key such as `time_remaining`, or `None` for an
    /// unknown key. Keys are case-insensitive.
    pub fn placeholder(&self, key: &str) -> Option<String> {
        let value = match key.to_ascii_lowercase().as_str() {
            "time_in_region" => format_duration(self.time_in_region),
            "time_remaining" => format_duration(self.time_remaining),
            "total_rewards" => self.total_rewards.to_string(),
            "last_reward" => self.last_reward.clone(),
            "in_region" => yes_no(self.in_region).to_string(),
            "reward_tier" => self.reward_tier.to_uppercase(),
            "session_time" => format_duration(self.session_time),
            "total_afk_time" => format_duration(self.total_afk_time),
            "rewards_disabled" => yes_no(self.rewards_disabled).to_string(),
            _ => return None,
        };
        Some(value)
    }
}
