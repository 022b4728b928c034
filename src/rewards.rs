//! Reward definitions and pools.

use std::sync::Arc;

use crate::session::PlayerId;

/// Label used when a reward has neither a display name nor an item name.
pub const UNKNOWN_REWARD_LABEL: &str = "Unknown Reward";

/// An enchantment applied to an item reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enchantment {
    pub name: String,
    pub level: u32,
}

/// An item stack handed to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReward {
    pub material: String,
    pub amount: u32,
    pub name: Option<String>,
    pub lore: Vec<String>,
    pub glow: bool,
    pub enchantments: Vec<Enchantment>,
    pub flags: Vec<String>,
    pub custom_model_data: Option<i32>,
}

/// Console commands run on grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReward {
    pub commands: Vec<String>,
}

impl CommandReward {
    /// Commands with `%player%` and `%uuid%` substituted.
    pub fn render(&self, player_name: &str, player: PlayerId) -> Vec<String> {
        let uuid = player.to_string();
        self.commands
            .iter()
            .map(|c| c.replace("%player%", player_name).replace("%uuid%", &uuid))
            .collect()
    }
}

/// Experience points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperienceReward {
    pub amount: u32,
}

/// What a reward actually gives.
#[derive(Debug, Clone, PartialEq)]
pub enum RewardKind {
    Item(ItemReward),
    Command(CommandReward),
    Experience(ExperienceReward),
}

impl RewardKind {
    /// Name used for the per-kind counters on a session.
    pub fn name(&self) -> &'static str {
        match self {
            RewardKind::Item(_) => "ITEM",
            RewardKind::Command(_) => "COMMAND",
            RewardKind::Experience(_) => "EXPERIENCE",
        }
    }
}

/// A single weighted entry of a pool. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Reward {
    kind: RewardKind,
    weight: f64,
    display_name: Option<String>,
}

impl Reward {
    /// A reward drawn with relative `weight`.
    pub fn new(kind: RewardKind, weight: f64) -> Self {
        Self {
            kind,
            weight,
            display_name: None,
        }
    }

    /// Overrides the label shown to players.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// What the reward gives.
    pub fn kind(&self) -> &RewardKind {
        &self.kind
    }

    /// Relative selection weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Display name, else the item name, else [`UNKNOWN_REWARD_LABEL`].
    pub fn label(&self) -> &str {
        if let Some(name) = &self.display_name {
            return name;
        }
        match &self.kind {
            RewardKind::Item(ItemReward {
                name: Some(name), ..
            }) => name,
            _ => UNKNOWN_REWARD_LABEL,
        }
    }
}

/// Rewards available to one permission tier.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardPool {
    name: String,
    permission: String,
    enabled: bool,
    rewards: Vec<Reward>,
    total_weight: f64,
}

impl RewardPool {
    /// An empty pool; see [`add_reward`](Self::add_reward).
    pub fn new(name: impl Into<String>, permission: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            permission: permission.into(),
            enabled,
            rewards: Vec::new(),
            total_weight: 0.0,
        }
    }

    /// Appends a reward; the total weight is kept up to date here.
    pub fn add_reward(&mut self, reward: Reward) {
        self.total_weight += reward.weight;
        self.rewards.push(reward);
    }

    /// Pool name, also the tier it serves.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Permission node granting access to this pool.
    pub fn permission(&self) -> &str {
        &self.permission
    }

    /// Disabled pools are never resolved.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Rewards in load order.
    pub fn rewards(&self) -> &[Reward] {
        &self.rewards
    }

    /// Sum of every reward weight.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Whether the pool holds at least one reward.
    pub fn has_rewards(&self) -> bool {
        !self.rewards.is_empty()
    }
}

/// Shared handle to a loaded pool.
pub type SharedPool = Arc<RewardPool>;
