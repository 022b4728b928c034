//! Turning reward configuration into [`RewardPool`]s.
//!
//! The host parses its configuration files into [`PoolDefinition`]s; this
//! module validates them. A reward whose required fields are unusable is
//! dropped with a warning and loading continues. An optional field that is
//! invalid (bad material, enchantment or item flag) is defaulted or dropped
//! and the reward itself still loads.

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::rewards::{
    CommandReward, Enchantment, ExperienceReward, ItemReward, Reward, RewardKind, RewardPool,
};

const DEFAULT_MATERIAL: &str = "STONE";

/// Why a reward entry was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum RewardLoadError {
    #[error("unknown reward type `{0}`")]
    UnknownType(String),
    #[error("weight must be a non-negative finite number, got {0}")]
    InvalidWeight(f64),
    #[error("command reward has no commands")]
    NoCommands,
}

/// One pool as written in configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PoolDefinition {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub permission: String,
    #[serde(default)]
    pub rewards: Vec<RewardDefinition>,
}

fn enabled_by_default() -> bool {
    true
}

/// One reward as written in configuration. Which fields matter depends on
/// `type`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RewardDefinition {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub chance: Option<f64>,
    pub display_name: Option<String>,
    pub material: Option<String>,
    pub amount: Option<u32>,
    pub name: Option<String>,
    pub lore: Vec<String>,
    pub glow: bool,
    pub enchantments: Vec<String>,
    pub flags: Vec<String>,
    pub custom_model_data: Option<i32>,
    pub commands: Vec<String>,
}

/// Builds every pool that ends up with at least one reward.
pub fn load_pools(definitions: &[PoolDefinition]) -> Vec<RewardPool> {
    let mut pools = Vec::with_capacity(definitions.len());
    for def in definitions {
        let mut pool = RewardPool::new(def.name.clone(), def.permission.clone(), def.enabled);
        for (index, reward_def) in def.rewards.iter().enumerate() {
            match build_reward(reward_def) {
                Ok(reward) => pool.add_reward(reward),
                Err(e) => warn!(pool = %def.name, index, "skipping reward: {e}"),
            }
        }
        if pool.has_rewards() {
            info!(
                pool = %pool.name(),
                rewards = pool.rewards().len(),
                "loaded reward pool"
            );
            pools.push(pool);
        } else {
            warn!(pool = %def.name, "reward pool has no usable rewards; not registered");
        }
    }
    pools
}

/// Validates a single reward definition.
pub fn build_reward(def: &RewardDefinition) -> Result<Reward, RewardLoadError> {
    let weight = def.chance.unwrap_or(1.0);
    if !weight.is_finite() || weight < 0.0 {
        return Err(RewardLoadError::InvalidWeight(weight));
    }

    let kind_name = def.kind.as_deref().unwrap_or("ITEM").to_ascii_uppercase();
    let kind = match kind_name.as_str() {
        "ITEM" => RewardKind::Item(build_item(def)),
        "COMMAND" => {
            if def.commands.is_empty() {
                return Err(RewardLoadError::NoCommands);
            }
            RewardKind::Command(CommandReward {
                commands: def.commands.clone(),
            })
        }
        "EXPERIENCE" => RewardKind::Experience(ExperienceReward {
            amount: def.amount.unwrap_or(0),
        }),
        _ => return Err(RewardLoadError::UnknownType(kind_name)),
    };

    let mut reward = Reward::new(kind, weight);
    if let Some(name) = &def.display_name {
        reward = reward.with_display_name(name.clone());
    }
    Ok(reward)
}

fn build_item(def: &RewardDefinition) -> ItemReward {
    let material = match def.material.as_deref() {
        None => DEFAULT_MATERIAL.to_string(),
        Some(raw) if is_identifier(raw) => raw.to_ascii_uppercase(),
        Some(raw) => {
            warn!(material = raw, "invalid material; using {DEFAULT_MATERIAL}");
            DEFAULT_MATERIAL.to_string()
        }
    };

    let enchantments = def
        .enchantments
        .iter()
        .filter_map(|raw| {
            let parsed = parse_enchantment(raw);
            if parsed.is_none() {
                warn!(enchantment = %raw, "invalid enchantment; dropped");
            }
            parsed
        })
        .collect();

    let flags = def
        .flags
        .iter()
        .filter_map(|raw| {
            if is_identifier(raw) {
                Some(raw.to_ascii_uppercase())
            } else {
                warn!(flag = %raw, "invalid item flag; dropped");
                None
            }
        })
        .collect();

    ItemReward {
        material,
        amount: def.amount.unwrap_or(1),
        name: def.name.clone(),
        lore: def.lore.clone(),
        glow: def.glow,
        enchantments,
        flags,
        custom_model_data: def.custom_model_data,
    }
}

/// `NAME:level`, e.g. `sharpness:5`.
fn parse_enchantment(raw: &str) -> Option<Enchantment> {
    let (name, level) = raw.split_once(':')?;
    if !is_identifier(name) {
        return None;
    }
    let level = level.trim().parse().ok()?;
    Some(Enchantment {
        name: name.to_ascii_uppercase(),
        level,
    })
}

fn is_identifier(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
