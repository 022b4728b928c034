//! AFK session entity model for Sea-ORM database interaction.
//!
//! This module defines the database schema representation for persisted AFK
//! statistics. It provides the Sea-ORM entity definition that maps to the
//! `afk_session` table.

use sea_orm::entity::prelude::*;

/// Sea-ORM entity model representing one player's persisted AFK statistics.
///
/// # Database Schema
///
/// | Column            | Type                 | Description                                  |
/// |-------------------|----------------------|----------------------------------------------|
/// | id                | TEXT (Primary Key)   | Player UUID                                  |
/// | name              | TEXT                 | Last known player name                       |
/// | total_afk_time_ms | BIGINT               | Accumulated in-region time in milliseconds   |
/// | total_rewards     | BIGINT               | Rewards received                             |
/// | last_reward_at    | TIMESTAMPTZ          | Time of the last reward (or region entry)    |
/// | last_reward_name  | TEXT                 | Label of the most recent reward              |
/// | rewards_disabled  | BOOLEAN              | Player opted out of rewards                  |
/// | reward_tier       | TEXT                 | Administratively assigned tier label         |
/// | rewards_by_type   | BYTEA                | MessagePack map of reward kind to count      |
/// | updated_at        | TIMESTAMPTZ          | Time of the last save                        |
///
/// This entity is used internally by `SeaOrmStore`; hosts normally work with
/// [`AfkSession`](crate::AfkSession) instead.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "afk_session")]
pub struct Model {
    /// The player's UUID in its hyphenated string form.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    /// Display name at the time of the last save.
    pub name: String,

    /// Accumulated in-region time in milliseconds.
    pub total_afk_time_ms: i64,

    /// Number of rewards granted over the player's lifetime.
    pub total_rewards: i64,

    /// When the last reward was granted, or when the player last entered.
    pub last_reward_at: DateTimeWithTimeZone,

    /// Label of the most recent reward, `"None"` before the first one.
    pub last_reward_name: String,

    /// Whether the player switched rewards off.
    pub rewards_disabled: bool,

    /// Free-form tier label.
    pub reward_tier: String,

    /// MessagePack-encoded map from reward kind (`ITEM`, `COMMAND`,
    /// `EXPERIENCE`) to the number of rewards of that kind.
    pub rewards_by_type: Vec<u8>,

    /// When this row was last written.
    pub updated_at: DateTimeWithTimeZone,
}

/// Required enum for Sea-ORM entity relations.
///
/// This entity doesn't have any relations to other entities, so this enum is empty.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
