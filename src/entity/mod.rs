//! Database entity models for afkpool-sessions.
//!
//! This module contains the Sea-ORM entity definitions used by
//! [`SeaOrmStore`](crate::SeaOrmStore). They describe the persisted subset of
//! an [`AfkSession`](crate::AfkSession): lifetime statistics and player
//! preferences, never the live region state.

/// AFK session entity model for Sea-ORM database interaction.
///
/// Contains the database schema representation and entity model for storing
/// AFK statistics per player.
pub mod afk_session;
