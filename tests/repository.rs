//! `SeaOrmStore` against an in-memory SQLite database.

#![cfg(feature = "migration")]

use afkpool_sessions::migration::{Migrator, MigratorTrait};
use afkpool_sessions::{AfkSession, SeaOrmStore, SessionRepository};
use sea_orm::{ConnectOptions, Database};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

async fn store() -> SeaOrmStore {
    // One connection, or every pooled connection gets its own empty database.
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn = Database::connect(opt).await.unwrap();
    Migrator::up(&conn, None).await.unwrap();
    SeaOrmStore::new(conn)
}

fn played_session(name: &str) -> AfkSession {
    let mut session = AfkSession::new(Uuid::new_v4(), name);
    session.accumulated = Duration::milliseconds(5_400_250);
    session.total_rewards = 4;
    session.last_reward_at = OffsetDateTime::UNIX_EPOCH + Duration::seconds(1_700_000_000);
    session.last_reward_label = "Shiny Diamond".into();
    session.tier = "vip".into();
    session.rewards_by_kind.insert("ITEM".into(), 3);
    session.rewards_by_kind.insert("COMMAND".into(), 1);
    session
}

#[tokio::test]
async fn unknown_players_load_as_none() {
    let store = store().await;
    assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn saved_statistics_round_trip() {
    let store = store().await;
    let session = played_session("Steve");

    store.save(&session).await.unwrap();
    let loaded = store.load(session.id).await.unwrap().unwrap();

    assert_eq!(loaded, session);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn live_region_state_is_not_stored() {
    let store = store().await;
    let mut session = played_session("Alex");
    session.entered_at = Some(OffsetDateTime::UNIX_EPOCH + Duration::seconds(1_700_000_100));

    store.save(&session).await.unwrap();
    let loaded = store.load(session.id).await.unwrap().unwrap();

    assert!(loaded.entered_at.is_none());
    assert_eq!(loaded.accumulated, session.accumulated);
}

#[tokio::test]
async fn saving_again_updates_in_place() {
    let store = store().await;
    let mut session = played_session("Steve");
    store.save(&session).await.unwrap();

    session.name = "Steve2".into();
    session.total_rewards = 5;
    session.rewards_disabled = true;
    *session.rewards_by_kind.entry("EXPERIENCE".into()).or_insert(0) += 1;
    store.save(&session).await.unwrap();

    let loaded = store.load(session.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "Steve2");
    assert_eq!(loaded.total_rewards, 5);
    assert!(loaded.rewards_disabled);
    assert_eq!(loaded.rewards_by_kind.len(), 3);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn delete_removes_the_row() {
    let store = store().await;
    let keep = played_session("Steve");
    let drop = played_session("Alex");
    store.save(&keep).await.unwrap();
    store.save(&drop).await.unwrap();

    store.delete(drop.id).await.unwrap();
    // Deleting twice is fine.
    store.delete(drop.id).await.unwrap();

    assert!(store.load(drop.id).await.unwrap().is_none());
    assert!(store.load(keep.id).await.unwrap().is_some());
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_first_saves_both_succeed() {
    let store = store().await;
    let rounds = 25;

    for _ in 0..rounds {
        let session = played_session("Steve");
        let first = {
            let (store, session) = (store.clone(), session.clone());
            tokio::spawn(async move { store.save(&session).await })
        };
        let second = {
            let (store, session) = (store.clone(), session.clone());
            tokio::spawn(async move { store.save(&session).await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
    }

    assert_eq!(store.count().await.unwrap(), rounds);
}
