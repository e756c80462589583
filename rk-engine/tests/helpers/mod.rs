//! Shared fixtures for rk-engine integration tests
//!
//! - `config()`/`declared()`: a collection with one tracked group, an
//!   "interests" category with a sentinel and a "challenges" category without
//! - `GatedStore`: a store whose writes can be held mid-flight

#![allow(dead_code)]

pub mod gated_store;

pub use gated_store::GatedStore;

use rk_common::config::{GroupTagsConfig, TagsConfig, TomlConfig};
use rk_common::events::EngineEvent;
use rk_common::{CollectionId, SubjectId, TagId};
use rk_engine::store::{InMemoryTagStore, TagMeta};
use rk_engine::TagSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub const COLLECTION: CollectionId = CollectionId(1000);

pub const LEADER: TagId = TagId(10);
pub const AVAILABLE: TagId = TagId(11);
pub const AVAILABLE_LEADER: TagId = TagId(12);
pub const NOT_AVAILABLE: TagId = TagId(13);
pub const INACTIVE: TagId = TagId(14);
pub const EXPLAINED_INACTIVE: TagId = TagId(15);
pub const PERSON: TagId = TagId(16);
pub const NEWBIE: TagId = TagId(17);
pub const LOUNGE: TagId = TagId(20);
pub const LOUNGE_LEADER: TagId = TagId(21);
pub const AVAILABLE_NOT_IN_LOUNGE: TagId = TagId(22);

pub const INTERESTS: TagId = TagId(30);
pub const SPEEDRUNS: TagId = TagId(31);
pub const COOP: TagId = TagId(32);
pub const MARATHONS: TagId = TagId(33);
pub const NO_INTERESTS: TagId = TagId(34);

pub const CHALLENGES: TagId = TagId(40);
pub const FIRST_CLEAR: TagId = TagId(41);
pub const NO_DAMAGE: TagId = TagId(42);
pub const ALL_BOSSES: TagId = TagId(43);

pub const WINDOW: Duration = Duration::from_millis(5000);

pub fn config() -> TomlConfig {
    let mut config = TomlConfig::for_collection(COLLECTION);
    config.debounce.window_ms = WINDOW.as_millis() as u64;
    config.tags = TagsConfig {
        leader: Some(LEADER),
        available: Some(AVAILABLE),
        available_leader: Some(AVAILABLE_LEADER),
        not_available: Some(NOT_AVAILABLE),
        inactive: Some(INACTIVE),
        explained_inactive: Some(EXPLAINED_INACTIVE),
        person: Some(PERSON),
        newbie: Some(NEWBIE),
        groups: vec![GroupTagsConfig {
            name: "lounge".to_string(),
            member: LOUNGE,
            leader: Some(LOUNGE_LEADER),
            available_not_in: Some(AVAILABLE_NOT_IN_LOUNGE),
        }],
    };
    config.toggles.tracked = vec![SPEEDRUNS, COOP, MARATHONS];
    config
}

pub fn declared() -> Vec<TagMeta> {
    let mut everyone = TagMeta::new(COLLECTION.0, "@everyone", 0);
    everyone.is_default = true;
    vec![
        TagMeta::new(10, "leader", 40),
        TagMeta::new(11, "available", 39),
        TagMeta::new(12, "available leader", 38),
        TagMeta::new(13, "not available", 37),
        TagMeta::new(14, "inactive", 36),
        TagMeta::new(15, "explained inactive", 35),
        TagMeta::new(16, "person", 34),
        TagMeta::new(17, "newbie", 41),
        TagMeta::new(20, "in lounge", 33),
        TagMeta::new(21, "lounge leader", 32),
        TagMeta::new(22, "available, not in lounge", 31),
        TagMeta::new(30, "──╱ interests ─", 30),
        TagMeta::new(31, "🎮🟢 interested in speedruns", 29),
        TagMeta::new(32, "🎮⭐ interested in co-op", 28),
        TagMeta::new(33, "🎮☄️ interested in marathons", 27),
        TagMeta::new(34, "🚫 none", 26),
        TagMeta::new(40, "──╱ challenges ─", 25),
        TagMeta::new(41, "🏆🟢 first clear /+5/", 24),
        TagMeta::new(42, "🏆⭐ no damage /+20/", 23),
        TagMeta::new(43, "🏆☄️ all bosses /+50/", 22),
        everyone,
    ]
}

pub fn set(tags: &[TagId]) -> TagSet {
    tags.iter().copied().collect()
}

/// Store with the fixture declarations and the given subjects
pub async fn store_with(subjects: &[(u64, &[TagId])]) -> Arc<InMemoryTagStore> {
    let store = Arc::new(InMemoryTagStore::new());
    store.declare(declared()).await;
    for (id, tags) in subjects {
        store.insert_subject(SubjectId(*id), tags.iter().copied()).await;
    }
    store
}

/// Everything currently buffered on a receiver
pub fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn of_type<'a>(events: &'a [EngineEvent], event_type: &str) -> Vec<&'a EngineEvent> {
    events.iter().filter(|e| e.event_type() == event_type).collect()
}

/// Sleep well past any open debounce window (paused clock auto-advances)
pub async fn settle() {
    tokio::time::sleep(WINDOW * 4).await;
}
