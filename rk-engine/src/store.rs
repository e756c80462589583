//! Tag store collaborator
//!
//! The engine never owns tag storage. It reads live state and writes full
//! replacement sets through the `TagStore` trait; the platform adapter behind
//! it is out of scope. `InMemoryTagStore` is the in-process implementation used
//! by tests and the replay tool.

use crate::error::StoreError;
use crate::tags::TagSet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rk_common::{CollectionId, SubjectId, TagId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::RwLock;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One declared tag as listed by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMeta {
    pub id: TagId,
    pub label: String,
    /// Higher positions sort first
    pub position: i64,
    /// The implicit tag every subject holds (`@everyone`)
    #[serde(default)]
    pub is_default: bool,
}

impl TagMeta {
    pub fn new(id: u64, label: &str, position: i64) -> Self {
        Self {
            id: TagId(id),
            label: label.to_string(),
            position,
            is_default: false,
        }
    }
}

/// A subject's live tag set at one point in time
///
/// Never mutated; a newer fetch supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberTagState {
    pub subject: SubjectId,
    pub tags: TagSet,
    pub fetched_at: DateTime<Utc>,
}

impl MemberTagState {
    pub fn new(subject: SubjectId, tags: TagSet) -> Self {
        Self {
            subject,
            tags,
            fetched_at: rk_common::time::now(),
        }
    }

    pub fn has(&self, tag: TagId) -> bool {
        self.tags.contains(&tag)
    }
}

/// Tag store operations the engine consumes
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Current tags of a subject; `StoreError::NotFound` if absent
    async fn fetch_current_tags(&self, subject: SubjectId) -> StoreResult<TagSet>;

    /// Replace the subject's entire tag set
    async fn write_tags(&self, subject: SubjectId, desired: &TagSet) -> StoreResult<()>;

    /// All declared tags of the collection, in any order
    async fn list_declared_tags(&self, collection: CollectionId) -> StoreResult<Vec<TagMeta>>;

    /// All subjects currently in the collection
    async fn list_subjects(&self, collection: CollectionId) -> StoreResult<Vec<SubjectId>>;

    /// When the subject joined the collection, if the platform knows
    async fn joined_at(&self, _subject: SubjectId) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(None)
    }
}

/// Serializable contents of an `InMemoryTagStore`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub declared: Vec<TagMeta>,
    pub subjects: Vec<SubjectSnapshot>,
}

impl StoreSnapshot {
    /// Read a snapshot from a JSON file
    pub async fn load(path: &Path) -> rk_common::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&raw).map_err(|e| {
            rk_common::Error::InvalidInput(format!("snapshot {}: {}", path.display(), e))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectSnapshot {
    pub id: SubjectId,
    #[serde(default)]
    pub tags: Vec<TagId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    declared: Vec<TagMeta>,
    subjects: BTreeMap<SubjectId, TagSet>,
    joined: HashMap<SubjectId, DateTime<Utc>>,
    write_failures: HashMap<SubjectId, StoreError>,
    writes: Vec<(SubjectId, TagSet)>,
}

/// In-process tag store for one collection
#[derive(Default)]
pub struct InMemoryTagStore {
    inner: RwLock<Inner>,
}

impl InMemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut inner = Inner {
            declared: snapshot.declared,
            ..Default::default()
        };
        for subject in snapshot.subjects {
            if let Some(at) = subject.joined_at {
                inner.joined.insert(subject.id, at);
            }
            inner.subjects.insert(subject.id, subject.tags.into_iter().collect());
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub async fn declare(&self, tags: Vec<TagMeta>) {
        self.inner.write().await.declared = tags;
    }

    /// Insert or replace a subject, bypassing the write log
    pub async fn insert_subject(&self, subject: SubjectId, tags: impl IntoIterator<Item = TagId>) {
        self.inner
            .write()
            .await
            .subjects
            .insert(subject, tags.into_iter().collect());
    }

    pub async fn remove_subject(&self, subject: SubjectId) {
        let mut inner = self.inner.write().await;
        inner.subjects.remove(&subject);
        inner.joined.remove(&subject);
    }

    pub async fn set_joined(&self, subject: SubjectId, at: DateTime<Utc>) {
        self.inner.write().await.joined.insert(subject, at);
    }

    /// Make every write for `subject` fail with `error` until cleared
    pub async fn fail_writes(&self, subject: SubjectId, error: StoreError) {
        self.inner.write().await.write_failures.insert(subject, error);
    }

    pub async fn clear_write_failures(&self) {
        self.inner.write().await.write_failures.clear();
    }

    pub async fn tags_of(&self, subject: SubjectId) -> Option<TagSet> {
        self.inner.read().await.subjects.get(&subject).cloned()
    }

    /// Successful writes so far, in order
    pub async fn writes(&self) -> Vec<(SubjectId, TagSet)> {
        self.inner.read().await.writes.clone()
    }

    pub async fn write_count(&self) -> usize {
        self.inner.read().await.writes.len()
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read().await;
        StoreSnapshot {
            declared: inner.declared.clone(),
            subjects: inner
                .subjects
                .iter()
                .map(|(id, tags)| SubjectSnapshot {
                    id: *id,
                    tags: tags.iter().copied().collect(),
                    joined_at: inner.joined.get(id).copied(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl TagStore for InMemoryTagStore {
    async fn fetch_current_tags(&self, subject: SubjectId) -> StoreResult<TagSet> {
        self.inner
            .read()
            .await
            .subjects
            .get(&subject)
            .cloned()
            .ok_or(StoreError::NotFound(subject))
    }

    async fn write_tags(&self, subject: SubjectId, desired: &TagSet) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(err) = inner.write_failures.get(&subject) {
            return Err(err.clone());
        }
        match inner.subjects.get_mut(&subject) {
            Some(tags) => *tags = desired.clone(),
            None => return Err(StoreError::NotFound(subject)),
        }
        inner.writes.push((subject, desired.clone()));
        Ok(())
    }

    async fn list_declared_tags(&self, _collection: CollectionId) -> StoreResult<Vec<TagMeta>> {
        Ok(self.inner.read().await.declared.clone())
    }

    async fn list_subjects(&self, _collection: CollectionId) -> StoreResult<Vec<SubjectId>> {
        Ok(self.inner.read().await.subjects.keys().copied().collect())
    }

    async fn joined_at(&self, subject: SubjectId) -> StoreResult<Option<DateTime<Utc>>> {
        let inner = self.inner.read().await;
        if !inner.subjects.contains_key(&subject) {
            return Err(StoreError::NotFound(subject));
        }
        Ok(inner.joined.get(&subject).copied())
    }
}
