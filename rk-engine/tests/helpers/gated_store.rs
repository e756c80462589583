//! Tag store whose writes can be held until released
//!
//! Lets a test observe the engine while a commit is stuck inside
//! `write_tags`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rk_common::{CollectionId, SubjectId};
use rk_engine::store::{InMemoryTagStore, StoreResult, TagMeta, TagStore};
use rk_engine::TagSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub struct GatedStore {
    inner: Arc<InMemoryTagStore>,
    hold: AtomicBool,
    entered: Notify,
    released: Notify,
}

impl GatedStore {
    pub fn new(inner: Arc<InMemoryTagStore>) -> Self {
        Self {
            inner,
            hold: AtomicBool::new(false),
            entered: Notify::new(),
            released: Notify::new(),
        }
    }

    pub fn inner(&self) -> &InMemoryTagStore {
        &self.inner
    }

    /// Hold the next write until `release`
    pub fn hold_writes(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Resolves once a write is being held
    pub async fn wait_for_write(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.released.notify_one();
    }
}

#[async_trait]
impl TagStore for GatedStore {
    async fn fetch_current_tags(&self, subject: SubjectId) -> StoreResult<TagSet> {
        self.inner.fetch_current_tags(subject).await
    }

    async fn write_tags(&self, subject: SubjectId, desired: &TagSet) -> StoreResult<()> {
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }
        self.inner.write_tags(subject, desired).await
    }

    async fn list_declared_tags(&self, collection: CollectionId) -> StoreResult<Vec<TagMeta>> {
        self.inner.list_declared_tags(collection).await
    }

    async fn list_subjects(&self, collection: CollectionId) -> StoreResult<Vec<SubjectId>> {
        self.inner.list_subjects(collection).await
    }

    async fn joined_at(&self, subject: SubjectId) -> StoreResult<Option<DateTime<Utc>>> {
        self.inner.joined_at(subject).await
    }
}
