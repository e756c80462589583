//! Keyed per-subject state
//!
//! Each subject gets its own slot behind its own lock, so work on distinct
//! subjects never contends. The outer map lock is only held long enough to
//! find or create a slot. Entries live until the subject departs.

use rk_common::SubjectId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lock registry keyed by subject
pub struct SubjectRegistry<S> {
    slots: Mutex<HashMap<SubjectId, Arc<Mutex<S>>>>,
}

impl<S> Default for SubjectRegistry<S> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<S: Default> SubjectRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `subject`, created empty on first use
    pub async fn slot(&self, subject: SubjectId) -> Arc<Mutex<S>> {
        self.slots
            .lock()
            .await
            .entry(subject)
            .or_insert_with(|| Arc::new(Mutex::new(S::default())))
            .clone()
    }

    /// Existing slot, without creating one
    pub async fn get(&self, subject: SubjectId) -> Option<Arc<Mutex<S>>> {
        self.slots.lock().await.get(&subject).cloned()
    }

    /// Drop the subject's slot and hand it back
    ///
    /// Holders of the old `Arc` keep a detached slot; new lookups start fresh.
    pub async fn expire(&self, subject: SubjectId) -> Option<Arc<Mutex<S>>> {
        self.slots.lock().await.remove(&subject)
    }

    pub async fn subjects(&self) -> Vec<SubjectId> {
        self.slots.lock().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}
