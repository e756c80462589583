//! Reconciliation sessions
//!
//! A session collects add/remove intents for one subject and turns them into
//! at most one full-set write. `commit` never trusts earlier state: it fetches
//! live tags, applies the intents, re-derives dependent tags, normalizes
//! categories against a freshly resolved hierarchy, re-fetches live tags and
//! writes only if the result differs.
//!
//! Sessions for the same subject do not exclude each other; the last committed
//! write wins. Callers that care about ordering must not open overlapping
//! sessions for one subject.

use crate::error::{Error, Result, StoreError};
use crate::hierarchy::CategoryHierarchy;
use crate::rules;
use crate::store::{MemberTagState, TagStore};
use crate::tags::{PendingOps, TagRef, TagSet, TagTable};
use rk_common::config::HierarchyConfig;
use rk_common::events::{EngineEvent, EventBus};
use rk_common::{CollectionId, SubjectId, TagId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Tags a commit added and removed, relative to the live set it replaced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub added: Vec<TagId>,
    pub removed: Vec<TagId>,
}

impl TagDiff {
    fn between(live: &TagSet, desired: &TagSet) -> Self {
        Self {
            added: desired.difference(live).copied().collect(),
            removed: live.difference(desired).copied().collect(),
        }
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Subject was gone at fetch or write time; nothing written
    SubjectMissing,
    /// Desired set equalled live set; nothing written
    Unchanged,
    /// One full-set write was issued
    Written(TagDiff),
}

impl CommitOutcome {
    pub fn wrote(&self) -> bool {
        matches!(self, CommitOutcome::Written(_))
    }
}

/// Opens sessions and owns everything a commit needs
pub struct Reconciler {
    store: Arc<dyn TagStore>,
    table: Arc<TagTable>,
    conventions: HierarchyConfig,
    collection: CollectionId,
    events: EventBus,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn TagStore>,
        table: Arc<TagTable>,
        conventions: HierarchyConfig,
        collection: CollectionId,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            table,
            conventions,
            collection,
            events,
        }
    }

    pub fn store(&self) -> &Arc<dyn TagStore> {
        &self.store
    }

    pub fn table(&self) -> &TagTable {
        &self.table
    }

    pub fn collection(&self) -> CollectionId {
        self.collection
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Resolve the category hierarchy from a fresh declared-tag listing
    pub async fn hierarchy(&self) -> Result<CategoryHierarchy> {
        let declared = self.store.list_declared_tags(self.collection).await?;
        CategoryHierarchy::resolve(&declared, &self.conventions)
    }

    /// Open a session, snapshotting the subject's live tags
    ///
    /// A missing subject still yields a session (with no snapshot); its commit
    /// is a no-op.
    pub async fn open(&self, subject: SubjectId) -> Result<ReconciliationSession<'_>> {
        let snapshot = match self.store.fetch_current_tags(subject).await {
            Ok(tags) => Some(MemberTagState::new(subject, tags)),
            Err(StoreError::NotFound(_)) => {
                debug!(subject = %subject, "Opened session for missing subject");
                None
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ReconciliationSession {
            reconciler: self,
            subject,
            snapshot,
            ops: PendingOps::new(),
            finished: false,
        })
    }

    /// Run `f` inside a session, committing on `Ok` and discarding on `Err`
    ///
    /// `f` only queues intents; anything that needs to await must happen
    /// before calling this.
    pub async fn scoped<F, T>(&self, subject: SubjectId, f: F) -> Result<(T, CommitOutcome)>
    where
        F: FnOnce(&mut ReconciliationSession<'_>) -> Result<T>,
    {
        let mut session = self.open(subject).await?;
        match f(&mut session) {
            Ok(value) => {
                let outcome = session.commit().await?;
                Ok((value, outcome))
            }
            Err(e) => {
                session.discard();
                Err(e)
            }
        }
    }

    /// Report a failure on the operator channel
    ///
    /// Missing subjects are benign and not reported.
    pub fn report_failure(&self, subject: SubjectId, err: &Error) {
        if matches!(err, Error::NotFound(_)) {
            return;
        }
        error!(subject = %subject, kind = err.kind(), "Tag commit failed: {}", err);
        self.events.emit_lossy(EngineEvent::CommitFailed {
            subject,
            kind: err.kind().to_string(),
            reason: err.to_string(),
            timestamp: rk_common::time::now(),
        });
    }

    async fn fetch_live(&self, subject: SubjectId) -> Result<Option<TagSet>> {
        match self.store.fetch_current_tags(subject).await {
            Ok(tags) => Ok(Some(tags)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Pending intents for one subject
pub struct ReconciliationSession<'a> {
    reconciler: &'a Reconciler,
    subject: SubjectId,
    snapshot: Option<MemberTagState>,
    ops: PendingOps,
    finished: bool,
}

impl<'a> ReconciliationSession<'a> {
    pub fn subject(&self) -> SubjectId {
        self.subject
    }

    /// Live state as of `open`; `None` if the subject was missing
    pub fn snapshot(&self) -> Option<&MemberTagState> {
        self.snapshot.as_ref()
    }

    /// Whether the subject held `tag` when the session opened
    pub fn had(&self, tag: impl Into<TagRef>) -> bool {
        match (self.reconciler.table.resolve(tag.into()), &self.snapshot) {
            (Some(id), Some(state)) => state.has(id),
            _ => false,
        }
    }

    pub fn pending(&self) -> &PendingOps {
        &self.ops
    }

    /// Queue an add; cancels a queued removal of the same tag
    pub fn add(&mut self, tag: impl Into<TagRef>) -> &mut Self {
        let tag = tag.into();
        match self.reconciler.table.resolve(tag) {
            Some(id) => self.ops.add(id),
            None => debug!(subject = %self.subject, ?tag, "Ignoring add of unconfigured tag"),
        }
        self
    }

    /// Queue a removal; cancels a queued add of the same tag
    pub fn remove(&mut self, tag: impl Into<TagRef>) -> &mut Self {
        let tag = tag.into();
        match self.reconciler.table.resolve(tag) {
            Some(id) => self.ops.remove(id),
            None => debug!(subject = %self.subject, ?tag, "Ignoring removal of unconfigured tag"),
        }
        self
    }

    pub fn add_all<T: Into<TagRef>>(&mut self, tags: impl IntoIterator<Item = T>) -> &mut Self {
        for tag in tags {
            self.add(tag);
        }
        self
    }

    pub fn remove_all<T: Into<TagRef>>(&mut self, tags: impl IntoIterator<Item = T>) -> &mut Self {
        for tag in tags {
            self.remove(tag);
        }
        self
    }

    /// Drop queued intents without writing
    pub fn discard(mut self) {
        debug!(subject = %self.subject, "Session discarded");
        self.finished = true;
    }

    /// Recompute the desired set and write it if it differs from live state
    ///
    /// # Errors
    ///
    /// `Forbidden`/`Conflict`/`StoreUnavailable` from the store, and
    /// `InvalidHierarchy` if category declarations are malformed. Nothing is
    /// written in any error case. Never retried.
    pub async fn commit(mut self) -> Result<CommitOutcome> {
        self.finished = true;
        let r = self.reconciler;
        let subject = self.subject;

        let Some(live) = r.fetch_live(subject).await? else {
            debug!(subject = %subject, "Subject gone before commit");
            return Ok(CommitOutcome::SubjectMissing);
        };

        let mut desired = self.ops.apply(&live);
        let hierarchy = r.hierarchy().await?;
        rules::derive(&r.table, &hierarchy, &mut desired);

        // Diff against the freshest state we can get, not the one we built on
        let Some(current) = r.fetch_live(subject).await? else {
            debug!(subject = %subject, "Subject gone before write");
            return Ok(CommitOutcome::SubjectMissing);
        };
        if desired == current {
            debug!(subject = %subject, "Tags already reconciled, skipping write");
            return Ok(CommitOutcome::Unchanged);
        }

        match r.store.write_tags(subject, &desired).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                debug!(subject = %subject, "Subject gone during write");
                return Ok(CommitOutcome::SubjectMissing);
            }
            Err(e) => return Err(e.into()),
        }

        let diff = TagDiff::between(&current, &desired);
        info!(
            subject = %subject,
            added = ?diff.added,
            removed = ?diff.removed,
            "Committed tags"
        );
        r.events.emit_lossy(EngineEvent::TagsCommitted {
            subject,
            added: diff.added.clone(),
            removed: diff.removed.clone(),
            timestamp: rk_common::time::now(),
        });
        Ok(CommitOutcome::Written(diff))
    }
}

impl Drop for ReconciliationSession<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.ops.is_empty() {
            warn!(
                subject = %self.subject,
                to_add = ?self.ops.to_add(),
                to_remove = ?self.ops.to_remove(),
                "Session dropped without commit; intents discarded"
            );
        }
    }
}
