//! Debounce coalescer for external toggle signals
//!
//! Subjects can flip a toggle tag many times in a few seconds. Each signal is
//! folded into the subject's open burst and restarts its countdown; when the
//! window passes quietly the burst's net change is committed through a single
//! reconciliation session and summarized once.
//!
//! A burst's baseline is the subject's tracked tags at the first signal, so a
//! toggle that ends where it started writes nothing. Opening a burst waits on
//! the slot's flush gate, so the baseline is read after any in-flight flush for
//! the subject has landed. Lock order is always gate, then slot.
//!
//! Timer safety: arming a new countdown cancels the previous token and takes a
//! fresh generation number under the subject's slot lock. A countdown that
//! wakes re-checks its generation under the same lock before flushing, so only
//! the most recently armed one ever acts.

use crate::error::{Error, Result, StoreError};
use crate::registry::SubjectRegistry;
use crate::session::{CommitOutcome, Reconciler};
use crate::tags::{PendingOps, TagSet};
use rk_common::events::EngineEvent;
use rk_common::{SubjectId, TagId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One subject's open burst
struct Burst {
    baseline: TagSet,
    pending: PendingOps,
    token: CancellationToken,
}

/// Per-subject coalescer state
#[derive(Default)]
struct BurstSlot {
    burst: Option<Burst>,
    generation: u64,
    /// Serializes flush commits so two bursts of one subject never overlap
    flush_gate: Arc<Mutex<()>>,
}

struct Inner {
    reconciler: Arc<Reconciler>,
    tracked: HashSet<TagId>,
    window: Duration,
    slots: SubjectRegistry<BurstSlot>,
    /// Only read and bumped under a slot lock, so Relaxed is enough
    generations: AtomicU64,
}

/// Coalesces toggle bursts into one commit per subject per quiet window
#[derive(Clone)]
pub struct DebounceCoalescer {
    inner: Arc<Inner>,
}

impl DebounceCoalescer {
    pub fn new(
        reconciler: Arc<Reconciler>,
        tracked: impl IntoIterator<Item = TagId>,
        window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                reconciler,
                tracked: tracked.into_iter().collect(),
                window,
                slots: SubjectRegistry::new(),
                generations: AtomicU64::new(0),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    pub fn is_tracked(&self, tag: TagId) -> bool {
        self.inner.tracked.contains(&tag)
    }

    /// Fold one toggle signal into the subject's burst and re-arm its countdown
    ///
    /// A subject missing from the store is ignored. Opening a burst waits for
    /// an in-flight flush of the same subject to finish.
    ///
    /// # Errors
    ///
    /// `Error::UntrackedTag` for tags outside the tracked toggle set; store
    /// failures while snapshotting the baseline.
    pub async fn on_event(&self, subject: SubjectId, tag: TagId, is_add: bool) -> Result<()> {
        let inner = &self.inner;
        if !inner.tracked.contains(&tag) {
            warn!(subject = %subject, tag = %tag, "Rejected toggle for untracked tag");
            return Err(Error::UntrackedTag(tag));
        }

        let slot = inner.slots.slot(subject).await;
        let mut state = slot.lock().await;

        let mut burst = match state.burst.take() {
            Some(burst) => burst,
            None => {
                // Wait out any flush still writing before taking the baseline
                let gate = Arc::clone(&state.flush_gate);
                drop(state);
                let _flushing = gate.lock().await;
                state = slot.lock().await;

                match state.burst.take() {
                    Some(burst) => burst,
                    None => match self.open_burst(subject).await? {
                        Some(burst) => burst,
                        None => return Ok(()),
                    },
                }
            }
        };

        if is_add {
            burst.pending.add(tag);
        } else {
            burst.pending.remove(tag);
        }

        burst.token.cancel();
        burst.token = CancellationToken::new();
        let token = burst.token.clone();
        let generation = inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        state.generation = generation;
        state.burst = Some(burst);
        drop(state);

        debug!(subject = %subject, tag = %tag, is_add, generation, "Toggle queued");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(inner.window) => {
                    inner.flush(subject, generation).await;
                }
            }
        });
        Ok(())
    }

    /// Snapshot the tracked baseline for a new burst; `None` if the subject is gone
    async fn open_burst(&self, subject: SubjectId) -> Result<Option<Burst>> {
        let inner = &self.inner;
        let live = match inner.reconciler.store().fetch_current_tags(subject).await {
            Ok(tags) => tags,
            Err(StoreError::NotFound(_)) => {
                debug!(subject = %subject, "Toggle for missing subject ignored");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let baseline: TagSet = live
            .into_iter()
            .filter(|t| inner.tracked.contains(t))
            .collect();
        debug!(subject = %subject, baseline = ?baseline, "Opened toggle burst");
        Ok(Some(Burst {
            baseline,
            pending: PendingOps::new(),
            token: CancellationToken::new(),
        }))
    }

    /// Cancel the subject's burst and drop its slot
    ///
    /// Returns whether a burst was pending.
    pub async fn forget(&self, subject: SubjectId) -> bool {
        let Some(slot) = self.inner.slots.expire(subject).await else {
            return false;
        };
        let mut state = slot.lock().await;
        match state.burst.take() {
            Some(burst) => {
                burst.token.cancel();
                debug!(subject = %subject, "Cancelled pending toggle burst");
                true
            }
            None => false,
        }
    }

    /// Number of subjects with an open burst
    pub async fn pending_bursts(&self) -> usize {
        let mut count = 0;
        for subject in self.inner.slots.subjects().await {
            if let Some(slot) = self.inner.slots.get(subject).await {
                if slot.lock().await.burst.is_some() {
                    count += 1;
                }
            }
        }
        count
    }
}

impl Inner {
    async fn flush(&self, subject: SubjectId, generation: u64) {
        let Some(slot) = self.slots.get(subject).await else {
            return;
        };
        let gate = Arc::clone(&slot.lock().await.flush_gate);
        let _flushing = gate.lock().await;

        let burst = {
            let mut state = slot.lock().await;
            if state.generation != generation {
                debug!(subject = %subject, generation, "Superseded countdown woke, ignoring");
                return;
            }
            match state.burst.take() {
                Some(burst) => burst,
                None => return,
            }
        };

        let target = burst.pending.apply(&burst.baseline);
        let net_added: Vec<TagId> = target.difference(&burst.baseline).copied().collect();
        let net_removed: Vec<TagId> = burst.baseline.difference(&target).copied().collect();

        if net_added.is_empty() && net_removed.is_empty() {
            debug!(subject = %subject, "Toggle burst cancelled itself out");
            return;
        }

        let result = self
            .reconciler
            .scoped(subject, |session| {
                session.add_all(net_added.iter().copied());
                session.remove_all(net_removed.iter().copied());
                Ok(())
            })
            .await;

        match result {
            Ok((_, CommitOutcome::SubjectMissing)) => {
                debug!(subject = %subject, "Subject left before toggle flush");
            }
            Ok(_) => {
                info!(
                    subject = %subject,
                    added = ?net_added,
                    removed = ?net_removed,
                    "Flushed toggle burst"
                );
                self.reconciler.events().emit_lossy(EngineEvent::ToggleSummary {
                    subject,
                    added: net_added,
                    removed: net_removed,
                    timestamp: rk_common::time::now(),
                });
            }
            Err(e) => self.reconciler.report_failure(subject, &e),
        }
    }
}
