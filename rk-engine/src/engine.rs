//! Engine facade
//!
//! Wires the reconciler, the debounce coalescer and the activity registry
//! together from one `TomlConfig` and one tag store, and exposes the
//! collection-wide operations (full sweep, inactivity sweep, leaderboard,
//! subject departure).

use crate::activity::{self, ActivityRegistry, InactivityPolicy, InactivityReport};
use crate::debounce::DebounceCoalescer;
use crate::error::{Result, StoreError};
use crate::points::ChallengeCatalog;
use crate::rank::RankEntry;
use crate::session::{CommitOutcome, Reconciler};
use crate::store::TagStore;
use crate::tags::{KnownTag, TagSet, TagTable};
use chrono::{DateTime, Utc};
use rk_common::config::TomlConfig;
use rk_common::events::{EngineEvent, EventBus};
use rk_common::{SubjectId, TagId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// What one full reconciliation sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub written: Vec<SubjectId>,
    pub unchanged: usize,
    pub missing: usize,
    pub failed: Vec<SubjectId>,
}

/// The membership tag engine for one collection
pub struct Engine {
    config: TomlConfig,
    reconciler: Arc<Reconciler>,
    coalescer: DebounceCoalescer,
    activity: Arc<ActivityRegistry>,
}

impl Engine {
    /// Build an engine with a fresh event bus
    ///
    /// # Errors
    ///
    /// `Error::Common` if the configuration fails validation.
    pub fn new(config: TomlConfig, store: Arc<dyn TagStore>) -> Result<Self> {
        Self::with_events(config, store, EventBus::default())
    }

    pub fn with_events(config: TomlConfig, store: Arc<dyn TagStore>, events: EventBus) -> Result<Self> {
        config.validate()?;

        let table = Arc::new(TagTable::from_config(&config.tags));
        let reconciler = Arc::new(Reconciler::new(
            store,
            table,
            config.hierarchy.clone(),
            config.collection_id,
            events,
        ));
        let coalescer = DebounceCoalescer::new(
            Arc::clone(&reconciler),
            config.toggles.tracked.iter().copied(),
            config.debounce.window(),
        );

        info!(
            collection = %config.collection_id,
            tracked_toggles = config.toggles.tracked.len(),
            window_ms = config.debounce.window_ms,
            "Engine ready"
        );

        Ok(Self {
            config,
            reconciler,
            coalescer,
            activity: Arc::new(ActivityRegistry::new()),
        })
    }

    pub fn config(&self) -> &TomlConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn coalescer(&self) -> &DebounceCoalescer {
        &self.coalescer
    }

    pub fn activity(&self) -> &Arc<ActivityRegistry> {
        &self.activity
    }

    pub fn events(&self) -> &EventBus {
        self.reconciler.events()
    }

    /// Queue a toggle signal (`schedule_debounced_toggle`)
    pub async fn toggle(&self, subject: SubjectId, tag: TagId, is_add: bool) -> Result<()> {
        self.coalescer.on_event(subject, tag, is_add).await
    }

    /// Record activity, now or at a historical instant
    pub async fn record_activity(&self, subject: SubjectId, at: Option<DateTime<Utc>>) {
        match at {
            Some(at) => {
                self.activity.touch_if_newer(subject, at).await;
            }
            None => self.activity.touch(subject).await,
        }
    }

    /// Reconcile one subject with no new intents besides the ensured tags
    ///
    /// The newbie tag is dropped once the subject joined more than
    /// `sweep.newbie_days` whole days ago.
    pub async fn reconcile(&self, subject: SubjectId) -> Result<CommitOutcome> {
        self.reconcile_at(subject, rk_common::time::now()).await
    }

    pub async fn reconcile_at(&self, subject: SubjectId, now: DateTime<Utc>) -> Result<CommitOutcome> {
        let ensure = &self.config.sweep.ensure_tags;
        let newbie_expired = self.newbie_expired(subject, now).await?;
        let (_, outcome) = self
            .reconciler
            .scoped(subject, |session| {
                session.add_all(ensure.iter().copied());
                if newbie_expired {
                    session.remove(KnownTag::Newbie);
                }
                Ok(())
            })
            .await?;
        Ok(outcome)
    }

    async fn newbie_expired(&self, subject: SubjectId, now: DateTime<Utc>) -> Result<bool> {
        if self.reconciler.table().id(KnownTag::Newbie).is_none() {
            return Ok(false);
        }
        let joined = match self.reconciler.store().joined_at(subject).await {
            Ok(joined) => joined,
            // The session reports the missing subject
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(joined.is_some_and(|at| (now - at).num_days() > self.config.sweep.newbie_days))
    }

    /// Reconcile every subject in the collection
    ///
    /// Per-subject failures are reported and the sweep continues.
    ///
    /// # Errors
    ///
    /// If the subject listing fails or the category declarations are invalid.
    pub async fn reconcile_all(&self) -> Result<SweepReport> {
        let now = rk_common::time::now();
        // Fail once up front instead of once per subject
        self.reconciler.hierarchy().await?;

        let subjects = self
            .reconciler
            .store()
            .list_subjects(self.reconciler.collection())
            .await?;
        let mut report = SweepReport::default();

        for subject in subjects {
            report.checked += 1;
            match self.reconcile_at(subject, now).await {
                Ok(CommitOutcome::Written(_)) => report.written.push(subject),
                Ok(CommitOutcome::Unchanged) => report.unchanged += 1,
                Ok(CommitOutcome::SubjectMissing) => report.missing += 1,
                Err(e) => {
                    self.reconciler.report_failure(subject, &e);
                    report.failed.push(subject);
                }
            }
        }

        info!(
            checked = report.checked,
            written = report.written.len(),
            failed = report.failed.len(),
            "Full reconciliation sweep finished"
        );
        Ok(report)
    }

    /// Demote idle subjects using the configured thresholds
    pub async fn sweep_inactivity(&self) -> Result<InactivityReport> {
        self.sweep_inactivity_at(rk_common::time::now()).await
    }

    pub async fn sweep_inactivity_at(&self, now: DateTime<Utc>) -> Result<InactivityReport> {
        let policy = InactivityPolicy::from(&self.config.activity);
        let report = activity::sweep_inactivity(&self.reconciler, &self.activity, &policy, now).await?;
        info!(
            checked = report.checked,
            unavailable = report.marked_unavailable.len(),
            inactive = report.marked_inactive.len(),
            "Inactivity sweep finished"
        );
        Ok(report)
    }

    /// Challenge point leaderboard over all subjects
    pub async fn leaderboard(&self) -> Result<Vec<RankEntry>> {
        let store = self.reconciler.store();
        let collection = self.reconciler.collection();
        let catalog = ChallengeCatalog::from_declared(&store.list_declared_tags(collection).await?);

        let mut held: Vec<(SubjectId, TagSet)> = Vec::new();
        for subject in store.list_subjects(collection).await? {
            match store.fetch_current_tags(subject).await {
                Ok(tags) => held.push((subject, tags)),
                Err(e) => warn!(subject = %subject, "Skipping subject in leaderboard: {}", e),
            }
        }
        Ok(catalog.leaderboard(held.iter().map(|(s, t)| (*s, t))))
    }

    /// Drop everything held for a departed subject
    ///
    /// Returns whether a pending toggle burst was cancelled.
    pub async fn subject_departed(&self, subject: SubjectId) -> bool {
        let cancelled_burst = self.coalescer.forget(subject).await;
        self.activity.expire(subject).await;
        info!(subject = %subject, cancelled_burst, "Subject departed");
        self.events().emit_lossy(EngineEvent::SubjectExpired {
            subject,
            cancelled_burst,
            timestamp: rk_common::time::now(),
        });
        cancelled_burst
    }
}
