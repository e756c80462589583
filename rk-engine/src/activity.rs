//! Activity tracking and the inactivity sweep
//!
//! `ActivityRegistry` holds the last time each subject was seen doing
//! something. It is populated live (`touch`) and from history at startup
//! (`touch_if_newer`), and entries are dropped when a subject departs.
//!
//! The sweep demotes idle subjects: available subjects idle past the
//! unavailable threshold lose `Available`, and subjects idle past the inactive
//! threshold become `Inactive`. Subjects currently in a tracked group are
//! never touched. A subject the registry has never seen counts as idle since
//! forever.

use crate::error::{Error, Result, StoreError};
use crate::session::{CommitOutcome, Reconciler};
use crate::tags::KnownTag;
use chrono::{DateTime, Duration, Utc};
use rk_common::config::ActivityConfig;
use rk_common::events::EngineEvent;
use rk_common::SubjectId;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Last-seen timestamps per subject
#[derive(Default)]
pub struct ActivityRegistry {
    seen: RwLock<HashMap<SubjectId, DateTime<Utc>>>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record activity now
    pub async fn touch(&self, subject: SubjectId) {
        self.touch_at(subject, rk_common::time::now()).await;
    }

    pub async fn touch_at(&self, subject: SubjectId, at: DateTime<Utc>) {
        self.seen.write().await.insert(subject, at);
    }

    /// Record `at` only if it is newer than what is stored (history backfill)
    pub async fn touch_if_newer(&self, subject: SubjectId, at: DateTime<Utc>) -> bool {
        let mut seen = self.seen.write().await;
        match seen.get(&subject) {
            Some(existing) if *existing >= at => false,
            _ => {
                seen.insert(subject, at);
                true
            }
        }
    }

    pub async fn last_seen(&self, subject: SubjectId) -> Option<DateTime<Utc>> {
        self.seen.read().await.get(&subject).copied()
    }

    pub async fn expire(&self, subject: SubjectId) -> Option<DateTime<Utc>> {
        self.seen.write().await.remove(&subject)
    }

    pub async fn len(&self) -> usize {
        self.seen.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seen.read().await.is_empty()
    }
}

/// Idle thresholds for the sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityPolicy {
    pub inactive_after: Duration,
    pub unavailable_after: Duration,
}

impl From<&ActivityConfig> for InactivityPolicy {
    fn from(config: &ActivityConfig) -> Self {
        Self {
            inactive_after: Duration::hours(config.inactive_after_hours as i64),
            unavailable_after: Duration::minutes(config.unavailable_after_minutes as i64),
        }
    }
}

impl InactivityPolicy {
    fn idle_past(&self, last_seen: Option<DateTime<Utc>>, threshold: Duration, now: DateTime<Utc>) -> bool {
        match last_seen {
            Some(at) => at < now - threshold,
            None => true,
        }
    }
}

/// What one inactivity sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InactivityReport {
    pub checked: usize,
    pub skipped_in_group: usize,
    pub marked_unavailable: Vec<SubjectId>,
    pub marked_inactive: Vec<SubjectId>,
    pub failed: Vec<SubjectId>,
}

/// Demote idle subjects, one session per subject that needs a change
///
/// Per-subject failures are reported on the event bus and the sweep moves on.
///
/// # Errors
///
/// Only if the subject listing itself fails.
pub async fn sweep_inactivity(
    reconciler: &Reconciler,
    activity: &ActivityRegistry,
    policy: &InactivityPolicy,
    now: DateTime<Utc>,
) -> Result<InactivityReport> {
    let table = reconciler.table();
    let subjects = reconciler
        .store()
        .list_subjects(reconciler.collection())
        .await?;
    let mut report = InactivityReport::default();

    for subject in subjects {
        let tags = match reconciler.store().fetch_current_tags(subject).await {
            Ok(tags) => tags,
            Err(StoreError::NotFound(_)) => continue,
            Err(e) => {
                reconciler.report_failure(subject, &Error::from(e));
                report.failed.push(subject);
                continue;
            }
        };
        report.checked += 1;

        if table.in_any_group(&tags) {
            report.skipped_in_group += 1;
            continue;
        }

        let last_seen = activity.last_seen(subject).await;
        let needs_unavailable = table.holds(&tags, KnownTag::Available)
            && policy.idle_past(last_seen, policy.unavailable_after, now);
        let needs_inactive = table.id(KnownTag::Inactive).is_some()
            && !table.holds(&tags, KnownTag::Inactive)
            && policy.idle_past(last_seen, policy.inactive_after, now);

        if !needs_unavailable && !needs_inactive {
            continue;
        }

        let idle = last_seen
            .map(|at| rk_common::time::format_idle(at, now))
            .unwrap_or_else(|| "never seen".to_string());
        debug!(subject = %subject, idle = %idle, needs_unavailable, needs_inactive, "Idle subject");

        let result = reconciler
            .scoped(subject, |session| {
                if needs_unavailable {
                    session.remove(KnownTag::Available);
                }
                if needs_inactive {
                    session.add(KnownTag::Inactive);
                }
                Ok(())
            })
            .await;

        match result {
            Ok((_, CommitOutcome::SubjectMissing)) => {}
            Ok(_) => {
                let timestamp = rk_common::time::now();
                if needs_unavailable {
                    info!(subject = %subject, idle = %idle, "Marked unavailable");
                    report.marked_unavailable.push(subject);
                    reconciler.events().emit_lossy(EngineEvent::MarkedUnavailable {
                        subject,
                        last_seen,
                        timestamp,
                    });
                }
                if needs_inactive {
                    info!(subject = %subject, idle = %idle, "Marked inactive");
                    report.marked_inactive.push(subject);
                    reconciler.events().emit_lossy(EngineEvent::MarkedInactive {
                        subject,
                        last_seen,
                        timestamp,
                    });
                }
            }
            Err(e) => {
                reconciler.report_failure(subject, &e);
                report.failed.push(subject);
            }
        }
    }

    Ok(report)
}
