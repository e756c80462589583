//! Event types for the rolekeeper event system
//!
//! Provides the engine's event definitions and the EventBus used as the
//! operator-visible channel. Announcement glue (chat messages, leaderboard
//! posts) subscribes here; the engine itself never formats text.

use crate::{SubjectId, TagId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// rolekeeper event types
///
/// Events are broadcast via EventBus and serialize to tagged JSON for the
/// replay tool's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// A reconciliation wrote a new full tag set
    ///
    /// `added`/`removed` are relative to the live set fetched just before the write.
    TagsCommitted {
        subject: SubjectId,
        added: Vec<TagId>,
        removed: Vec<TagId>,
        timestamp: DateTime<Utc>,
    },

    /// Net result of one debounce burst
    ///
    /// Emitted once per burst, never for intermediate toggles.
    ToggleSummary {
        subject: SubjectId,
        added: Vec<TagId>,
        removed: Vec<TagId>,
        timestamp: DateTime<Utc>,
    },

    /// A commit or flush failed and was dropped
    CommitFailed {
        subject: SubjectId,
        /// Short error kind (forbidden, conflict, unavailable, ...)
        kind: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Subject was idle past the unavailable threshold and lost `available`
    MarkedUnavailable {
        subject: SubjectId,
        last_seen: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },

    /// Subject was idle past the inactive threshold
    MarkedInactive {
        subject: SubjectId,
        last_seen: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },

    /// Subject departed; its registry entries were dropped
    SubjectExpired {
        subject: SubjectId,
        /// Whether a pending toggle burst was cancelled
        cancelled_burst: bool,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Subject the event concerns
    pub fn subject(&self) -> SubjectId {
        match self {
            EngineEvent::TagsCommitted { subject, .. }
            | EngineEvent::ToggleSummary { subject, .. }
            | EngineEvent::CommitFailed { subject, .. }
            | EngineEvent::MarkedUnavailable { subject, .. }
            | EngineEvent::MarkedInactive { subject, .. }
            | EngineEvent::SubjectExpired { subject, .. } => *subject,
        }
    }

    /// Event type name (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::TagsCommitted { .. } => "TagsCommitted",
            EngineEvent::ToggleSummary { .. } => "ToggleSummary",
            EngineEvent::CommitFailed { .. } => "CommitFailed",
            EngineEvent::MarkedUnavailable { .. } => "MarkedUnavailable",
            EngineEvent::MarkedInactive { .. } => "MarkedInactive",
            EngineEvent::SubjectExpired { .. } => "SubjectExpired",
        }
    }
}

/// Broadcast bus for EngineEvent
///
/// Cloning shares the underlying channel.
///
/// # Examples
///
/// ```
/// use rk_common::events::{EngineEvent, EventBus};
/// use rk_common::SubjectId;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(EngineEvent::SubjectExpired {
///     subject: SubjectId(7),
///     cancelled_burst: false,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().subject(), SubjectId(7));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: EngineEvent,
    ) -> Result<usize, broadcast::error::SendError<EngineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = EngineEvent::ToggleSummary {
            subject: SubjectId(5),
            added: vec![TagId(11)],
            removed: vec![],
            timestamp: chrono::Utc::now(),
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ToggleSummary");
        assert_eq!(json["subject"], 5);
        assert_eq!(json["added"][0], 11);
        assert_eq!(event.event_type(), "ToggleSummary");
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        let result = bus.emit(EngineEvent::SubjectExpired {
            subject: SubjectId(1),
            cancelled_burst: true,
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
        assert_eq!(bus.capacity(), 10);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        for subject in [1u64, 2, 3] {
            bus.emit_lossy(EngineEvent::SubjectExpired {
                subject: SubjectId(subject),
                cancelled_burst: false,
                timestamp: chrono::Utc::now(),
            });
        }

        for expected in [1u64, 2, 3] {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.subject(), SubjectId(expected));
        }
    }
}
