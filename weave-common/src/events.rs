//! Event types for the Weave event system
//!
//! Provides shared event definitions and EventBus for all Weave services.

use crate::model::{CandidateKind, RelationshipStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Weave event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. All events use this central enum for type safety and
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WeaveEvent {
    /// A fresh combined ranking was computed for a subject user
    ///
    /// Triggers:
    /// - Reconciler: out-of-band reconciliation cycle
    /// - SSE: refresh suggestion ordering in connected UIs
    RankingComputed {
        /// Subject user the ranking belongs to
        subject_id: String,
        /// Number of candidates in the combined ranking
        candidate_count: usize,
        /// When the ranking was computed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A fresh authoritative roster snapshot was fetched
    ///
    /// Triggers:
    /// - Reconciler: out-of-band reconciliation cycle
    RosterFetched {
        /// Subject user the roster belongs to
        subject_id: String,
        /// Number of roster entries
        entry_count: usize,
        /// When the roster was fetched
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A reconciliation cycle finished and the store was replaced atomically
    ///
    /// Triggers:
    /// - SSE: refresh relationship list in connected UIs
    ReconcileCompleted {
        /// Entries in the store after the merge
        entry_count: usize,
        /// Whether the ranking step participated this cycle
        ranking_applied: bool,
        /// Whether the roster step participated this cycle
        roster_applied: bool,
        /// When the cycle completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A relationship entry changed status through a user action
    ///
    /// Triggers:
    /// - SSE: move entry between UI sections
    RelationshipStatusChanged {
        /// Identity key of the entry
        identity_key: String,
        /// Status before the transition
        old_status: RelationshipStatus,
        /// Status after the transition
        new_status: RelationshipStatus,
        /// When the transition happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A relationship entry was added by explicit user action
    ///
    /// Triggers:
    /// - SSE: show new active relationship
    /// - Persistence: save active connection
    RelationshipAdded {
        /// Identity key of the new entry
        identity_key: String,
        /// Counterpart kind
        kind: CandidateKind,
        /// When the entry was added
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A relationship entry was hard-removed
    ///
    /// Triggers:
    /// - SSE: drop entry from all UI sections
    RelationshipRemoved {
        /// Identity key of the removed entry
        identity_key: String,
        /// When the entry was removed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WeaveEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before old events are
    /// dropped for lagging subscribers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<WeaveEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening; callers decide whether
    /// that matters.
    pub fn emit(&self, event: WeaveEvent) -> Result<usize, broadcast::error::SendError<WeaveEvent>> {
        self.tx.send(event)
    }

    /// Number of currently connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(WeaveEvent::ReconcileCompleted {
            entry_count: 3,
            ranking_applied: true,
            roster_applied: false,
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            WeaveEvent::ReconcileCompleted { entry_count, .. } => assert_eq!(entry_count, 3),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(4);
        let result = bus.emit(WeaveEvent::RelationshipRemoved {
            identity_key: "u1".into(),
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = WeaveEvent::RankingComputed {
            subject_id: "u1".into(),
            candidate_count: 2,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"RankingComputed\""));
    }
}
