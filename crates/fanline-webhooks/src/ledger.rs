//! Event-id ledger
//!
//! One row per externally-delivered event id, moving through
//! Unseen → Recorded(unprocessed) → Recorded(processed). `processed_at` is
//! set strictly after all side effects succeed, so an unprocessed row is
//! the recovery marker for a failed delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fanline_common::EventId;
use serde::{Deserialize, Serialize};

use crate::{StripeEvent, WebhookError, WebhookResult};

/// Ledger row for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Event id - unique key
    pub event_id: EventId,
    /// Raw event type tag
    pub event_type: String,
    /// Raw payload, recorded durably before side effects run
    pub payload: serde_json::Value,
    /// First time this event id was seen
    pub received_at: DateTime<Utc>,
    /// Set only after side effects completed; unset means retry-safe
    pub processed_at: Option<DateTime<Utc>>,
}

/// Event ledger (persistence collaborator).
///
/// A SQL implementation backs `record` with an upsert on the event-id
/// unique key and `mark_processed` with
/// `UPDATE … SET processed_at = $2 WHERE event_id = $1 AND processed_at IS
/// NULL`; that conditional update, not an in-process lock, serializes
/// concurrent redelivery across instances.
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Upsert the raw event by id. Re-recording an existing id keeps the
    /// original `received_at` and `processed_at`.
    async fn record(&self, event: &StripeEvent, received_at: DateTime<Utc>)
        -> WebhookResult<LedgerEntry>;

    /// Whether side effects for `event_id` already completed
    async fn is_processed(&self, event_id: &str) -> WebhookResult<bool>;

    /// Set `processed_at`, only when currently unset. Returns whether this
    /// call won the update.
    async fn mark_processed(&self, event_id: &str, at: DateTime<Utc>) -> WebhookResult<bool>;
}

/// In-memory ledger for tests and single-node deployments
pub struct MemoryLedger {
    entries: DashMap<EventId, LedgerEntry>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Read a row, if the event id has been seen
    pub fn get(&self, event_id: &str) -> Option<LedgerEntry> {
        self.entries.get(event_id).map(|entry| entry.clone())
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLedger for MemoryLedger {
    async fn record(
        &self,
        event: &StripeEvent,
        received_at: DateTime<Utc>,
    ) -> WebhookResult<LedgerEntry> {
        let entry = self
            .entries
            .entry(event.id.clone())
            .or_insert_with(|| LedgerEntry {
                event_id: event.id.clone(),
                event_type: event.event_type.clone(),
                payload: event.data.clone(),
                received_at,
                processed_at: None,
            });
        Ok(entry.clone())
    }

    async fn is_processed(&self, event_id: &str) -> WebhookResult<bool> {
        Ok(self
            .entries
            .get(event_id)
            .map(|entry| entry.processed_at.is_some())
            .unwrap_or(false))
    }

    async fn mark_processed(&self, event_id: &str, at: DateTime<Utc>) -> WebhookResult<bool> {
        // The entry lock makes check-and-set atomic, standing in for the
        // SQL conditional update.
        match self.entries.get_mut(event_id) {
            Some(mut entry) => {
                if entry.processed_at.is_some() {
                    Ok(false)
                } else {
                    entry.processed_at = Some(at);
                    Ok(true)
                }
            }
            None => Err(WebhookError::UnknownEvent(event_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> StripeEvent {
        StripeEvent {
            id: id.to_string(),
            event_type: "payout.paid".to_string(),
            created: 1_700_000_000,
            data: serde_json::json!({"object": {"id": "po_1"}}),
        }
    }

    #[tokio::test]
    async fn test_record_then_mark() {
        let ledger = MemoryLedger::new();
        let now = Utc::now();

        let entry = ledger.record(&event("evt_1"), now).await.unwrap();
        assert_eq!(entry.processed_at, None);
        assert!(!ledger.is_processed("evt_1").await.unwrap());

        assert!(ledger.mark_processed("evt_1", now).await.unwrap());
        assert!(ledger.is_processed("evt_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_is_conditional() {
        let ledger = MemoryLedger::new();
        let now = Utc::now();
        ledger.record(&event("evt_1"), now).await.unwrap();

        assert!(ledger.mark_processed("evt_1", now).await.unwrap());
        // Second mark loses: processed_at is already set
        assert!(!ledger.mark_processed("evt_1", now).await.unwrap());

        let first = ledger.get("evt_1").unwrap().processed_at;
        assert!(!ledger
            .mark_processed("evt_1", now + chrono::Duration::seconds(5))
            .await
            .unwrap());
        assert_eq!(ledger.get("evt_1").unwrap().processed_at, first);
    }

    #[tokio::test]
    async fn test_rerecord_keeps_original_row() {
        let ledger = MemoryLedger::new();
        let first_seen = Utc::now();
        ledger.record(&event("evt_1"), first_seen).await.unwrap();
        ledger.mark_processed("evt_1", first_seen).await.unwrap();

        // Redelivery upserts without clobbering state
        let redelivered = ledger
            .record(&event("evt_1"), first_seen + chrono::Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(redelivered.received_at, first_seen);
        assert!(redelivered.processed_at.is_some());
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_unknown_event_is_error() {
        let ledger = MemoryLedger::new();
        let result = ledger.mark_processed("evt_missing", Utc::now()).await;
        assert!(matches!(result, Err(WebhookError::UnknownEvent(_))));
    }
}
