//! Webhook intake pipeline

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{EventKind, EventLedger, SignatureVerifier, StripeEvent, WebhookError, WebhookResult};

/// What one delivery did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Side effects ran and the event is now marked processed
    Processed,
    /// Side effects had already completed (or a concurrent delivery won);
    /// nothing ran, delivery acknowledged
    Replayed,
    /// Unrecognized event type, acknowledged without effects
    Ignored,
}

/// Type-specific side effects for one event kind.
///
/// Handlers must be safe to re-run from the start: a failure after partial
/// application leaves the event unprocessed, and the retry replays the
/// whole handler. Upsert and check-before-insert, never blind insert.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Apply this event's side effects
    async fn handle(&self, event: &StripeEvent) -> WebhookResult<()>;
}

/// Verifies, records, dispatches, and marks webhook deliveries
pub struct WebhookProcessor {
    verifier: SignatureVerifier,
    ledger: Arc<dyn EventLedger>,
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl WebhookProcessor {
    /// Create a processor with no handlers registered
    pub fn new(verifier: SignatureVerifier, ledger: Arc<dyn EventLedger>) -> Self {
        Self {
            verifier,
            ledger,
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for an event kind
    pub fn on(mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Process one delivery against the current clock
    pub async fn process(&self, payload: &str, signature_header: &str) -> WebhookResult<Outcome> {
        self.process_at(payload, signature_header, Utc::now()).await
    }

    /// Process one delivery at an explicit instant
    pub async fn process_at(
        &self,
        payload: &str,
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> WebhookResult<Outcome> {
        // Fails closed before any state lookup
        self.verifier
            .verify_at(payload, signature_header, now.timestamp())?;

        let event: StripeEvent =
            serde_json::from_str(payload).map_err(|e| WebhookError::Malformed(e.to_string()))?;

        let kind = event.kind();
        if kind == EventKind::Unrecognized {
            tracing::info!(
                event_id = %event.id,
                event_type = %event.event_type,
                "unrecognized webhook event type, acknowledging"
            );
            return Ok(Outcome::Ignored);
        }

        // Durably recorded before side effects, so a failed delivery leaves
        // an unprocessed row behind
        self.ledger.record(&event, now).await?;

        if self.ledger.is_processed(&event.id).await? {
            tracing::debug!(event_id = %event.id, "webhook replay, side effects already applied");
            return Ok(Outcome::Replayed);
        }

        if let Some(handler) = self.handlers.get(&kind) {
            // A handler error propagates with processed_at unset; the
            // sender redelivers and the whole handler re-runs
            handler.handle(&event).await?;
        } else {
            tracing::debug!(event_type = %event.event_type, "no handler registered");
        }

        if self.ledger.mark_processed(&event.id, now).await? {
            tracing::info!(event_id = %event.id, event_type = %event.event_type, "webhook processed");
            Ok(Outcome::Processed)
        } else {
            // A concurrent delivery of the same id won the conditional
            // update; both handlers may have run
            Ok(Outcome::Replayed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLedger;
    use dashmap::DashSet;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    const SECRET: &str = "whsec_test";

    fn payload(id: &str, event_type: &str) -> String {
        format!(
            r#"{{"id":"{}","type":"{}","created":1700000000,"data":{{"object":{{"id":"cs_1","amount_total":4999}}}}}}"#,
            id, event_type
        )
    }

    fn signed(payload: &str, now: DateTime<Utc>) -> String {
        SignatureVerifier::new(SECRET).sign(payload, now.timestamp())
    }

    /// Counts invocations; optionally fails the first N calls
    struct CountingHandler {
        calls: AtomicU32,
        failures_remaining: AtomicU32,
    }

    impl CountingHandler {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                failures_remaining: AtomicU32::new(failures),
            })
        }
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: &StripeEvent) -> WebhookResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(WebhookError::Handler("transient failure".into()));
            }
            Ok(())
        }
    }

    fn processor(
        ledger: Arc<MemoryLedger>,
        handler: Arc<dyn EventHandler>,
    ) -> WebhookProcessor {
        WebhookProcessor::new(SignatureVerifier::new(SECRET), ledger)
            .on(EventKind::CheckoutCompleted, handler)
    }

    #[tokio::test]
    async fn test_happy_path_marks_processed() {
        let ledger = Arc::new(MemoryLedger::new());
        let handler = CountingHandler::new(0);
        let processor = processor(ledger.clone(), handler.clone());
        let now = Utc::now();

        let body = payload("evt_1", "checkout.session.completed");
        let outcome = processor
            .process_at(&body, &signed(&body, now), now)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Processed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert!(ledger.get("evt_1").unwrap().processed_at.is_some());
    }

    #[tokio::test]
    async fn test_replay_runs_zero_side_effects() {
        let ledger = Arc::new(MemoryLedger::new());
        let handler = CountingHandler::new(0);
        let processor = processor(ledger.clone(), handler.clone());
        let now = Utc::now();

        let body = payload("evt_1", "checkout.session.completed");
        let header = signed(&body, now);

        processor.process_at(&body, &header, now).await.unwrap();
        let outcome = processor.process_at(&body, &header, now).await.unwrap();

        assert_eq!(outcome, Outcome::Replayed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_handler_leaves_event_retryable() {
        let ledger = Arc::new(MemoryLedger::new());
        let handler = CountingHandler::new(1);
        let processor = processor(ledger.clone(), handler.clone());
        let now = Utc::now();

        let body = payload("evt_1", "checkout.session.completed");
        let header = signed(&body, now);

        let err = processor.process_at(&body, &header, now).await.unwrap_err();
        assert!(err.retryable());
        // Recorded but not processed: the recovery marker
        assert!(ledger.get("evt_1").unwrap().processed_at.is_none());

        // Redelivery re-runs the full handler
        let outcome = processor.process_at(&body, &header, now).await.unwrap();
        assert_eq!(outcome, Outcome::Processed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bad_signature_rejected_before_any_state() {
        let ledger = Arc::new(MemoryLedger::new());
        let handler = CountingHandler::new(0);
        let processor = processor(ledger.clone(), handler.clone());
        let now = Utc::now();

        let body = payload("evt_1", "checkout.session.completed");
        let err = processor
            .process_at(&body, "t=1,v1=deadbeef", now)
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::SignatureInvalid));
        assert!(!err.retryable());
        assert!(ledger.is_empty());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_type_acknowledged() {
        let ledger = Arc::new(MemoryLedger::new());
        let processor = processor(ledger.clone(), CountingHandler::new(0));
        let now = Utc::now();

        let body = payload("evt_1", "charge.dispute.created");
        let outcome = processor
            .process_at(&body, &signed(&body, now), now)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Ignored);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_delivery_single_winner() {
        let ledger = Arc::new(MemoryLedger::new());
        let handler = CountingHandler::new(0);
        let processor = Arc::new(processor(ledger.clone(), handler.clone()));
        let now = Utc::now();

        let body = payload("evt_1", "checkout.session.completed");
        let header = signed(&body, now);

        let (a, b) = tokio::join!(
            processor.process_at(&body, &header, now),
            processor.process_at(&body, &header, now),
        );

        let outcomes = [a.unwrap(), b.unwrap()];
        let processed = outcomes
            .iter()
            .filter(|o| **o == Outcome::Processed)
            .count();
        assert_eq!(processed, 1);
        assert!(ledger.get("evt_1").unwrap().processed_at.is_some());
    }

    /// Purchase recording in the style real handlers must follow:
    /// check-before-insert keyed on the checkout session id, so re-running
    /// after a partial failure cannot double-create
    struct PurchaseHandler {
        purchases: DashSet<String>,
        fail_after_insert: AtomicBool,
    }

    #[async_trait]
    impl EventHandler for PurchaseHandler {
        async fn handle(&self, event: &StripeEvent) -> WebhookResult<()> {
            let session_id = event.data["object"]["id"]
                .as_str()
                .ok_or_else(|| WebhookError::Malformed("missing session id".into()))?;

            // Existence check before create
            if !self.purchases.contains(session_id) {
                self.purchases.insert(session_id.to_string());
            }

            if self.fail_after_insert.swap(false, Ordering::SeqCst) {
                return Err(WebhookError::Handler("db timeout".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_purchase_handler_safe_to_rerun() {
        let ledger = Arc::new(MemoryLedger::new());
        let handler = Arc::new(PurchaseHandler {
            purchases: DashSet::new(),
            fail_after_insert: AtomicBool::new(true),
        });
        let processor = WebhookProcessor::new(SignatureVerifier::new(SECRET), ledger)
            .on(EventKind::CheckoutCompleted, handler.clone());
        let now = Utc::now();

        let body = payload("evt_1", "checkout.session.completed");
        let header = signed(&body, now);

        // First delivery: purchase inserted, then the handler dies
        assert!(processor.process_at(&body, &header, now).await.is_err());
        assert_eq!(handler.purchases.len(), 1);

        // Retry re-runs the whole handler without duplicating the purchase
        let outcome = processor.process_at(&body, &header, now).await.unwrap();
        assert_eq!(outcome, Outcome::Processed);
        assert_eq!(handler.purchases.len(), 1);
    }
}
