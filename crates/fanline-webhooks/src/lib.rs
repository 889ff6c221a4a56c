//! Fanline Webhooks - Idempotent Stripe event intake
//!
//! Stripe delivers webhooks at-least-once; this crate makes side effects
//! happen at-most-once. The pipeline per delivery:
//!
//! ```text
//! verify signature ─► parse ─► ledger upsert ─► already processed?
//!      │ fail: reject             (durable)       │ yes: ack, no effects
//!      ▼                                          ▼ no
//!    400-class error                      run handler ─► mark processed
//!                                           │ fail: leave unprocessed,
//!                                           ▼        sender retries
//!                                        500-class error
//! ```
//!
//! The conditional `mark_processed` update is the serialization point for
//! concurrent redelivery; handlers must still be safe to re-run from the
//! start, since a failure after partial side effects retries the whole
//! handler.

pub mod event;
pub mod ledger;
pub mod processor;
pub mod signature;

use thiserror::Error;

pub use event::{EventKind, StripeEvent};
pub use ledger::{EventLedger, LedgerEntry, MemoryLedger};
pub use processor::{EventHandler, Outcome, WebhookProcessor};
pub use signature::SignatureVerifier;

/// Webhook error types
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header missing, malformed, stale, or wrong.
    /// Hard rejection; the sender must not retry.
    #[error("invalid webhook signature")]
    SignatureInvalid,

    /// Payload was not a parseable event envelope
    #[error("malformed webhook payload: {0}")]
    Malformed(String),

    /// Ledger has no row for an event that should have been recorded
    #[error("event {0} not recorded in ledger")]
    UnknownEvent(String),

    /// A type-specific handler failed; the delivery should be retried
    #[error("handler failed: {0}")]
    Handler(String),

    /// The persistence collaborator failed; the delivery should be retried
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl WebhookError {
    /// Whether the sender should redeliver (5xx-class) as opposed to a
    /// permanent rejection (4xx-class)
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Handler(_) | Self::Persistence(_) | Self::UnknownEvent(_)
        )
    }
}

/// Result type for webhook operations
pub type WebhookResult<T> = Result<T, WebhookError>;
