//! Stripe event envelope and dispatch tags

use fanline_common::EventId;
use serde::{Deserialize, Serialize};

/// Parsed webhook event envelope.
///
/// `data` is kept as raw JSON; type-specific handlers pull out the object
/// shape they expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEvent {
    /// Event id (`evt_…`) - the idempotency key
    pub id: EventId,
    /// Raw event type tag - the dispatch key
    #[serde(rename = "type")]
    pub event_type: String,
    /// Sender-side creation time (unix seconds)
    #[serde(default)]
    pub created: i64,
    /// Event payload object
    #[serde(default)]
    pub data: serde_json::Value,
}

impl StripeEvent {
    /// Dispatch tag for this event
    pub fn kind(&self) -> EventKind {
        EventKind::from_tag(&self.event_type)
    }
}

/// Closed set of event types with platform side effects.
///
/// Anything outside the set is acknowledged without effects so the sender
/// stops redelivering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// `checkout.session.completed`
    CheckoutCompleted,
    /// `customer.subscription.created`
    SubscriptionCreated,
    /// `customer.subscription.updated`
    SubscriptionUpdated,
    /// `customer.subscription.deleted`
    SubscriptionDeleted,
    /// `invoice.payment_succeeded`
    PaymentSucceeded,
    /// `invoice.payment_failed`
    PaymentFailed,
    /// `account.updated`
    AccountUpdated,
    /// `payout.created`
    PayoutCreated,
    /// `payout.paid`
    PayoutPaid,
    /// `payout.failed`
    PayoutFailed,
    /// Any tag outside the closed set
    Unrecognized,
}

impl EventKind {
    /// Map a raw type tag onto the dispatch set
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "checkout.session.completed" => Self::CheckoutCompleted,
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "invoice.payment_succeeded" => Self::PaymentSucceeded,
            "invoice.payment_failed" => Self::PaymentFailed,
            "account.updated" => Self::AccountUpdated,
            "payout.created" => Self::PayoutCreated,
            "payout.paid" => Self::PayoutPaid,
            "payout.failed" => Self::PayoutFailed,
            _ => Self::Unrecognized,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CheckoutCompleted => write!(f, "checkout.session.completed"),
            Self::SubscriptionCreated => write!(f, "customer.subscription.created"),
            Self::SubscriptionUpdated => write!(f, "customer.subscription.updated"),
            Self::SubscriptionDeleted => write!(f, "customer.subscription.deleted"),
            Self::PaymentSucceeded => write!(f, "invoice.payment_succeeded"),
            Self::PaymentFailed => write!(f, "invoice.payment_failed"),
            Self::AccountUpdated => write!(f, "account.updated"),
            Self::PayoutCreated => write!(f, "payout.created"),
            Self::PayoutPaid => write!(f, "payout.paid"),
            Self::PayoutFailed => write!(f, "payout.failed"),
            Self::Unrecognized => write!(f, "unrecognized"),
        }
    }
}
