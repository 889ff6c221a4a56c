//! Stripe webhook signature verification
//!
//! Verifies the `Stripe-Signature` header (`t=<unix>,v1=<hex>`): HMAC-SHA256
//! over `"{t}.{payload}"` with the endpoint secret, with a bounded clock
//! skew. Verification fails closed before any ledger state is touched.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{WebhookError, WebhookResult};

type HmacSha256 = Hmac<Sha256>;

/// Accepted skew between the signature timestamp and the receiver's clock
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Verifier bound to one endpoint secret
pub struct SignatureVerifier {
    secret: String,
}

impl SignatureVerifier {
    /// Create a verifier for an endpoint secret (`whsec_…` prefix optional)
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verify a delivery against the current clock
    pub fn verify(&self, payload: &str, header: &str) -> WebhookResult<()> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Verify against an explicit unix timestamp
    pub fn verify_at(&self, payload: &str, header: &str, now: i64) -> WebhookResult<()> {
        // Header format: t=<unix>,v1=<hex>[,v0=<hex>]
        let mut timestamp: Option<i64> = None;
        let mut v1: Option<&str> = None;
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => v1 = Some(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::SignatureInvalid)?;
        let v1 = v1.ok_or(WebhookError::SignatureInvalid)?;

        if (now - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(timestamp, now, "webhook signature timestamp outside tolerance");
            return Err(WebhookError::SignatureInvalid);
        }

        let expected = hex::decode(v1).map_err(|_| WebhookError::SignatureInvalid)?;
        let mut mac = self.mac(timestamp, payload)?;
        mac.verify_slice(&expected)
            .map_err(|_| WebhookError::SignatureInvalid)
    }

    /// Produce a header the sender would attach, for test fixtures and
    /// outbound signing
    pub fn sign(&self, payload: &str, timestamp: i64) -> String {
        let mac = self
            .mac(timestamp, payload)
            .expect("HMAC accepts any key length");
        format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        )
    }

    fn mac(&self, timestamp: i64, payload: &str) -> WebhookResult<HmacSha256> {
        let key = self.secret.strip_prefix("whsec_").unwrap_or(&self.secret);
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|_| WebhookError::SignatureInvalid)?;
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        Ok(mac)
    }
}
