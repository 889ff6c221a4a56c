//! Platform capability configuration

use serde::{Deserialize, Serialize};

/// External integrations enabled for a deployment.
///
/// Resolved once at startup and passed explicitly into handler state;
/// handlers check the flag instead of probing for an SDK at call time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Capabilities {
    /// Payment-processor integration (webhook intake, fee settlement)
    pub payments: bool,
    /// Text-generation integration (AI chat, guarded by the usage guardrail)
    pub text_generation: bool,
}

impl Capabilities {
    /// All integrations enabled
    pub fn all() -> Self {
        Self {
            payments: true,
            text_generation: true,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}
