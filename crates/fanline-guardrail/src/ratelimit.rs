//! Fixed-window request rate limiting
//!
//! A 60-second fixed window per user, not a true sliding window. Checking
//! consumes a slot; the daily budget in [`crate::usage`] is the part with a
//! separate record step.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fanline_common::{KeyValueStore, UserId};
use serde::{Deserialize, Serialize};

/// Window length
pub const WINDOW_SECONDS: i64 = 60;

/// Per-user request window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    /// Requests admitted in the current window
    pub count: u32,
    /// Instant the window lapses
    pub resets_at: DateTime<Utc>,
}

impl RateLimitWindow {
    fn started_at(now: DateTime<Utc>) -> Self {
        Self {
            count: 1,
            resets_at: now + Duration::seconds(WINDOW_SECONDS),
        }
    }
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitOutcome {
    /// Request admitted; `remaining` slots left in the window
    Allowed {
        /// Slots left after this request
        remaining: u32,
    },
    /// Request rejected until the window lapses
    Limited {
        /// Instant the window lapses
        resets_at: DateTime<Utc>,
    },
}

/// Per-user fixed-window limiter over an injectable store
pub struct RateLimiter {
    windows: Arc<dyn KeyValueStore<RateLimitWindow>>,
    limit: u32,
}

impl RateLimiter {
    /// Create a limiter admitting `limit` requests per window
    pub fn new(limit: u32, windows: Arc<dyn KeyValueStore<RateLimitWindow>>) -> Self {
        Self { windows, limit }
    }

    /// Check and consume one slot for `user`
    pub fn check(&self, user: &UserId) -> RateLimitOutcome {
        self.check_at(user, Utc::now())
    }

    /// Check and consume one slot at an explicit instant.
    ///
    /// The compare-and-swap loop keeps check-then-increment atomic per key;
    /// concurrent requests from the same user cannot lose updates.
    pub fn check_at(&self, user: &UserId, now: DateTime<Utc>) -> RateLimitOutcome {
        let key = user.to_string();
        loop {
            let current = self.windows.get(&key);
            let next = match &current {
                None => RateLimitWindow::started_at(now),
                Some(window) if now > window.resets_at => RateLimitWindow::started_at(now),
                Some(window) if window.count < self.limit => RateLimitWindow {
                    count: window.count + 1,
                    resets_at: window.resets_at,
                },
                Some(window) => {
                    return RateLimitOutcome::Limited {
                        resets_at: window.resets_at,
                    }
                }
            };

            if self.windows.compare_and_swap(&key, current.as_ref(), next.clone()) {
                return RateLimitOutcome::Allowed {
                    remaining: self.limit - next.count,
                };
            }
            // Lost the race against a concurrent request; re-read.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanline_common::MemoryStore;
    use uuid::Uuid;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::new(limit, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_admits_up_to_limit() {
        let limiter = limiter(20);
        let user = Uuid::new_v4();
        let now = Utc::now();

        for _ in 0..20 {
            assert!(matches!(
                limiter.check_at(&user, now),
                RateLimitOutcome::Allowed { .. }
            ));
        }

        match limiter.check_at(&user, now) {
            RateLimitOutcome::Limited { resets_at } => assert!(resets_at > now),
            other => panic!("expected Limited, got {:?}", other),
        }
    }

    #[test]
    fn test_window_expiry_readmits() {
        let limiter = limiter(2);
        let user = Uuid::new_v4();
        let now = Utc::now();

        limiter.check_at(&user, now);
        limiter.check_at(&user, now);
        assert!(matches!(
            limiter.check_at(&user, now),
            RateLimitOutcome::Limited { .. }
        ));

        // Past the window: fresh count of 1
        let later = now + Duration::seconds(WINDOW_SECONDS + 1);
        match limiter.check_at(&user, later) {
            RateLimitOutcome::Allowed { remaining } => assert_eq!(remaining, 1),
            other => panic!("expected Allowed, got {:?}", other),
        }
    }

    #[test]
    fn test_users_limited_independently() {
        let limiter = limiter(1);
        let now = Utc::now();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        limiter.check_at(&first, now);
        assert!(matches!(
            limiter.check_at(&first, now),
            RateLimitOutcome::Limited { .. }
        ));
        assert!(matches!(
            limiter.check_at(&second, now),
            RateLimitOutcome::Allowed { .. }
        ));
    }

    #[test]
    fn test_concurrent_checks_never_overadmit() {
        let limiter = Arc::new(limiter(20));
        let user = Uuid::new_v4();
        let now = Utc::now();

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    matches!(
                        limiter.check_at(&user, now),
                        RateLimitOutcome::Allowed { .. }
                    )
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();

        assert_eq!(admitted, 20);
    }
}
