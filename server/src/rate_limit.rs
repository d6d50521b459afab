//! In-memory throttling for credential endpoints.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<String, VecDeque<Instant>>`,
//! keyed by normalized e-mail address. Sign-in, password-reset requests and
//! OTP verification share one limiter so an attacker cannot alternate
//! between them to multiply their attempt budget.
//!
//! Keys whose window has fully drained are dropped on every check, and
//! [`RateLimiter::clear`] forgets a key after a successful
//! sign-in.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("too many attempts; try again later (max {limit} per {window_secs}s)")]
    Exceeded { limit: usize, window_secs: u64 },
}

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), limit, window }
    }

    /// Check the limit for `key`, then record the attempt.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Exceeded`] when the key has used its budget
    /// for the current window. Rejected attempts are not recorded.
    pub fn check_and_record(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_and_record_at(key, Instant::now())
    }

    /// Internal: check + record with explicit timestamp (for testing).
    fn check_and_record_at(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let attempts = inner.entry(key.to_owned()).or_default();
        prune_window(attempts, now, self.window);
        if attempts.len() >= self.limit {
            return Err(RateLimitError::Exceeded { limit: self.limit, window_secs: self.window.as_secs() });
        }
        attempts.push_back(now);

        inner.retain(|_, deque| {
            prune_window(deque, now, self.window);
            !deque.is_empty()
        });

        Ok(())
    }

    /// Forget all recorded attempts for `key`.
    pub fn clear(&self, key: &str) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.remove(key);
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
