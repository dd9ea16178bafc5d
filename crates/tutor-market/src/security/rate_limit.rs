use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

/// Admission check keyed by caller identity.
///
/// The bundled limiter keeps its counters in process memory; deployments with more than
/// one instance plug a shared counter store in behind this trait.
pub trait RateLimiter: Send + Sync {
    fn allow(&self, key: &str) -> bool;
}

const MIN_SWEEP_AT: usize = 1024;

struct Attempts {
    by_key: HashMap<String, VecDeque<Instant>>,
    sweep_at: usize,
}

/// Allows at most `max_attempts` per key within any `window`-long interval.
///
/// Keys whose attempts have all aged out are swept once the table outgrows its last size.
pub struct SlidingWindowRateLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Mutex<Attempts>,
}

impl SlidingWindowRateLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self::with_sweep_threshold(max_attempts, window, MIN_SWEEP_AT)
    }

    fn with_sweep_threshold(max_attempts: usize, window: Duration, sweep_at: usize) -> Self {
        Self {
            max_attempts,
            window,
            attempts: Mutex::new(Attempts {
                by_key: HashMap::new(),
                sweep_at: sweep_at.max(1),
            }),
        }
    }

    /// Record an attempt at `now` if the key still has room in the window.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        if self.max_attempts == 0 {
            return false;
        }

        let mut attempts = self.lock();
        if attempts.by_key.len() >= attempts.sweep_at && !attempts.by_key.contains_key(key) {
            self.sweep(&mut attempts, now);
        }

        let history = attempts.by_key.entry(key.to_string()).or_default();
        while let Some(oldest) = history.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                history.pop_front();
            } else {
                break;
            }
        }

        if history.len() >= self.max_attempts {
            debug!(key, attempts = history.len(), "rate limit reached");
            return false;
        }

        history.push_back(now);
        true
    }

    fn sweep(&self, attempts: &mut Attempts, now: Instant) {
        let window = self.window;
        let before = attempts.by_key.len();
        attempts.by_key.retain(|_, history| {
            history
                .back()
                .is_some_and(|latest| now.saturating_duration_since(*latest) < window)
        });
        attempts.sweep_at = (attempts.by_key.len() * 2).max(MIN_SWEEP_AT.min(attempts.sweep_at));
        debug!(
            before,
            after = attempts.by_key.len(),
            "swept idle rate limit keys"
        );
    }

    fn tracked_keys(&self) -> usize {
        self.lock().by_key.len()
    }

    fn lock(&self) -> MutexGuard<'_, Attempts> {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RateLimiter for SlidingWindowRateLimiter {
    fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }
}
