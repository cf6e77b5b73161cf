use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use farmauth_core::error::{AuthError, Result};

use crate::clock::{Clock, SystemClock};

/// Tracked-key count above which lapsed windows are pruned.
pub const DEFAULT_MAX_KEYS: usize = 100_000;

/// Per-key window accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitState {
    pub key: String,
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub limit: u32,
}

impl RateLimitState {
    fn new(key: &str, limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            count: 0,
            window_start: now,
            limit,
        }
    }
}

/// Fixed-window throttle keyed by string.
///
/// A window opens on the first call for a key and lasts `window`; the next
/// call after that opens a fresh one. Within a window at most `limit` calls
/// pass. One mutex covers the whole key map so concurrent calls for the same
/// key never lose an increment.
///
/// `disable()` bypasses accounting without touching stored windows;
/// `enable()` resumes them as they were.
///
/// Once more than `max_keys` keys are tracked, a call for a new key first
/// drops every lapsed window that has no limit override. Live windows are
/// never evicted, so the cap is soft.
pub struct RateLimiter {
    default_limit: u32,
    window: Duration,
    max_keys: usize,
    enabled: AtomicBool,
    state: Mutex<HashMap<String, RateLimitState>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_clock(limit, window, Arc::new(SystemClock))
    }

    pub fn with_clock(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            default_limit: limit,
            window,
            max_keys: DEFAULT_MAX_KEYS,
            enabled: AtomicBool::new(true),
            state: Mutex::new(HashMap::new()),
            clock,
        }
    }

    #[must_use]
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    /// Count one call against `key`.
    ///
    /// Returns `Err(RateLimitExceeded)` once the window's budget is spent;
    /// rejected calls are not counted.
    pub fn allow(&self, key: &str) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let now = self.clock.now();
        // Poisoned mutex means a logic bug; deny instead of panicking.
        let Ok(mut map) = self.state.lock() else {
            tracing::error!(%key, "rate limiter lock poisoned; denying");
            return Err(AuthError::Internal("rate limiter unavailable".into()));
        };

        if map.len() >= self.max_keys && !map.contains_key(key) {
            self.prune_lapsed(&mut map, now);
        }

        let st = map
            .entry(key.to_string())
            .or_insert_with(|| RateLimitState::new(key, self.default_limit, now));

        if self.window_elapsed(st.window_start, now) {
            st.count = 0;
            st.window_start = now;
        }

        if st.count >= st.limit {
            tracing::warn!(%key, limit = st.limit, "rate limit exceeded");
            return Err(AuthError::RateLimitExceeded {
                key: key.to_string(),
            });
        }

        st.count += 1;
        Ok(())
    }

    /// Override the limit for one key. The current window is kept.
    pub fn set_limit(&self, key: &str, limit: u32) {
        let now = self.clock.now();
        let mut map = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(key.to_string())
            .or_insert_with(|| RateLimitState::new(key, limit, now))
            .limit = limit;
        tracing::info!(%key, limit, "rate limit override set");
    }

    /// Forget a key entirely, including any override.
    pub fn reset(&self, key: &str) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn limit_for(&self, key: &str) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(self.default_limit, |st| st.limit)
    }

    /// Calls left in the current window (a full budget if the window lapsed).
    pub fn remaining(&self, key: &str) -> u32 {
        let now = self.clock.now();
        let map = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match map.get(key) {
            None => self.default_limit,
            Some(st) if self.window_elapsed(st.window_start, now) => st.limit,
            Some(st) => st.limit.saturating_sub(st.count),
        }
    }

    pub fn state(&self, key: &str) -> Option<RateLimitState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Sorted list of keys with stored state.
    pub fn tracked_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    fn prune_lapsed(&self, map: &mut HashMap<String, RateLimitState>, now: DateTime<Utc>) {
        let before = map.len();
        map.retain(|_, st| {
            st.limit != self.default_limit || !self.window_elapsed(st.window_start, now)
        });
        tracing::debug!(before, after = map.len(), "rate limiter lapsed keys pruned");
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _held = self.state.lock();
            std::panic::resume_unwind(Box::new("limiter poisoned"));
        }));
    }

    /// Strictly greater: a call exactly `window` after the start still
    /// belongs to the old window. A clock stepping backwards never elapses.
    fn window_elapsed(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - start)
            .to_std()
            .map(|elapsed| elapsed > self.window)
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("default_limit", &self.default_limit)
            .field("window", &self.window)
            .field("max_keys", &self.max_keys)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn poisoned_lock_refuses_with_internal() {
        let lim = RateLimiter::new(10, Duration::from_secs(60));
        lim.poison();

        let err = lim.allow("k").unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
        assert_eq!(err.client_code().as_str(), "INTERNAL");
    }
}
