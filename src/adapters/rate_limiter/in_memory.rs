//! In-memory rate limiter implementation.
//!
//! Uses a fixed-window counter algorithm with an in-memory HashMap.
//! Counters live in this process only. Windows that have ended are swept
//! out at most once per window length, so the map holds only clients seen
//! within roughly the last two windows.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::RateLimitConfig;
use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitScope,
    RateLimitStatus, RateLimiter,
};

/// In-memory rate limiter for single-process deployments.
///
/// Uses a fixed-window counter algorithm. Each window tracks the count
/// of requests and resets when the window expires.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    /// Rate limit configuration.
    config: RateLimitConfig,
    /// Per-key window state.
    windows: Arc<RwLock<Windows>>,
}

#[derive(Debug, Default)]
struct Windows {
    entries: HashMap<String, WindowState>,
    /// When expired entries were last swept.
    last_sweep: u64,
}

impl Windows {
    /// Drop every window that has ended by `now`, returning how many went.
    fn prune_expired(&mut self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, state| !state.is_expired(now));
        self.last_sweep = now;
        before - self.entries.len()
    }
}

/// State for a single rate limit window.
#[derive(Debug, Clone)]
struct WindowState {
    /// Number of requests in the current window.
    count: u32,
    /// When the current window started.
    window_start: u64,
    /// Window duration in seconds.
    window_secs: u32,
}

impl WindowState {
    fn ends_at(&self) -> u64 {
        self.window_start + self.window_secs as u64
    }

    fn is_expired(&self, now: u64) -> bool {
        now >= self.ends_at()
    }
}

impl InMemoryRateLimiter {
    /// Create a new in-memory rate limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(RwLock::new(Windows::default())),
        }
    }

    /// Get the limit and window for a key.
    fn limits_for(&self, key: &RateLimitKey) -> (u32, u32) {
        match key.scope {
            RateLimitScope::Global => (
                self.config.global_requests_per_window,
                self.config.window_secs,
            ),
            RateLimitScope::Ip => (self.config.requests_per_window, self.config.window_secs),
        }
    }

    fn now_secs() -> u64 {
        Timestamp::now().as_unix_secs()
    }

    async fn check_at(&self, key: RateLimitKey, now: u64) -> RateLimitResult {
        let (limit, window_secs) = self.limits_for(&key);

        let mut windows = self.windows.write().await;

        if now >= windows.last_sweep + self.config.window_secs as u64 {
            let pruned = windows.prune_expired(now);
            if pruned > 0 {
                tracing::debug!(
                    pruned,
                    tracked = windows.entries.len(),
                    "Pruned expired rate limit windows"
                );
            }
        }

        let state = windows
            .entries
            .entry(key.storage_key())
            .or_insert_with(|| WindowState {
                count: 0,
                window_start: now,
                window_secs,
            });

        if state.is_expired(now) {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= limit {
            let retry_after = state.ends_at().saturating_sub(now) as u32;

            return RateLimitResult::Denied(RateLimitDenied {
                limit,
                retry_after_secs: retry_after.max(1),
                scope: key.scope,
                message: format!(
                    "Rate limit exceeded for {}. Retry after {} seconds.",
                    key.scope, retry_after
                ),
            });
        }

        state.count += 1;

        RateLimitResult::Allowed(RateLimitStatus {
            limit,
            remaining: limit.saturating_sub(state.count),
            reset_at: Timestamp::from_unix_secs(state.ends_at()),
            window_secs,
        })
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        Ok(self.check_at(key, Self::now_secs()).await)
    }
}
