//! Core rate limiter implementation.

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::config::LimiterConfig;
use crate::error::Result;

use super::clock::{Clock, SystemClock};
use super::counter::{Decision, WindowCounter};
use super::quota::Quota;
use super::rules::RuleSet;

/// Everything tracked for one key.
///
/// The override and the counter share an entry so that a check and an
/// override change for the same key are serialised by the same shard lock.
#[derive(Debug, Default)]
struct KeyState {
    /// Per-key quota replacing the default
    quota: Option<Quota>,
    /// Counting state, created on the first check
    counter: Option<WindowCounter>,
}

impl KeyState {
    fn is_empty(&self) -> bool {
        self.quota.is_none() && self.counter.is_none()
    }
}

/// Point-in-time view of a key's quota usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    /// Effective limit for the key
    pub limit: u64,
    /// Admissions left in the current window
    pub remaining: u64,
    /// Epoch milliseconds at which the current window ends
    #[serde(rename = "reset_ms")]
    pub reset: u64,
    /// Time left until `reset`
    #[serde(rename = "remaining_time_ms", serialize_with = "serialize_millis")]
    pub remaining_time: Duration,
}

impl RateLimitInfo {
    /// The reset instant as a UTC timestamp.
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.reset)
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// A key with an override, as listed by [`RateLimiter::all_limits`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitEntry {
    pub key: String,
    pub limit: u64,
    pub window_ms: u64,
}

impl LimitEntry {
    /// The override's window length.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

fn serialize_millis<S: serde::Serializer>(
    value: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

/// Per-key fixed-window rate limiter.
///
/// This struct is thread-safe and can be shared across tasks behind an `Arc`.
/// Each key gets `limit` admissions per window, where a window opens at the
/// first admission after the previous one expired.
pub struct RateLimiter<C: Clock = SystemClock> {
    /// Quota for keys without an override
    default_quota: Quota,
    /// Per-key overrides and counters
    keys: DashMap<String, KeyState>,
    /// Time source
    clock: C,
}

impl RateLimiter<SystemClock> {
    /// Create a rate limiter with the default quota (100 requests per minute).
    pub fn new() -> Self {
        Self::from_parts(Quota::default(), SystemClock)
    }

    /// Create a rate limiter from configuration, using the system clock.
    pub fn with_config(config: &LimiterConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a rate limiter from configuration with an explicit clock.
    pub fn with_clock(config: &LimiterConfig, clock: C) -> Result<Self> {
        let default_quota = config.default_quota()?;
        debug!(default_quota = %default_quota, "Rate limiter configured");
        Ok(Self::from_parts(default_quota, clock))
    }

    fn from_parts(default_quota: Quota, clock: C) -> Self {
        Self {
            default_quota,
            keys: DashMap::new(),
            clock,
        }
    }

    /// Install or replace the override for `key`.
    ///
    /// `window` falls back to the default window. Existing counting state
    /// is kept; the new quota is consulted from the next check onwards.
    pub fn set_custom_limit(
        &self,
        key: impl Into<String>,
        limit: u64,
        window: Option<Duration>,
    ) -> Result<()> {
        let quota = Quota::new(limit, window.unwrap_or(self.default_quota.window()))?;
        self.set_quota(key, quota);
        Ok(())
    }

    /// Install or replace the override for `key` with an already validated quota.
    pub fn set_quota(&self, key: impl Into<String>, quota: Quota) {
        let key = key.into();
        debug!(key = %key, quota = %quota, "Setting custom rate limit");
        self.keys.entry(key).or_default().quota = Some(quota);
    }

    /// Drop the override for `key`, if any.
    pub fn remove_custom_limit(&self, key: &str) {
        if let Some(mut state) = self.keys.get_mut(key) {
            if state.quota.take().is_some() {
                debug!(key = %key, "Removed custom rate limit");
            }
        }
        self.keys.remove_if(key, |_, state| state.is_empty());
    }

    /// Decide whether the next request for `key` may proceed, counting it
    /// if so.
    pub fn is_allowed(&self, key: &str) -> bool {
        if let Some(mut state) = self.keys.get_mut(key) {
            return self.check(key, &mut state);
        }

        let mut state = self.keys.entry(key.to_string()).or_default();
        self.check(key, &mut state)
    }

    fn check(&self, key: &str, state: &mut KeyState) -> bool {
        let quota = state.quota.unwrap_or(self.default_quota);
        let now = self.clock.now_millis();

        let counter = state.counter.get_or_insert_with(|| {
            debug!(key = %key, quota = %quota, "Creating new rate limit counter");
            WindowCounter::new(now)
        });

        let decision = counter.admit(&quota, now);

        trace!(
            key = %key,
            count = counter.count(),
            limit = quota.limit(),
            decision = ?decision,
            "Checked rate limit"
        );

        match decision {
            Decision::NewWindow => {
                debug!(key = %key, window_start = now, "Opened new rate limit window");
            }
            Decision::Rejected => {
                debug!(key = %key, limit = quota.limit(), "Rate limit exceeded");
            }
            Decision::Admitted => {}
        }

        decision.is_allowed()
    }

    /// Snapshot the quota usage of `key` without changing any state.
    ///
    /// No expiry check happens here: a window that has already run out is
    /// reported as-is until the next [`is_allowed`](Self::is_allowed) call
    /// rolls it over. A key never seen reports a full quota and a reset
    /// one window from now.
    pub fn rate_limit_info(&self, key: &str) -> RateLimitInfo {
        let now = self.clock.now_millis();

        let (quota, counter) = match self.keys.get(key) {
            Some(state) => (state.quota.unwrap_or(self.default_quota), state.counter),
            None => (self.default_quota, None),
        };
        let counter = counter.unwrap_or_else(|| WindowCounter::new(now));

        RateLimitInfo {
            limit: quota.limit(),
            remaining: counter.remaining(&quota),
            reset: counter.reset_at(&quota),
            remaining_time: counter.duration_until_reset(&quota, now),
        }
    }

    /// Forget everything about `key`: its counter and its override.
    pub fn reset(&self, key: &str) {
        if self.keys.remove(key).is_some() {
            debug!(key = %key, "Reset rate limit state");
        }
    }

    /// List every key that currently has an override.
    pub fn all_limits(&self) -> Vec<LimitEntry> {
        self.keys
            .iter()
            .filter_map(|entry| {
                entry.quota.map(|quota| LimitEntry {
                    key: entry.key().clone(),
                    limit: quota.limit(),
                    window_ms: quota.window_millis(),
                })
            })
            .collect()
    }

    /// Install every override from a rule set.
    pub fn apply_rules(&self, rules: &RuleSet) -> Result<()> {
        for rule in rules.overrides() {
            self.set_custom_limit(rule.key.clone(), rule.limit, rule.window())?;
        }
        info!(count = rules.len(), "Applied rate limit overrides");
        Ok(())
    }

    /// The quota used for keys without an override.
    pub fn default_quota(&self) -> Quota {
        self.default_quota
    }

    /// The quota `key` would be checked against right now.
    pub fn effective_quota(&self, key: &str) -> Quota {
        self.keys
            .get(key)
            .and_then(|state| state.quota)
            .unwrap_or(self.default_quota)
    }

    /// Number of keys with counting state.
    pub fn tracked_keys(&self) -> usize {
        self.keys
            .iter()
            .filter(|entry| entry.counter.is_some())
            .count()
    }

    /// Drop all counters and overrides.
    pub fn clear(&self) {
        self.keys.clear();
    }
}
