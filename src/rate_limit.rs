use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Hard cap on tracked (identity, action) keys. Oldest-inserted entries are
/// evicted past this point so a flood of distinct callers cannot grow the
/// map without bound.
pub const MAX_TRACKED_KEYS: usize = 10_000;

/// Millisecond clock seam; production uses [`SystemClock`], tests inject a
/// manual one for deterministic window math.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock in epoch milliseconds.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Outcome of one [`RateLimiter::consume`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Milliseconds until the window resets; always > 0 on rejection, 0 when
    /// allowed.
    pub retry_after_ms: i64,
}

#[derive(Debug)]
struct RateWindowEntry {
    count: u32,
    reset_at_ms: i64,
    inserted_seq: u64,
}

/// Fixed-window request counter keyed by an opaque caller-built string
/// (typically `"{identity}:{action}"`).
///
/// The first call for a key opens a window `[now, now + window)` with count
/// 1; calls inside the window increment the count until `limit` is reached,
/// after which calls are rejected until the window expires. Expired entries
/// are pruned lazily on every consume. Single-process only; there is no
/// shared backing store.
pub struct RateLimiter {
    entries: DashMap<String, RateWindowEntry>,
    max_entries: usize,
    insert_seq: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(MAX_TRACKED_KEYS, clock)
    }

    pub fn with_capacity(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            insert_seq: AtomicU64::new(0),
            clock,
        }
    }

    /// Counts one attempt against `key`. A `limit` of 0 or a zero `window`
    /// disables limiting for the call.
    pub fn consume(&self, key: &str, limit: u32, window: Duration) -> RateDecision {
        let now = self.clock.now_ms();
        self.prune_expired(now);
        self.trim_overflow();

        if limit == 0 || window.is_zero() {
            return RateDecision {
                allowed: true,
                remaining: u32::MAX,
                retry_after_ms: 0,
            };
        }
        let window_ms = window.as_millis() as i64;

        match self.entries.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(RateWindowEntry {
                    count: 1,
                    reset_at_ms: now + window_ms,
                    inserted_seq: self.insert_seq.fetch_add(1, Ordering::Relaxed),
                });
                RateDecision {
                    allowed: true,
                    remaining: limit.saturating_sub(1),
                    retry_after_ms: 0,
                }
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.reset_at_ms <= now {
                    // Window expired between prunes; reset transparently
                    entry.count = 1;
                    entry.reset_at_ms = now + window_ms;
                    return RateDecision {
                        allowed: true,
                        remaining: limit.saturating_sub(1),
                        retry_after_ms: 0,
                    };
                }
                if entry.count >= limit {
                    return RateDecision {
                        allowed: false,
                        remaining: 0,
                        retry_after_ms: (entry.reset_at_ms - now).max(1),
                    };
                }
                entry.count += 1;
                RateDecision {
                    allowed: true,
                    remaining: limit.saturating_sub(entry.count),
                    retry_after_ms: 0,
                }
            }
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    /// Drops all window state. Test hook.
    pub fn reset(&self) {
        self.entries.clear();
    }

    fn prune_expired(&self, now: i64) {
        self.entries.retain(|_, entry| entry.reset_at_ms > now);
    }

    /// Evicts oldest-inserted entries once the map outgrows `max_entries`.
    /// Collect-then-remove keeps shard locks from nesting.
    fn trim_overflow(&self) {
        let len = self.entries.len();
        if len <= self.max_entries {
            return;
        }
        let mut by_age: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|entry| (entry.value().inserted_seq, entry.key().clone()))
            .collect();
        by_age.sort_unstable_by_key(|(seq, _)| *seq);
        for (_, key) in by_age.into_iter().take(len - self.max_entries) {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;

    struct ManualClock {
        now_ms: AtomicI64,
    }

    impl ManualClock {
        fn new(start_ms: i64) -> Self {
            Self {
                now_ms: AtomicI64::new(start_ms),
            }
        }

        fn set(&self, ms: i64) {
            self.now_ms.store(ms, Ordering::Relaxed);
        }

        fn advance(&self, ms: i64) {
            self.now_ms.fetch_add(ms, Ordering::Relaxed);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> i64 {
            self.now_ms.load(Ordering::Relaxed)
        }
    }

    const WINDOW: Duration = Duration::from_millis(60_000);

    #[test]
    fn test_allows_until_limit_then_rejects() {
        let clock = Arc::new(ManualClock::new(10_000));
        let limiter = RateLimiter::with_clock(clock.clone());

        let first = limiter.consume("ip:capture:start", 2, WINDOW);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert_eq!(first.retry_after_ms, 0);

        clock.advance(1);
        let second = limiter.consume("ip:capture:start", 2, WINDOW);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        clock.advance(1);
        let third = limiter.consume("ip:capture:start", 2, WINDOW);
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.retry_after_ms, 59_998);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let clock = Arc::new(ManualClock::new(10_000));
        let limiter = RateLimiter::with_clock(clock.clone());
        let window = Duration::from_millis(1_000);

        assert!(limiter.consume("k", 1, window).allowed);
        clock.set(10_500);
        let rejected = limiter.consume("k", 1, window);
        assert!(!rejected.allowed);
        assert_eq!(rejected.retry_after_ms, 500);

        // Window boundary is inclusive of the reset instant
        clock.set(11_000);
        let after_reset = limiter.consume("k", 1, window);
        assert!(after_reset.allowed);
        assert_eq!(after_reset.remaining, 0);
    }

    #[test]
    fn test_rejection_then_allow_at_window_end() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = RateLimiter::with_clock(clock.clone());

        assert!(limiter.consume("k", 2, WINDOW).allowed);
        clock.set(1);
        assert!(limiter.consume("k", 2, WINDOW).allowed);
        clock.set(2);
        let rejected = limiter.consume("k", 2, WINDOW);
        assert!(!rejected.allowed);
        assert!(rejected.retry_after_ms > 0);

        clock.set(60_001);
        assert!(limiter.consume("k", 2, WINDOW).allowed);
    }

    #[test]
    fn test_zero_limit_or_window_disables() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = RateLimiter::with_clock(clock.clone());

        for _ in 0..5 {
            let decision = limiter.consume("k", 0, WINDOW);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, u32::MAX);
        }
        for _ in 0..5 {
            assert!(limiter.consume("k", 1, Duration::ZERO).allowed);
        }
        // Disabled calls never record state
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = RateLimiter::with_clock(clock);

        assert!(limiter.consume("a:capture:start", 1, WINDOW).allowed);
        assert!(!limiter.consume("a:capture:start", 1, WINDOW).allowed);
        assert!(limiter.consume("b:capture:start", 1, WINDOW).allowed);
        assert!(limiter.consume("a:capture:analyze", 1, WINDOW).allowed);
    }

    #[test]
    fn test_prunes_expired_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = RateLimiter::with_clock(clock.clone());
        let window = Duration::from_millis(100);

        limiter.consume("short-lived", 5, window);
        assert_eq!(limiter.tracked_keys(), 1);

        clock.set(200);
        limiter.consume("other", 5, WINDOW);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_evicts_oldest_on_overflow() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = RateLimiter::with_capacity(3, clock.clone());

        for key in ["a", "b", "c", "d"] {
            assert!(limiter.consume(key, 1, WINDOW).allowed);
        }
        assert_eq!(limiter.tracked_keys(), 4);

        // This consume trims the overflow first, evicting "a" as the
        // oldest-inserted key; "c" still holds its exhausted window.
        clock.advance(1);
        assert!(!limiter.consume("c", 1, WINDOW).allowed);
        assert_eq!(limiter.tracked_keys(), 3);

        // Evicted keys start a fresh window
        assert!(limiter.consume("a", 1, WINDOW).allowed);
    }

    #[test]
    fn test_reset_clears_state() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = RateLimiter::with_clock(clock);

        assert!(limiter.consume("k", 1, WINDOW).allowed);
        assert!(!limiter.consume("k", 1, WINDOW).allowed);

        limiter.reset();
        assert_eq!(limiter.tracked_keys(), 0);
        assert!(limiter.consume("k", 1, WINDOW).allowed);
    }
}
