//! # Request Throttle
//!
//! One [`RateLimiter`] instance gates every request to the API, whoever
//! issues it. Two bounds hold at once:
//!
//! - request *starts* are spaced at least `min_spacing` apart, globally
//! - at most `max_concurrent` requests are in flight
//!
//! Callers past either bound wait; nothing is rejected. The limiter also keeps
//! the last quota the server reported through `X-RateLimit-*` headers. It
//! knows nothing about status codes.

use crate::error::{ProviderError, Result};
use core_runtime::EngineConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Server-reported quota; `None` means not yet reported (unbounded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaSnapshot {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
}

impl QuotaSnapshot {
    pub fn is_unbounded(&self) -> bool {
        self.limit.is_none()
    }
}

/// Held for the duration of one request; dropping it frees the slot
#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: OwnedSemaphorePermit,
}

pub struct RateLimiter {
    min_spacing: Duration,
    max_concurrent: usize,
    in_flight: Arc<Semaphore>,
    next_start: AsyncMutex<Option<Instant>>,
    quota: Mutex<QuotaSnapshot>,
}

impl RateLimiter {
    pub fn new(min_spacing: Duration, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            min_spacing,
            max_concurrent,
            in_flight: Arc::new(Semaphore::new(max_concurrent)),
            next_start: AsyncMutex::new(None),
            quota: Mutex::new(QuotaSnapshot::default()),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.min_request_spacing(), config.max_concurrent_requests)
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Wait for a concurrency slot, then for the next start slot
    pub async fn acquire(&self) -> Result<RateLimitPermit> {
        let permit = Arc::clone(&self.in_flight)
            .acquire_owned()
            .await
            .map_err(|e| ProviderError::Internal(format!("Rate limiter closed: {}", e)))?;

        let start_at = {
            let mut next_start = self.next_start.lock().await;
            let now = Instant::now();
            let start_at = match *next_start {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_start = Some(start_at + self.min_spacing);
            start_at
        };

        let wait = start_at.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            trace!(wait_ms = wait.as_millis() as u64, "Waiting for request slot");
            tokio::time::sleep_until(start_at).await;
        }

        Ok(RateLimitPermit { _permit: permit })
    }

    /// Update the quota from `X-RateLimit-Limit` / `X-RateLimit-Remaining`
    ///
    /// Returns the new snapshot when both values parsed. Malformed values are
    /// logged and ignored.
    pub fn record_quota(
        &self,
        limit: Option<&str>,
        remaining: Option<&str>,
    ) -> Option<QuotaSnapshot> {
        let limit = parse_quota_header("X-RateLimit-Limit", limit);
        let remaining = parse_quota_header("X-RateLimit-Remaining", remaining);

        let (limit, remaining) = (limit?, remaining?);
        debug!(remaining, limit, "Rate limit after request");

        let snapshot = QuotaSnapshot {
            limit: Some(limit),
            remaining: Some(remaining),
        };
        *self.quota.lock().unwrap_or_else(|e| e.into_inner()) = snapshot;
        Some(snapshot)
    }

    pub fn quota(&self) -> QuotaSnapshot {
        *self.quota.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_spacing", &self.min_spacing)
            .field("max_concurrent", &self.max_concurrent)
            .field("available", &self.in_flight.available_permits())
            .field("quota", &self.quota())
            .finish()
    }
}

/// Digits only; anything else is a warning, not an error
pub(crate) fn parse_quota_header(name: &str, value: Option<&str>) -> Option<u64> {
    let value = value?.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        warn!(header = name, value, "Ignoring malformed rate limit header");
        return None;
    }

    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(header = name, value, error = %e, "Ignoring out-of-range rate limit header");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_spacing_and_concurrency_bounds() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(2000), 2));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let origin = Instant::now();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _permit = limiter.acquire().await.unwrap();
                    let granted_at = origin.elapsed();

                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);

                    granted_at
                })
            })
            .collect();

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap());
        }
        grants.sort();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(grants[0] < Duration::from_millis(2000));
        for granted in &grants[2..] {
            assert!(*granted >= Duration::from_millis(2000), "{:?}", granted);
        }
        // Starts are spaced globally, not per slot.
        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(2000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_request_holds_slot() {
        let limiter = Arc::new(RateLimiter::new(Duration::ZERO, 1));
        let first = limiter.acquire().await.unwrap();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                limiter.acquire().await.unwrap();
                Instant::now()
            })
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        let released_at = Instant::now();
        drop(first);

        assert!(waiter.await.unwrap() >= released_at);
    }

    #[test]
    fn test_quota_starts_unbounded() {
        let limiter = RateLimiter::new(Duration::ZERO, 2);
        assert!(limiter.quota().is_unbounded());
    }

    #[test]
    fn test_record_quota() {
        let limiter = RateLimiter::new(Duration::ZERO, 2);

        let snapshot = limiter.record_quota(Some("90"), Some("87")).unwrap();
        assert_eq!(snapshot.limit, Some(90));
        assert_eq!(limiter.quota().remaining, Some(87));
    }

    #[test]
    fn test_malformed_quota_is_ignored() {
        let limiter = RateLimiter::new(Duration::ZERO, 2);
        limiter.record_quota(Some("90"), Some("60")).unwrap();

        assert!(limiter.record_quota(Some("90"), Some("-1")).is_none());
        assert!(limiter.record_quota(Some("ninety"), Some("10")).is_none());
        assert!(limiter.record_quota(None, Some("10")).is_none());

        assert_eq!(limiter.quota().remaining, Some(60));
    }

    #[test]
    fn test_from_config() {
        let limiter = RateLimiter::from_config(&EngineConfig::default());
        assert_eq!(limiter.min_spacing(), Duration::from_millis(2000));
        assert_eq!(limiter.max_concurrent(), 2);
    }
}
