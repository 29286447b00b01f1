//! Quota bracketing for batches of remote calls.

use std::sync::atomic::{AtomicU64, Ordering};

use super::{Quota, RemoteApi};
use crate::defaults::RATE_LIMIT_MESSAGE;
use crate::error::{Error, Result};

/// Snapshot of the guard's process-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaStats {
    /// Blocks run through [`RateLimitGuard::with_quota_check`]
    pub calls: u64,
    /// Rate-limited requests consumed by those blocks
    pub consumed: u64,
    /// Blocks that consumed nothing
    pub cache_only: u64,
}

/// Observes remote quota around a block of calls.
///
/// Never retries. An exhausted quota before the block fails immediately;
/// throttling during the block surfaces as whatever error the block returns.
#[derive(Debug)]
pub struct RateLimitGuard {
    identity: String,
    calls: AtomicU64,
    consumed: AtomicU64,
    cache_only: AtomicU64,
}

impl RateLimitGuard {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            calls: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            cache_only: AtomicU64::new(0),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Runs `work`, sampling the quota before and after.
    pub fn with_quota_check<T, F>(&self, api: &dyn RemoteApi, label: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let before = self.sample(api, label);
        if let Some(Quota { remaining: 0, .. }) = before {
            log::error!("{}: {}", self.identity, RATE_LIMIT_MESSAGE);
            return Err(Error::RateLimitExceeded);
        }

        let result = work();
        self.calls.fetch_add(1, Ordering::Relaxed);

        if let (Some(before), Some(after)) = (before, self.sample(api, label)) {
            let used = before.remaining.saturating_sub(after.remaining);
            if used == 0 {
                self.cache_only.fetch_add(1, Ordering::Relaxed);
                log::debug!("{}: was served entirely from cache", label);
            } else {
                self.consumed.fetch_add(used, Ordering::Relaxed);
                log::debug!("{}: used up {} rate limited requests", label, used);
            }
        }

        if let Err(e) = &result {
            if matches!(e, Error::RateLimitExceeded | Error::AbuseLimitReached) {
                log::error!("{}: {}: {}", self.identity, label, e);
            }
        }
        result
    }

    pub fn stats(&self) -> QuotaStats {
        QuotaStats {
            calls: self.calls.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            cache_only: self.cache_only.load(Ordering::Relaxed),
        }
    }

    fn sample(&self, api: &dyn RemoteApi, label: &str) -> Option<Quota> {
        match api.rate_limit() {
            Ok(quota) => Some(quota),
            Err(e) => {
                log::info!("{}: could not sample rate limit: {}", label, e);
                None
            }
        }
    }
}
