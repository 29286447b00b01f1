//! Shared state of a synchronization run.

use std::sync::Arc;

use crate::cache::{CacheKey, TtlCache};
use crate::config::Settings;
use crate::github::rate_limit::RateLimitGuard;
use crate::github::refs::ReferenceEnumerator;
use crate::github::{ContentEntry, RemoteApi};
use crate::resolver::FileResolver;

/// Everything a synchronization pass shares across references and threads.
///
/// Constructed explicitly and passed down; tests build a fresh one per case.
pub struct SyncContext {
    api: Arc<dyn RemoteApi>,
    settings: Settings,
    guard: RateLimitGuard,
    listings: TtlCache<CacheKey, Vec<ContentEntry>>,
    reference_names: TtlCache<String, Vec<String>>,
}

impl SyncContext {
    pub fn new(api: Arc<dyn RemoteApi>, settings: Settings) -> Self {
        let max_age = settings.cache_max_age();
        Self {
            guard: RateLimitGuard::new(settings.acting_identity()),
            api,
            settings,
            listings: TtlCache::new(max_age),
            reference_names: TtlCache::new(max_age),
        }
    }

    pub fn api(&self) -> &dyn RemoteApi {
        self.api.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn guard(&self) -> &RateLimitGuard {
        &self.guard
    }

    pub fn listings(&self) -> &TtlCache<CacheKey, Vec<ContentEntry>> {
        &self.listings
    }

    pub fn reference_names(&self) -> &TtlCache<String, Vec<String>> {
        &self.reference_names
    }

    pub fn resolver(&self) -> FileResolver<'_> {
        FileResolver::new(self)
    }

    pub fn references(&self) -> ReferenceEnumerator<'_> {
        ReferenceEnumerator::new(self.api())
    }
}
