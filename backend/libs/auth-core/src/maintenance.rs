//! Periodic cleanup, decoupled from request handling
//!
//! Expired blacklist rows, stale identity-cache entries, and long-idle
//! rate-limit buckets are all reclaimed on a single low-frequency schedule.
//! Every pass is read-then-conditionally-delete and safe to run while live
//! traffic is flowing.

use std::sync::Arc;
use std::time::Duration;

use rate_limit::RateLimiter;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::services::{ExternalTokenCache, TokenBlacklist};

pub struct MaintenanceTask {
    blacklist: Arc<TokenBlacklist>,
    identity_cache: Arc<ExternalTokenCache>,
    rate_limiter: Arc<RateLimiter>,
    period: Duration,
    bucket_max_idle: Duration,
}

impl MaintenanceTask {
    pub fn new(
        blacklist: Arc<TokenBlacklist>,
        identity_cache: Arc<ExternalTokenCache>,
        rate_limiter: Arc<RateLimiter>,
        period: Duration,
        bucket_max_idle: Duration,
    ) -> Self {
        Self {
            blacklist,
            identity_cache,
            rate_limiter,
            period,
            bucket_max_idle,
        }
    }

    /// Run cleanup on a fixed schedule until the handle is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }

    /// One cleanup pass. Failures are logged, never propagated; the next
    /// tick retries.
    pub async fn run_once(&self) {
        if let Err(e) = self.blacklist.purge_expired().await {
            warn!(error = %e, "blacklist cleanup failed, will retry next tick");
        }

        let cache_purged = self.identity_cache.purge_expired();
        let buckets_evicted = self.rate_limiter.evict_idle(self.bucket_max_idle);
        debug!(cache_purged, buckets_evicted, "maintenance pass completed");
    }
}
