//! Tiered token-bucket rate limiting for the Quillbox API
//!
//! Every inbound request is checked against up to three tiers before any
//! handler work happens:
//!
//! 1. A global bucket protecting the whole service from aggregate overload.
//! 2. A per-caller bucket, created lazily on first request and keyed by the
//!    resolved user id when one is available, falling back to the client IP.
//! 3. An optional per-endpoint-class bucket for routes with tighter budgets
//!    (auth, profile, search).
//!
//! Whitelisted user ids and IPs bypass all tiers. A rejection is a structured
//! [`Decision`] with a retry hint, never an error; retry is the caller's
//! decision.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

mod token_bucket;

pub use token_bucket::TokenBucket;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Suggested delay before retrying; zero when allowed.
    pub retry_after: Duration,
}

impl Decision {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    pub fn rejected(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after,
        }
    }
}

/// The identity a request is throttled under.
///
/// User ids come from the validated token, not from the IP, so clients behind
/// a shared NAT do not throttle each other once authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallerId {
    User(Uuid),
    Ip(String),
}

impl CallerId {
    fn bucket_key(&self) -> String {
        match self {
            CallerId::User(id) => format!("user:{id}"),
            CallerId::Ip(ip) => format!("ip:{ip}"),
        }
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerId::User(id) => write!(f, "user:{id}"),
            CallerId::Ip(ip) => write!(f, "ip:{ip}"),
        }
    }
}

/// Endpoint classes that may carry their own budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    Auth,
    Profile,
    Search,
    General,
}

impl EndpointClass {
    fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Auth => "auth",
            EndpointClass::Profile => "profile",
            EndpointClass::Search => "search",
            EndpointClass::General => "general",
        }
    }
}

/// Capacity and refill for one bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BucketPolicy {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

impl BucketPolicy {
    /// Policy allowing `per_minute` sustained requests with bursts up to
    /// `burst`.
    pub fn per_minute(per_minute: f64, burst: f64) -> Self {
        Self {
            capacity: burst,
            refill_per_sec: per_minute / 60.0,
        }
    }

    fn build(&self) -> TokenBucket {
        TokenBucket::new(self.capacity, self.refill_per_sec)
    }
}

/// Full limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub global: BucketPolicy,
    pub per_caller: BucketPolicy,
    /// Endpoint classes with budgets tighter than the per-caller default.
    pub class_overrides: HashMap<EndpointClass, BucketPolicy>,
    pub whitelist_users: HashSet<Uuid>,
    pub whitelist_ips: HashSet<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut class_overrides = HashMap::new();
        class_overrides.insert(EndpointClass::Auth, BucketPolicy::per_minute(10.0, 5.0));
        class_overrides.insert(EndpointClass::Search, BucketPolicy::per_minute(30.0, 10.0));

        Self {
            global: BucketPolicy::per_minute(6000.0, 200.0),
            per_caller: BucketPolicy::per_minute(120.0, 30.0),
            class_overrides,
            whitelist_users: HashSet::new(),
            whitelist_ips: HashSet::new(),
        }
    }
}

/// Tiered rate limiter shared by all request workers.
///
/// The per-caller map is read-mostly: lookups take a shard read lock and only
/// the first request from a caller takes a write lock to insert. Bucket
/// refill/consume runs under the bucket's own lock, independent of the map.
pub struct RateLimiter {
    config: RateLimitConfig,
    global: TokenBucket,
    callers: DashMap<String, Arc<TokenBucket>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let global = config.global.build();
        Self {
            config,
            global,
            callers: DashMap::new(),
        }
    }

    /// Check all tiers for one request. The first rejecting tier wins.
    ///
    /// Tokens consumed at earlier tiers are not refunded when a later tier
    /// rejects: a class-throttled request still spends one global and one
    /// per-caller token. Budgets are sized with that in mind.
    pub fn check(&self, caller: &CallerId, class: EndpointClass) -> Decision {
        if self.is_whitelisted(caller) {
            return Decision::allowed();
        }

        let global = self.global.try_acquire();
        if !global.allowed {
            debug!(caller = %caller, "global rate limit exceeded");
            return global;
        }

        let per_caller = self
            .bucket(caller.bucket_key(), self.config.per_caller)
            .try_acquire();
        if !per_caller.allowed {
            debug!(caller = %caller, "per-caller rate limit exceeded");
            return per_caller;
        }

        if let Some(policy) = self.config.class_overrides.get(&class) {
            let key = format!("{}:{}", caller.bucket_key(), class.as_str());
            let class_decision = self.bucket(key, *policy).try_acquire();
            if !class_decision.allowed {
                debug!(caller = %caller, class = class.as_str(), "endpoint-class rate limit exceeded");
                return class_decision;
            }
        }

        Decision::allowed()
    }

    /// Number of live per-caller buckets.
    pub fn tracked_callers(&self) -> usize {
        self.callers.len()
    }

    /// Drop buckets idle for longer than `max_idle`.
    ///
    /// Safe to run concurrently with live traffic; a caller evicted here gets
    /// a fresh full bucket on its next request, which only errs on the
    /// permissive side.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        // Counted inside the sweep: buckets created concurrently must not
        // skew (or underflow) the eviction count.
        let mut evicted = 0;
        self.callers.retain(|_, bucket| {
            let keep = bucket.idle_for(now) < max_idle;
            if !keep {
                evicted += 1;
            }
            keep
        });
        if evicted > 0 {
            info!(evicted, remaining = self.callers.len(), "evicted idle rate-limit buckets");
        }
        evicted
    }

    fn is_whitelisted(&self, caller: &CallerId) -> bool {
        match caller {
            CallerId::User(id) => self.config.whitelist_users.contains(id),
            CallerId::Ip(ip) => self.config.whitelist_ips.contains(ip),
        }
    }

    fn bucket(&self, key: String, policy: BucketPolicy) -> Arc<TokenBucket> {
        self.callers
            .entry(key)
            .or_insert_with(|| Arc::new(policy.build()))
            .clone()
    }
}
