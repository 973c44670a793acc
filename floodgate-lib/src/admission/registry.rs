use ahash::AHashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

use super::bucket::TokenBucket;
use super::key::ClientKey;
use crate::config::AdmissionConfig;

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Request may proceed to the next pipeline stage.
    Allowed {
        /// Whole tokens left in the client's bucket after this admission
        remaining: u32,
    },
    /// Request exceeded the client's rate and must be rejected.
    Limited {
        /// Time until the client's next token accrues
        retry_after: Duration,
    },
}

impl Decision {
    /// Returns true if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Returns true if the request is rate limited.
    pub fn is_limited(&self) -> bool {
        matches!(self, Decision::Limited { .. })
    }
}

/// Per-client state: the token bucket plus the last time the client was
/// observed, which drives janitor eviction.
#[derive(Debug)]
struct ClientEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Concurrently-safe map from client key to token-bucket state.
///
/// The registry is the single source of truth for admission decisions. It
/// is explicitly owned and handle-shared (`Arc`), never a process-wide
/// singleton, so independent limiter instances can coexist and tests can
/// drive one in isolation.
///
/// The whole refill-decide-deduct sequence for a key runs under the
/// structural lock, so concurrent requests racing for the last token
/// resolve to exactly one winner. The lock is held only for in-memory work;
/// `admit` never suspends on I/O.
pub struct AdmissionRegistry {
    clients: Mutex<AHashMap<ClientKey, ClientEntry>>,
    capacity: u32,
    refill_per_sec: f64,
    enabled: bool,
}

impl AdmissionRegistry {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            clients: Mutex::new(AHashMap::new()),
            capacity: config.burst,
            refill_per_sec: config.requests_per_second,
            enabled: config.enabled,
        }
    }

    /// Admission check against the wall clock.
    pub fn admit(&self, key: &ClientKey) -> Decision {
        self.admit_at(key, Instant::now())
    }

    /// Admission check against an explicit clock, for deterministic tests.
    ///
    /// Looks up (or lazily creates) the client's entry, credits tokens
    /// accrued since the last refill, then consumes one token if a whole
    /// token is available. Both outcomes refresh `last_seen`.
    ///
    /// When admission control is disabled every request is allowed and no
    /// state is created.
    pub fn admit_at(&self, key: &ClientKey, now: Instant) -> Decision {
        if !self.enabled {
            return Decision::Allowed { remaining: self.capacity };
        }

        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("admission registry lock poisoned, failing open");
                return Decision::Allowed { remaining: 0 };
            }
        };

        let entry = clients.entry(key.clone()).or_insert_with(|| ClientEntry {
            bucket: TokenBucket::full(self.capacity, now),
            last_seen: now,
        });

        entry.bucket.refill(now, self.capacity, self.refill_per_sec);
        entry.last_seen = now;

        if entry.bucket.try_consume() {
            Decision::Allowed { remaining: entry.bucket.remaining() }
        } else {
            Decision::Limited { retry_after: entry.bucket.time_to_next_token(self.refill_per_sec) }
        }
    }

    /// Remove entries idle longer than `retention`, against the wall clock.
    pub fn evict_idle(&self, retention: Duration) -> usize {
        self.evict_idle_at(Instant::now(), retention)
    }

    /// Remove entries whose `last_seen` is older than `retention` relative
    /// to `now`. Returns the number of entries evicted. Holds the
    /// structural lock for the duration of the scan.
    pub fn evict_idle_at(&self, now: Instant, retention: Duration) -> usize {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("admission registry lock poisoned, skipping sweep");
                return 0;
            }
        };

        let before = clients.len();
        clients.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= retention);
        before - clients.len()
    }

    /// Number of clients currently tracked.
    pub fn len(&self) -> usize {
        match self.clients.lock() {
            Ok(guard) => guard.len(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured burst capacity, shared by all clients.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn config(burst: u32, requests_per_second: f64) -> AdmissionConfig {
        AdmissionConfig { enabled: true, requests_per_second, burst, ..AdmissionConfig::default() }
    }

    #[test]
    fn fresh_client_gets_full_burst_then_deny() {
        let registry = AdmissionRegistry::new(&config(4, 1.0));
        let key = ClientKey::new("203.0.113.7");
        let now = Instant::now();

        for _ in 0..4 {
            assert!(registry.admit_at(&key, now).is_allowed());
        }
        assert!(registry.admit_at(&key, now).is_limited());
    }

    #[test]
    fn half_second_refill_regenerates_exactly_one_token() {
        let registry = AdmissionRegistry::new(&config(5, 2.0));
        let key = ClientKey::new("203.0.113.7");
        let t0 = Instant::now();

        for _ in 0..5 {
            assert!(registry.admit_at(&key, t0).is_allowed());
        }
        let denied = registry.admit_at(&key, t0);
        assert_eq!(denied, Decision::Limited { retry_after: Duration::from_millis(500) });

        let t1 = t0 + Duration::from_millis(500);
        assert!(registry.admit_at(&key, t1).is_allowed());
        assert!(registry.admit_at(&key, t1).is_limited());
    }

    #[test]
    fn sustained_rate_after_burst() {
        // 5 at t=0, deny the 6th, then 2 tokens back after one second
        let registry = AdmissionRegistry::new(&config(5, 2.0));
        let key = ClientKey::new("203.0.113.7");
        let t0 = Instant::now();

        for _ in 0..5 {
            assert!(registry.admit_at(&key, t0).is_allowed());
        }
        assert!(registry.admit_at(&key, t0).is_limited());

        let t1 = t0 + Duration::from_secs(1);
        assert!(registry.admit_at(&key, t1).is_allowed());
        assert!(registry.admit_at(&key, t1).is_allowed());
        assert!(registry.admit_at(&key, t1).is_limited());
    }

    #[test]
    fn exhausting_one_client_does_not_affect_another() {
        let registry = AdmissionRegistry::new(&config(2, 1.0));
        let now = Instant::now();
        let a = ClientKey::new("198.51.100.1");
        let b = ClientKey::new("198.51.100.2");

        assert!(registry.admit_at(&a, now).is_allowed());
        assert!(registry.admit_at(&a, now).is_allowed());
        assert!(registry.admit_at(&a, now).is_limited());

        assert!(registry.admit_at(&b, now).is_allowed());
    }

    #[test]
    fn disabled_registry_allows_everything_and_stays_empty() {
        let registry = AdmissionRegistry::new(&AdmissionConfig {
            enabled: false,
            ..AdmissionConfig::default()
        });
        let key = ClientKey::new("203.0.113.7");

        for _ in 0..1000 {
            assert!(registry.admit(&key).is_allowed());
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn idle_entries_are_evicted_and_return_fresh() {
        let registry = AdmissionRegistry::new(&config(3, 1.0));
        let key = ClientKey::new("203.0.113.7");
        let t0 = Instant::now();
        let retention = Duration::from_secs(180);

        for _ in 0..3 {
            assert!(registry.admit_at(&key, t0).is_allowed());
        }
        assert_eq!(registry.len(), 1);

        // still within the retention window: kept
        assert_eq!(registry.evict_idle_at(t0 + Duration::from_secs(100), retention), 0);
        assert_eq!(registry.len(), 1);

        // beyond it: evicted, and the next request starts a fresh bucket
        assert_eq!(registry.evict_idle_at(t0 + Duration::from_secs(200), retention), 1);
        assert!(registry.is_empty());

        let t2 = t0 + Duration::from_secs(200);
        for _ in 0..3 {
            assert!(registry.admit_at(&key, t2).is_allowed());
        }
        assert!(registry.admit_at(&key, t2).is_limited());
    }

    #[test]
    fn denied_request_still_refreshes_last_seen() {
        let registry = AdmissionRegistry::new(&config(1, 0.001));
        let key = ClientKey::new("203.0.113.7");
        let t0 = Instant::now();
        let retention = Duration::from_secs(180);

        assert!(registry.admit_at(&key, t0).is_allowed());

        // a denied request at t=100s keeps the entry alive at t=200s
        let t1 = t0 + Duration::from_secs(100);
        assert!(registry.admit_at(&key, t1).is_limited());
        assert_eq!(registry.evict_idle_at(t0 + Duration::from_secs(200), retention), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn last_token_has_exactly_one_winner() {
        // negligible refill rate so the race window cannot regenerate a token
        let registry = Arc::new(AdmissionRegistry::new(&config(1, 0.001)));
        let key = ClientKey::new("203.0.113.7");
        let barrier = Arc::new(Barrier::new(8));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let key = key.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                registry.admit(&key).is_allowed()
            }));
        }

        let allowed = handles
            .into_iter()
            .map(|handle| handle.join().expect("admit thread panicked"))
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(allowed, 1);
    }

    #[test]
    fn allowed_decision_reports_remaining_tokens() {
        let registry = AdmissionRegistry::new(&config(3, 1.0));
        let key = ClientKey::new("203.0.113.7");
        let now = Instant::now();

        assert_eq!(registry.admit_at(&key, now), Decision::Allowed { remaining: 2 });
        assert_eq!(registry.admit_at(&key, now), Decision::Allowed { remaining: 1 });
        assert_eq!(registry.admit_at(&key, now), Decision::Allowed { remaining: 0 });
    }
}
