//! Per-map route cache with single-flight computation.
//!
//! Entries are grouped into one bucket per map. Invalidating a map drops its
//! bucket (entries and in-flight registrations) under a single write lock, so
//! no reader can observe a mix of entries from before and after a topology
//! change. Each bucket carries a generation number: a computation that began
//! before an invalidation still answers its own callers but never stores its
//! result.
//!
//! Concurrent requests for the same uncached key share one computation. The
//! first caller (the leader) computes; later callers wait on the leader's
//! flight. When the leader returns an error, waiters compute directly. When
//! the leader panics, waiters see [`Error::CacheCoordinationFailure`]
//! internally, log it and also compute directly.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::Lazy;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::TopologyListener;
use crate::routing::{RouteOutcome, RouteQuery};
use crate::topology::MapId;

static GLOBAL_ROUTE_CACHE: Lazy<Arc<RouteCache<RouteOutcome>>> =
    Lazy::new(|| Arc::new(RouteCache::new()));

/// Deterministic digest of a full request signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Hash the canonical JSON encoding of `query`.
    ///
    /// Candidate sets and avoided systems are ordered sets, so two requests
    /// naming the same systems in a different order share a key.
    pub fn for_query(query: &RouteQuery) -> Result<Self> {
        Self::for_value(query)
    }

    pub fn for_value<T: Serialize>(value: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(value)?;
        Ok(Self(Sha256::digest(&encoded).into()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", &hex::encode(self.0)[..12])
    }
}

/// Counters describing cache activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub coordination_failures: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    coordination_failures: AtomicU64,
}

enum FlightState<V> {
    Pending,
    Ready(V),
    /// The leader's computation returned an error.
    Errored,
    /// The leader unwound without settling.
    Abandoned,
}

/// Rendezvous point for callers waiting on one in-progress computation.
struct Flight<V> {
    state: Mutex<FlightState<V>>,
    ready: Condvar,
}

impl<V: Clone> Flight<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Pending),
            ready: Condvar::new(),
        }
    }

    fn settle(&self, outcome: FlightState<V>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, FlightState::Pending) {
            *state = outcome;
        }
        self.ready.notify_all();
    }

    /// `Ok(None)` when the leader's computation returned an error.
    fn wait(&self, map_id: MapId) -> Result<Option<V>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match &*state {
                FlightState::Pending => {
                    state = self
                        .ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                FlightState::Ready(value) => return Ok(Some(value.clone())),
                FlightState::Errored => return Ok(None),
                FlightState::Abandoned => {
                    return Err(Error::CacheCoordinationFailure { map_id })
                }
            }
        }
    }
}

struct MapBucket<V> {
    generation: u64,
    entries: HashMap<CacheKey, V>,
    in_flight: HashMap<CacheKey, Arc<Flight<V>>>,
}

enum Role<V> {
    Leader { flight: Arc<Flight<V>>, generation: u64 },
    Follower(Arc<Flight<V>>),
}

/// Per-map, tag-keyed memoization of route outcomes.
pub struct RouteCache<V> {
    buckets: RwLock<HashMap<MapId, MapBucket<V>>>,
    next_generation: AtomicU64,
    counters: Counters,
}

impl<V> Default for RouteCache<V> {
    fn default() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            counters: Counters::default(),
        }
    }
}

impl RouteCache<RouteOutcome> {
    /// Process-wide cache, empty until first used.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_ROUTE_CACHE)
    }
}

impl<V: Clone + Send + Sync> RouteCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key` on `map_id`, computing it at most
    /// once across concurrent callers when absent.
    ///
    /// Errors from `compute` are returned to the caller and never cached.
    pub fn get_or_compute<F>(&self, map_id: MapId, key: CacheKey, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = self.lookup(map_id, &key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(map_id, %key, "route cache hit");
            return Ok(value);
        }

        let role = {
            let mut buckets = self.write();
            let bucket = buckets.entry(map_id).or_insert_with(|| MapBucket {
                generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
                entries: HashMap::new(),
                in_flight: HashMap::new(),
            });

            if let Some(value) = bucket.entries.get(&key) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value.clone());
            }

            match bucket.in_flight.get(&key) {
                Some(flight) => Role::Follower(Arc::clone(flight)),
                None => {
                    let flight = Arc::new(Flight::new());
                    bucket.in_flight.insert(key, Arc::clone(&flight));
                    Role::Leader {
                        flight,
                        generation: bucket.generation,
                    }
                }
            }
        };

        match role {
            Role::Leader { flight, generation } => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(map_id, %key, "route cache miss");
                let mut guard = FlightGuard {
                    cache: self,
                    map_id,
                    key,
                    generation,
                    flight,
                    settled: false,
                };
                let outcome = compute();
                match &outcome {
                    Ok(value) => guard.complete(value.clone()),
                    Err(err) => {
                        debug!(map_id, %key, %err, "route computation failed");
                        guard.fail();
                    }
                }
                outcome
            }
            Role::Follower(flight) => match flight.wait(map_id) {
                Ok(Some(value)) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(map_id, %key, "route cache joined in-flight computation");
                    Ok(value)
                }
                Ok(None) => {
                    debug!(map_id, %key, "in-flight computation failed, computing directly");
                    compute()
                }
                Err(err) => {
                    self.counters
                        .coordination_failures
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(map_id, %key, %err, "falling back to uncached route computation");
                    compute()
                }
            },
        }
    }

    /// Drop every entry and in-flight registration for `map_id`.
    ///
    /// Returns the number of cached entries removed.
    pub fn invalidate(&self, map_id: MapId) -> usize {
        let removed = self.write().remove(&map_id);
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);

        let entries = removed.map(|bucket| bucket.entries.len()).unwrap_or(0);
        info!(map_id, entries, "route cache invalidated");
        entries
    }

    /// Drop every bucket.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of cached entries for `map_id`.
    pub fn len(&self, map_id: MapId) -> usize {
        self.read()
            .get(&map_id)
            .map(|bucket| bucket.entries.len())
            .unwrap_or(0)
    }

    /// Number of maps with a live bucket.
    pub fn map_count(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().values().all(|bucket| bucket.entries.is_empty())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            coordination_failures: self.counters.coordination_failures.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, map_id: MapId, key: &CacheKey) -> Option<V> {
        self.read()
            .get(&map_id)
            .and_then(|bucket| bucket.entries.get(key))
            .cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<MapId, MapBucket<V>>> {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<MapId, MapBucket<V>>> {
        self.buckets.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the flight registration and, when the bucket has not been
    /// invalidated since the flight started, store `value`. A bucket left
    /// with no entries and no flights is dropped.
    fn finish_flight(&self, map_id: MapId, key: CacheKey, generation: u64, value: Option<V>) {
        let mut buckets = self.write();
        let Some(bucket) = buckets.get_mut(&map_id) else {
            return;
        };
        if bucket.generation != generation {
            debug!(map_id, %key, "discarding result computed before invalidation");
            return;
        }
        bucket.in_flight.remove(&key);
        match value {
            Some(value) => {
                bucket.entries.insert(key, value);
            }
            None if bucket.entries.is_empty() && bucket.in_flight.is_empty() => {
                buckets.remove(&map_id);
            }
            None => {}
        }
    }
}

impl<V> fmt::Debug for RouteCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let maps = self
            .buckets
            .read()
            .map(|buckets| buckets.len())
            .unwrap_or_default();
        f.debug_struct("RouteCache").field("maps", &maps).finish()
    }
}

impl<V: Clone + Send + Sync> TopologyListener for RouteCache<V> {
    fn on_topology_changed(&self, map_id: MapId) {
        self.invalidate(map_id);
    }
}

/// Settles a leader's flight exactly once. Dropping an unsettled guard
/// (unwinding panic) marks the flight abandoned so waiters never hang.
struct FlightGuard<'a, V: Clone + Send + Sync> {
    cache: &'a RouteCache<V>,
    map_id: MapId,
    key: CacheKey,
    generation: u64,
    flight: Arc<Flight<V>>,
    settled: bool,
}

impl<V: Clone + Send + Sync> FlightGuard<'_, V> {
    fn complete(&mut self, value: V) {
        self.cache
            .finish_flight(self.map_id, self.key, self.generation, Some(value.clone()));
        self.flight.settle(FlightState::Ready(value));
        self.settled = true;
    }

    fn fail(&mut self) {
        self.cache
            .finish_flight(self.map_id, self.key, self.generation, None);
        self.flight.settle(FlightState::Errored);
        self.settled = true;
    }
}

impl<V: Clone + Send + Sync> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.cache
            .finish_flight(self.map_id, self.key, self.generation, None);
        self.flight.settle(FlightState::Abandoned);
    }
}
