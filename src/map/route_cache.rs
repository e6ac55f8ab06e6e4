//! Road-following paths for krawl trails.
//!
//! [`RouteCache`] memoizes routing results per waypoint list and travel
//! profile. Entries expire lazily after a TTL, the table is bounded with LRU
//! eviction, and concurrent lookups of the same key share one request.

use super::types::TravelProfile;
use crate::clock::{Clock, UnixMillis};
use crate::config::RouteCacheConfig;
use crate::error::FetchError;
use crate::geo::{path_length, Coordinate};
use futures_util::future::{FutureExt, LocalBoxFuture, Shared};
use lru::LruCache;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::future::Future;
use std::num::NonZeroUsize;
use std::rc::Rc;
use xxhash_rust::xxh64::xxh64;

/// Stable hash of a rounded waypoint list and profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteKey(u64);

impl RouteKey {
    pub fn new(waypoints: &[Coordinate], profile: TravelProfile, precision: u32) -> Self {
        let p = precision as usize;
        let mut canonical = String::with_capacity(waypoints.len() * 24 + 8);
        canonical.push_str(profile.as_str());
        canonical.push(':');
        for (i, c) in waypoints.iter().enumerate() {
            if i > 0 {
                canonical.push('|');
            }
            let r = c.rounded(precision);
            // Adding 0.0 folds -0.0 into 0.0 so both hash alike.
            let _ = write!(canonical, "{:.p$},{:.p$}", r.lon + 0.0, r.lat + 0.0, p = p);
        }
        Self(xxh64(canonical.as_bytes(), 0))
    }
}

/// A cached value with its insertion time and lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: RouteKey,
    pub value: T,
    pub inserted_at: UnixMillis,
    pub ttl_ms: u64,
}

impl<T> CacheEntry<T> {
    pub fn is_expired(&self, now: UnixMillis) -> bool {
        now.millis_since(self.inserted_at) >= self.ttl_ms
    }
}

/// What a routing service returns for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub path: Vec<Coordinate>,
    pub distance_m: Option<f64>,
    pub duration_s: Option<f64>,
    /// Legs the service could not route, drawn as straight segments.
    pub unrouted_legs: usize,
}

/// A routing service: ordered waypoints and a profile in, a path out.
pub trait RouteProvider {
    fn route(
        &self,
        waypoints: &[Coordinate],
        profile: TravelProfile,
    ) -> impl Future<Output = Result<RouteResponse, FetchError>>;
}

impl<P: RouteProvider + ?Sized> RouteProvider for Rc<P> {
    fn route(
        &self,
        waypoints: &[Coordinate],
        profile: TravelProfile,
    ) -> impl Future<Output = Result<RouteResponse, FetchError>> {
        (**self).route(waypoints, profile)
    }
}

/// A resolved road-following path for a waypoint list.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailRoute {
    pub waypoints: Vec<Coordinate>,
    pub profile: TravelProfile,
    pub path: Vec<Coordinate>,
    pub cache_key: RouteKey,
    pub fetched_at: UnixMillis,
    pub distance_m: Option<f64>,
    pub duration_s: Option<f64>,
    pub unrouted_legs: usize,
}

/// A drawable trail: routed when the service answered, straight otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrail {
    pub path: Vec<Coordinate>,
    /// False when any part of the path is a straight-line fallback.
    pub routed: bool,
    /// Straight legs inside an otherwise routed path.
    pub unrouted_legs: usize,
    pub distance_m: f64,
    pub duration_s: Option<f64>,
}

/// Straight segments between the valid waypoints, in order.
pub fn straight_line(waypoints: &[Coordinate]) -> Vec<Coordinate> {
    waypoints.iter().copied().filter(|c| c.is_valid()).collect()
}

/// Lookup counters, mostly for the status line and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub evictions: u64,
}

type InFlightRoute = Shared<LocalBoxFuture<'static, Option<Rc<TrailRoute>>>>;

struct CacheState {
    entries: LruCache<RouteKey, CacheEntry<Rc<TrailRoute>>>,
    in_flight: HashMap<RouteKey, InFlightRoute>,
    stats: RouteCacheStats,
}

impl CacheState {
    fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            in_flight: HashMap::new(),
            stats: RouteCacheStats::default(),
        }
    }

    /// Inserts `route`, first dropping expired entries. The least recently
    /// used entry makes room when the table is still full.
    fn insert(&mut self, route: Rc<TrailRoute>, now: UnixMillis, config: &RouteCacheConfig) {
        let key = route.cache_key;
        if !self.entries.contains(&key) {
            let expired: Vec<RouteKey> = self
                .entries
                .iter()
                .filter(|(_, e)| e.is_expired(now))
                .map(|(k, _)| *k)
                .collect();
            for old in expired {
                self.entries.pop(&old);
            }
        }
        let entry = CacheEntry {
            key,
            value: route,
            inserted_at: now,
            ttl_ms: config.ttl_ms,
        };
        if let Some((old, _)) = self.entries.push(key, entry) {
            if old != key {
                self.stats.evictions += 1;
                log::debug!("Route cache evicted {:016x}", old.0);
            }
        }
    }
}

/// Memoizing, request-coalescing front for a [`RouteProvider`].
pub struct RouteCache<P, C> {
    provider: Rc<P>,
    clock: C,
    config: RouteCacheConfig,
    state: Rc<RefCell<CacheState>>,
}

impl<P, C> RouteCache<P, C>
where
    P: RouteProvider + 'static,
    C: Clock + Clone + 'static,
{
    pub fn new(provider: P, clock: C, config: RouteCacheConfig) -> Self {
        Self {
            provider: Rc::new(provider),
            clock,
            config,
            state: Rc::new(RefCell::new(CacheState::new(config.capacity))),
        }
    }

    /// Resolves the road-following path for `waypoints`.
    ///
    /// Returns `None` when fewer than two valid waypoints remain or the
    /// routing call fails; failures are not cached.
    pub async fn get_route(
        &self,
        waypoints: &[Coordinate],
        profile: TravelProfile,
    ) -> Option<Rc<TrailRoute>> {
        let valid = straight_line(waypoints);
        if valid.len() < 2 {
            log::debug!(
                "Route lookup skipped: {} valid waypoint(s) of {}",
                valid.len(),
                waypoints.len()
            );
            return None;
        }

        let key = RouteKey::new(&valid, profile, self.config.precision);
        let now = self.clock.now();

        // Lookup, expiry and in-flight registration form one critical section.
        let request = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;

            let cached = state
                .entries
                .get(&key)
                .map(|entry| (entry.is_expired(now), Rc::clone(&entry.value)));
            match cached {
                Some((false, route)) => {
                    state.stats.hits += 1;
                    log::debug!("Route cache hit {:016x}", key.0);
                    return Some(route);
                }
                Some((true, _)) => {
                    state.entries.pop(&key);
                    log::debug!("Route cache entry {:016x} expired", key.0);
                }
                None => {}
            }

            match state.in_flight.get(&key) {
                Some(pending) => {
                    state.stats.coalesced += 1;
                    log::debug!("Route request {:016x} joined in-flight lookup", key.0);
                    pending.clone()
                }
                None => {
                    state.stats.misses += 1;
                    log::debug!("Route cache miss {:016x}, requesting", key.0);
                    let request = Self::load(
                        Rc::clone(&self.provider),
                        self.clock.clone(),
                        Rc::clone(&self.state),
                        self.config,
                        key,
                        valid,
                        profile,
                    )
                    .boxed_local()
                    .shared();
                    state.in_flight.insert(key, request.clone());
                    request
                }
            }
        };

        request.await
    }

    async fn load(
        provider: Rc<P>,
        clock: C,
        state: Rc<RefCell<CacheState>>,
        config: RouteCacheConfig,
        key: RouteKey,
        waypoints: Vec<Coordinate>,
        profile: TravelProfile,
    ) -> Option<Rc<TrailRoute>> {
        let result = provider.route(&waypoints, profile).await;

        let mut state = state.borrow_mut();
        state.in_flight.remove(&key);

        match result {
            Ok(response) if response.path.len() >= 2 => {
                let now = clock.now();
                let route = Rc::new(TrailRoute {
                    waypoints,
                    profile,
                    path: response.path,
                    cache_key: key,
                    fetched_at: now,
                    distance_m: response.distance_m,
                    duration_s: response.duration_s,
                    unrouted_legs: response.unrouted_legs,
                });
                state.insert(Rc::clone(&route), now, &config);
                log::debug!(
                    "Cached route {:016x} ({} points, {} entries)",
                    key.0,
                    route.path.len(),
                    state.entries.len()
                );
                Some(route)
            }
            Ok(response) => {
                log::warn!(
                    "Routing returned a {}-point path for {} waypoints",
                    response.path.len(),
                    waypoints.len()
                );
                None
            }
            Err(e) => {
                log::warn!(
                    "Routing failed for {} waypoints ({}): {}",
                    waypoints.len(),
                    profile,
                    e
                );
                None
            }
        }
    }

    /// Resolves a drawable trail, falling back to straight segments.
    pub async fn resolve_trail(
        &self,
        waypoints: &[Coordinate],
        profile: TravelProfile,
    ) -> ResolvedTrail {
        match self.get_route(waypoints, profile).await {
            Some(route) => ResolvedTrail {
                distance_m: route.distance_m.unwrap_or_else(|| path_length(&route.path)),
                duration_s: route.duration_s,
                path: route.path.clone(),
                routed: route.unrouted_legs == 0,
                unrouted_legs: route.unrouted_legs,
            },
            None => {
                let path = straight_line(waypoints);
                ResolvedTrail {
                    distance_m: path_length(&path),
                    duration_s: None,
                    path,
                    routed: false,
                    unrouted_legs: 0,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.borrow().in_flight.len()
    }

    pub fn stats(&self) -> RouteCacheStats {
        self.state.borrow().stats
    }

    /// Drops every cached entry. In-flight requests still complete and cache.
    pub fn clear(&self) {
        self.state.borrow_mut().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRouteProvider, ManualClock};
    use futures_util::{join, poll};

    type TestCache = RouteCache<Rc<FakeRouteProvider>, Rc<ManualClock>>;

    fn setup(config: RouteCacheConfig) -> (TestCache, Rc<FakeRouteProvider>, Rc<ManualClock>) {
        let provider = Rc::new(FakeRouteProvider::new());
        let clock = Rc::new(ManualClock::new(1_000_000));
        let cache = RouteCache::new(Rc::clone(&provider), Rc::clone(&clock), config);
        (cache, provider, clock)
    }

    fn walk(cache: &TestCache, waypoints: &[Coordinate]) -> Option<Rc<TrailRoute>> {
        pollster::block_on(cache.get_route(waypoints, TravelProfile::Walking))
    }

    fn trail() -> Vec<Coordinate> {
        vec![
            Coordinate::new(123.8854, 10.3157),
            Coordinate::new(123.9018, 10.2934),
            Coordinate::new(123.9050, 10.2950),
        ]
    }

    #[test]
    fn test_hit_within_ttl_then_refetch_after_expiry() {
        let (cache, provider, clock) = setup(RouteCacheConfig::default());

        let first = walk(&cache, &trail()).unwrap();
        clock.advance(299_999);
        let second = walk(&cache, &trail()).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(provider.call_count(), 1);

        clock.advance(1);
        let third = walk(&cache, &trail()).unwrap();
        assert!(!Rc::ptr_eq(&first, &third));
        assert_eq!(provider.call_count(), 2);
        assert_eq!(third.fetched_at, clock.now());
    }

    #[test]
    fn test_concurrent_requests_share_one_call() {
        let (cache, provider, _clock) = setup(RouteCacheConfig::default());
        let reply = provider.defer();
        let waypoints = trail();

        pollster::block_on(async {
            let mut a = Box::pin(cache.get_route(&waypoints, TravelProfile::Walking));
            let mut b = Box::pin(cache.get_route(&waypoints, TravelProfile::Walking));
            assert!(poll!(a.as_mut()).is_pending());
            assert!(poll!(b.as_mut()).is_pending());
            assert_eq!(cache.in_flight_count(), 1);
            assert!(cache.is_empty());

            reply
                .send(Ok(FakeRouteProvider::response_for(&waypoints)))
                .unwrap();
            let (a, b) = join!(a, b);
            assert!(Rc::ptr_eq(a.as_ref().unwrap(), b.as_ref().unwrap()));
        });

        assert_eq!(provider.call_count(), 1);
        assert_eq!(cache.in_flight_count(), 0);
        assert_eq!(cache.len(), 1);
        let stats = cache.stats();
        assert_eq!((stats.misses, stats.coalesced), (1, 1));
    }

    #[test]
    fn test_fewer_than_two_valid_waypoints_short_circuits() {
        let (cache, provider, _clock) = setup(RouteCacheConfig::default());

        assert!(walk(&cache, &[]).is_none());
        let one = [Coordinate::new(123.9, 10.3)];
        assert!(walk(&cache, &one).is_none());
        let with_nan = [Coordinate::new(123.9, 10.3), Coordinate::new(f64::NAN, 10.3)];
        assert!(walk(&cache, &with_nan).is_none());

        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_invalid_waypoints_are_dropped_before_routing() {
        let (cache, provider, _clock) = setup(RouteCacheConfig::default());
        let mut waypoints = trail();
        waypoints.insert(1, Coordinate::new(f64::NAN, f64::NAN));

        let route = walk(&cache, &waypoints).unwrap();
        assert_eq!(route.waypoints, trail());
        assert_eq!(provider.last_waypoints(), Some(trail()));
    }

    #[test]
    fn test_failure_returns_none_and_is_not_cached() {
        let (cache, provider, _clock) = setup(RouteCacheConfig::default());
        provider.push_result(Err(FetchError::Status {
            status: 422,
            message: "NoRoute".into(),
        }));

        assert!(walk(&cache, &trail()).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.in_flight_count(), 0);

        assert!(walk(&cache, &trail()).is_some());
        assert_eq!(provider.call_count(), 2);
    }

    #[test]
    fn test_failed_route_falls_back_to_straight_line() {
        let (cache, provider, _clock) = setup(RouteCacheConfig::default());
        provider.push_result(Err(FetchError::Network("offline".into())));
        let waypoints = [Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0)];

        let resolved = pollster::block_on(cache.resolve_trail(&waypoints, TravelProfile::Walking));
        assert!(!resolved.routed);
        assert_eq!(resolved.path, waypoints.to_vec());
        assert!(resolved.distance_m > 150_000.0);
    }

    #[test]
    fn test_resolved_trail_uses_provider_metrics() {
        let (cache, _provider, _clock) = setup(RouteCacheConfig::default());
        let resolved = pollster::block_on(cache.resolve_trail(&trail(), TravelProfile::Walking));
        assert!(resolved.routed);
        assert_eq!(resolved.distance_m, FakeRouteProvider::DISTANCE_M);
        assert_eq!(resolved.duration_s, Some(FakeRouteProvider::DURATION_S));
    }

    #[test]
    fn test_partly_straight_route_is_not_fully_routed() {
        let (cache, provider, _clock) = setup(RouteCacheConfig::default());
        provider.push_result(Ok(RouteResponse {
            unrouted_legs: 1,
            ..FakeRouteProvider::response_for(&trail())
        }));

        let resolved = pollster::block_on(cache.resolve_trail(&trail(), TravelProfile::Walking));
        assert!(!resolved.routed);
        assert_eq!(resolved.unrouted_legs, 1);
        assert_eq!(resolved.distance_m, FakeRouteProvider::DISTANCE_M);
    }

    #[test]
    fn test_expired_entries_are_dropped_before_evicting() {
        let config = RouteCacheConfig {
            capacity: 2,
            ..RouteCacheConfig::default()
        };
        let (cache, _provider, clock) = setup(config);
        let a = [Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.1)];
        let b = [Coordinate::new(1.0, 0.0), Coordinate::new(1.0, 0.1)];

        walk(&cache, &a);
        clock.advance(config.ttl_ms);
        walk(&cache, &b);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_profile_is_part_of_the_key() {
        let (cache, provider, _clock) = setup(RouteCacheConfig::default());
        walk(&cache, &trail());
        pollster::block_on(cache.get_route(&trail(), TravelProfile::Cycling));
        assert_eq!(provider.call_count(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let config = RouteCacheConfig {
            capacity: 2,
            ..RouteCacheConfig::default()
        };
        let (cache, provider, _clock) = setup(config);
        let a = [Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.1)];
        let b = [Coordinate::new(1.0, 0.0), Coordinate::new(1.0, 0.1)];
        let c = [Coordinate::new(2.0, 0.0), Coordinate::new(2.0, 0.1)];

        pollster::block_on(async {
            cache.get_route(&a, TravelProfile::Walking).await;
            cache.get_route(&b, TravelProfile::Walking).await;
            // Touch `a` so `b` becomes least recently used.
            cache.get_route(&a, TravelProfile::Walking).await;
            cache.get_route(&c, TravelProfile::Walking).await;
        });
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(provider.call_count(), 3);

        walk(&cache, &a);
        assert_eq!(provider.call_count(), 3);
        walk(&cache, &b);
        assert_eq!(provider.call_count(), 4);
    }

    #[test]
    fn test_key_rounding() {
        let a = [Coordinate::new(123.123_456_71, 10.0), Coordinate::new(1.0, -0.0)];
        let b = [Coordinate::new(123.123_456_74, 10.0), Coordinate::new(1.0, 0.0)];
        assert_eq!(
            RouteKey::new(&a, TravelProfile::Walking, 6),
            RouteKey::new(&b, TravelProfile::Walking, 6)
        );
        assert_ne!(
            RouteKey::new(&a, TravelProfile::Walking, 6),
            RouteKey::new(&a, TravelProfile::Driving, 6)
        );
        let reversed: Vec<Coordinate> = a.iter().rev().copied().collect();
        assert_ne!(
            RouteKey::new(&a, TravelProfile::Walking, 6),
            RouteKey::new(&reversed, TravelProfile::Walking, 6)
        );
    }
}
