//! Geocoding client with caching and rate limiting
//!
//! [`GeocodingClient`] sits in front of a [`Geocoder`] backend (Nominatim in
//! production). Identical queries are answered from the cache; everything else
//! goes out at most once per minimum interval.

use crate::coordinate::Coordinate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

mod cache;
mod nominatim;
mod rate_limit;

pub use cache::{CacheEntry, CacheStats, GeocodeCache};
pub use nominatim::{NominatimConfig, NominatimGeocoder, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use rate_limit::{RateLimiter, MIN_REQUEST_INTERVAL};

/// Decimal places used to key point lookups (~11 m)
pub const POINT_KEY_DECIMALS: u32 = 4;

/// How often batch lookups report progress
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        GeocodeError::Network(e.to_string())
    }
}

/// What to look up
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Forward lookup of free text
    Address(String),
    /// Reverse lookup of a position
    Point(Coordinate),
}

impl Query {
    /// Key the answer is cached under
    pub fn cache_key(&self) -> String {
        match self {
            Query::Address(address) => address.trim().to_string(),
            Query::Point(c) => format!(
                "{:.prec$},{:.prec$}",
                c.latitude(),
                c.longitude(),
                prec = POINT_KEY_DECIMALS as usize
            ),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Address(address) => write!(f, "{:?}", address.trim()),
            Query::Point(c) => write!(f, "{}", c),
        }
    }
}

/// A resolved location: its name and position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub display_name: String,
    pub coordinate: Coordinate,
}

/// Backend that answers a single query with a single outbound request
///
/// `Ok(None)` means the service answered but had no match.
pub trait Geocoder {
    fn geocode(&self, query: &Query) -> Result<Option<Place>, GeocodeError>;
}

/// Results of a batch lookup, keyed by [`Query::cache_key`]
pub type LookupResults = HashMap<String, Result<Place, GeocodeError>>;

/// Counters for one client's lifetime
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ClientStats {
    pub cache_hits: usize,
    pub outbound_calls: usize,
    pub failures: usize,
}

pub struct GeocodingClient<G> {
    backend: G,
    cache: GeocodeCache,
    limiter: RateLimiter,
    stats: ClientStats,
}

impl<G: Geocoder> GeocodingClient<G> {
    pub fn new(backend: G, cache: GeocodeCache, min_interval: Duration) -> Self {
        Self {
            backend,
            cache,
            limiter: RateLimiter::new(min_interval),
            stats: ClientStats::default(),
        }
    }

    /// Look up one query, from the cache when possible
    ///
    /// Misses wait for the rate limiter, then hit the backend once. Matches
    /// and "no match" answers are cached; network errors are not, and nothing
    /// is retried.
    pub fn lookup(&mut self, query: &Query) -> Result<Place, GeocodeError> {
        let key = query.cache_key();

        if let Some(entry) = self.cache.get(&key) {
            log::debug!("Geocode cache hit for {}", key);
            self.stats.cache_hits += 1;
            return entry
                .place
                .clone()
                .ok_or(GeocodeError::NotFound(key));
        }

        self.limiter.wait();
        self.limiter.mark();
        self.stats.outbound_calls += 1;

        match self.backend.geocode(query) {
            Ok(Some(place)) => {
                self.cache.insert(&key, Some(place.clone()));
                Ok(place)
            }
            Ok(None) => {
                self.cache.insert(&key, None);
                Err(GeocodeError::NotFound(key))
            }
            Err(e) => {
                log::warn!("Geocoding {} failed: {}", query, e);
                self.stats.failures += 1;
                Err(e)
            }
        }
    }

    /// Look up many queries, one at a time, logging progress
    ///
    /// Queries sharing a cache key are looked up once.
    pub fn lookup_batch(&mut self, queries: &[Query]) -> LookupResults {
        let mut results = LookupResults::new();
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for query in queries {
            let key = query.cache_key();
            if seen.insert(key.clone()) {
                unique.push((key, query));
            }
        }

        let pending = unique
            .iter()
            .filter(|(key, _)| self.cache.get(key).is_none())
            .count();
        if pending > 0 {
            log::info!(
                "Geocoding {} coordinates (~{} seconds)...",
                pending,
                (self.limiter.min_interval() * pending as u32).as_secs()
            );
        }

        let start = Instant::now();
        let mut last_update = Instant::now();
        let mut processed = 0;

        for (key, query) in unique {
            let cached = self.cache.get(&key).is_some();
            let result = self.lookup(query);
            results.insert(key, result);

            if cached {
                continue;
            }
            processed += 1;

            if last_update.elapsed() >= PROGRESS_INTERVAL && processed < pending {
                let remaining = self.limiter.min_interval() * (pending - processed) as u32;
                log::info!(
                    "Processed {}/{} [{:.0}s elapsed, ~{}s remaining]",
                    processed,
                    pending,
                    start.elapsed().as_secs_f64(),
                    remaining.as_secs()
                );
                last_update = Instant::now();
            }
        }

        if pending > 0 {
            log::info!(
                "Geocoding completed in {:.1} seconds",
                start.elapsed().as_secs_f64()
            );
        }

        results
    }

    pub fn stats(&self) -> ClientStats {
        self.stats
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub fn backend(&self) -> &G {
        &self.backend
    }

    /// Persist the cache (if it has a file)
    pub fn save_cache(&self) -> anyhow::Result<()> {
        self.cache.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Fake backend that records every outbound call
    #[derive(Default)]
    struct RecordingGeocoder {
        calls: RefCell<Vec<(Query, Instant)>>,
        fail_network: bool,
    }

    impl RecordingGeocoder {
        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl Geocoder for RecordingGeocoder {
        fn geocode(&self, query: &Query) -> Result<Option<Place>, GeocodeError> {
            self.calls.borrow_mut().push((query.clone(), Instant::now()));

            if self.fail_network {
                return Err(GeocodeError::Network("connection refused".to_string()));
            }

            match query {
                Query::Address(a) if a.contains("Atlantis") => Ok(None),
                Query::Address(a) => Ok(Some(Place {
                    display_name: a.clone(),
                    coordinate: Coordinate::new(1.0, 2.0).unwrap(),
                })),
                Query::Point(c) if c.latitude() < -80.0 => Ok(None),
                Query::Point(c) => Ok(Some(Place {
                    display_name: format!("Somewhere near {}", c),
                    coordinate: *c,
                })),
            }
        }
    }

    fn client(backend: RecordingGeocoder, interval: Duration) -> GeocodingClient<RecordingGeocoder> {
        GeocodingClient::new(backend, GeocodeCache::new(), interval)
    }

    fn point(lat: f64, lon: f64) -> Query {
        Query::Point(Coordinate::new(lat, lon).unwrap())
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(point(47.60621, -122.33207).cache_key(), "47.6062,-122.3321");
        assert_eq!(point(1.0, 2.0).cache_key(), "1.0000,2.0000");
        assert_eq!(
            Query::Address("  Seattle, WA ".to_string()).cache_key(),
            "Seattle, WA"
        );
    }

    #[test]
    fn test_repeated_query_makes_one_call() {
        let mut client = client(RecordingGeocoder::default(), Duration::ZERO);
        let query = Query::Address("Seattle".to_string());

        let first = client.lookup(&query).unwrap();
        let second = client.lookup(&query).unwrap();

        assert_eq!(first, second);
        assert_eq!(client.backend().call_count(), 1);
        assert_eq!(
            client.stats(),
            ClientStats {
                cache_hits: 1,
                outbound_calls: 1,
                failures: 0,
            }
        );
    }

    #[test]
    fn test_nearby_points_share_cache_entry() {
        let mut client = client(RecordingGeocoder::default(), Duration::ZERO);

        client.lookup(&point(47.60621, -122.33207)).unwrap();
        client.lookup(&point(47.60619, -122.33213)).unwrap();

        assert_eq!(client.backend().call_count(), 1);
    }

    #[test]
    fn test_not_found_is_cached() {
        let mut client = client(RecordingGeocoder::default(), Duration::ZERO);
        let query = Query::Address("Atlantis".to_string());

        assert_eq!(
            client.lookup(&query),
            Err(GeocodeError::NotFound("Atlantis".to_string()))
        );
        assert_eq!(
            client.lookup(&query),
            Err(GeocodeError::NotFound("Atlantis".to_string()))
        );
        assert_eq!(client.backend().call_count(), 1);
    }

    #[test]
    fn test_network_error_is_reported_not_cached() {
        let backend = RecordingGeocoder {
            fail_network: true,
            ..Default::default()
        };
        let mut client = client(backend, Duration::ZERO);
        let query = point(10.0, 10.0);

        assert!(matches!(client.lookup(&query), Err(GeocodeError::Network(_))));
        // Single attempt per lookup, nothing cached
        assert_eq!(client.backend().call_count(), 1);
        assert!(client.cache().is_empty());
        assert_eq!(client.stats().failures, 1);

        assert!(client.lookup(&query).is_err());
        assert_eq!(client.backend().call_count(), 2);
    }

    #[test]
    fn test_distinct_calls_are_one_second_apart() {
        let mut client = client(RecordingGeocoder::default(), MIN_REQUEST_INTERVAL);

        client.lookup(&point(10.0, 10.0)).unwrap();
        client.lookup(&point(20.0, 20.0)).unwrap();

        let calls = client.backend().calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].1.duration_since(calls[0].1) >= Duration::from_secs(1));
    }

    #[test]
    fn test_cache_hit_skips_rate_limit() {
        let mut client = client(RecordingGeocoder::default(), Duration::from_secs(30));
        let query = point(10.0, 10.0);

        client.lookup(&query).unwrap();
        let start = Instant::now();
        client.lookup(&query).unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_lookup_batch_deduplicates() {
        let mut client = client(RecordingGeocoder::default(), Duration::from_millis(10));
        let queries = vec![
            point(10.0, 10.0),
            point(-85.0, 0.0),
            point(10.00001, 10.00001),
            point(20.0, 20.0),
            point(10.0, 10.0),
        ];

        let results = client.lookup_batch(&queries);

        assert_eq!(results.len(), 3);
        assert_eq!(client.backend().call_count(), 3);
        assert!(results["10.0000,10.0000"].is_ok());
        assert!(results["20.0000,20.0000"].is_ok());
        assert!(matches!(
            results["-85.0000,0.0000"],
            Err(GeocodeError::NotFound(_))
        ));

        // Second batch is served entirely from the cache
        let again = client.lookup_batch(&queries);
        assert_eq!(again.len(), 3);
        assert_eq!(client.backend().call_count(), 3);
    }

    #[test]
    fn test_lookup_batch_keeps_first_seen_order() {
        let mut client = client(RecordingGeocoder::default(), Duration::ZERO);
        let queries: Vec<Query> = (0..2_000)
            .map(|i| point(f64::from(i % 20), 0.0))
            .collect();

        let results = client.lookup_batch(&queries);

        assert_eq!(results.len(), 20);
        let called: Vec<Query> = client
            .backend()
            .calls
            .borrow()
            .iter()
            .map(|(query, _)| query.clone())
            .collect();
        assert_eq!(called, queries[..20].to_vec());
    }
}
