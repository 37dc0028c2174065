use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

mod conversion;
mod coordinate;
mod geocoding;
mod map;
mod projection;
mod store;

// Re-export public types
pub use conversion::{convert, write_report, AddressStatus, ConversionRecord};
pub use coordinate::{Coordinate, CoordinateError};
pub use geocoding::{
    CacheEntry, CacheStats, ClientStats, GeocodeCache, GeocodeError, Geocoder, GeocodingClient,
    LookupResults, NominatimConfig, NominatimGeocoder, Place, Query, RateLimiter,
    DEFAULT_BASE_URL, DEFAULT_TIMEOUT, MIN_REQUEST_INTERVAL,
};
pub use map::{render_map, write_map};
pub use projection::{Mercator, ProjectedPoint, ProjectionError, EARTH_RADIUS_M, MIN_RADIUS_M};
pub use store::{CoordinateStore, LoadedCoordinates};

/// Configuration options for the conversion engine
#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Append-only store of input coordinates
    pub coordinates_path: PathBuf,
    /// Converted-coordinates CSV, rewritten on every run
    pub report_path: PathBuf,
    /// Generated HTML map
    pub map_path: PathBuf,
    /// Geocoding cache file (None keeps the cache in memory for this run only)
    pub cache_path: Option<PathBuf>,
    /// Cached answers older than this are fetched again (None = never expire)
    pub cache_max_age: Option<Duration>,
    /// Geocoding service settings
    pub nominatim: NominatimConfig,
    /// Sphere radius for the Mercator projection (at least [`MIN_RADIUS_M`])
    pub earth_radius: f64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            coordinates_path: PathBuf::from("coordinates.csv"),
            report_path: PathBuf::from("converted_coordinates.csv"),
            map_path: PathBuf::from("geo_map.html"),
            cache_path: Some(PathBuf::from("geo_cache.json")),
            cache_max_age: None,
            nominatim: NominatimConfig::default(),
            earth_radius: EARTH_RADIUS_M,
        }
    }
}

/// Files produced by [`GeoEngine::write_outputs`]
#[derive(Debug, Clone)]
pub struct OutputFiles {
    pub report: PathBuf,
    pub map: PathBuf,
}

/// Ties the store, projection, geocoding and output stages together
pub struct GeoEngine {
    config: GeoConfig,
    store: CoordinateStore,
    mercator: Mercator,
}

impl GeoEngine {
    pub fn new(config: GeoConfig) -> Result<Self> {
        let store = CoordinateStore::new(config.coordinates_path.clone());
        let mercator =
            Mercator::with_radius(config.earth_radius).context("Invalid projection settings")?;
        Ok(Self {
            config,
            store,
            mercator,
        })
    }

    pub fn config(&self) -> &GeoConfig {
        &self.config
    }

    /// Append validated coordinates to the store
    pub fn add_coordinates(&self, coordinates: &[Coordinate]) -> Result<usize> {
        self.store.append(coordinates)
    }

    /// Read all valid coordinates from the store
    pub fn load_coordinates(&self) -> Result<LoadedCoordinates> {
        self.store.load()
    }

    /// Load the geocoding cache
    ///
    /// An unreadable cache file is logged and replaced by an empty cache.
    pub fn open_cache(&self) -> GeocodeCache {
        let cache = match &self.config.cache_path {
            Some(path) => GeocodeCache::load(path.clone()).unwrap_or_else(|e| {
                log::warn!("Cache loading failed: {:#}", e);
                GeocodeCache::with_path(path.clone())
            }),
            None => GeocodeCache::new(),
        };
        let mut cache = cache.with_max_age(self.config.cache_max_age);
        let purged = cache.purge_expired();
        if purged > 0 {
            log::debug!("Dropped {} expired geocoding cache entries", purged);
        }
        cache
    }

    /// Nominatim-backed client using the engine's cache settings
    pub fn geocoding_client(&self) -> Result<GeocodingClient<NominatimGeocoder>> {
        let backend = NominatimGeocoder::new(&self.config.nominatim)?;
        Ok(GeocodingClient::new(
            backend,
            self.open_cache(),
            self.config.nominatim.min_interval,
        ))
    }

    /// Reverse-geocode coordinates, one request per distinct rounded position
    pub fn resolve_addresses<G: Geocoder>(
        &self,
        client: &mut GeocodingClient<G>,
        coordinates: &[Coordinate],
    ) -> LookupResults {
        let queries: Vec<Query> = coordinates.iter().map(|c| Query::Point(*c)).collect();
        client.lookup_batch(&queries)
    }

    /// Forward-geocode free-text addresses into coordinates
    pub fn locate_addresses<G: Geocoder>(
        &self,
        client: &mut GeocodingClient<G>,
        addresses: &[String],
    ) -> Vec<(String, Result<Place, GeocodeError>)> {
        addresses
            .iter()
            .map(|address| {
                let result = client.lookup(&Query::Address(address.clone()));
                (address.clone(), result)
            })
            .collect()
    }

    /// Addresses already in the cache, without any outbound request
    ///
    /// Used when lookup is off so answers from earlier runs still show up.
    /// The cache file is only read.
    pub fn cached_addresses(&self, coordinates: &[Coordinate]) -> LookupResults {
        let cache = self.open_cache();
        coordinates
            .iter()
            .filter_map(|coordinate| {
                let key = Query::Point(*coordinate).cache_key();
                let place = cache.get(&key)?.place.clone();
                let result = place.ok_or_else(|| GeocodeError::NotFound(key.clone()));
                Some((key, result))
            })
            .collect()
    }

    /// Project coordinates and attach lookup results (if any)
    pub fn convert(
        &self,
        coordinates: &[Coordinate],
        addresses: Option<&LookupResults>,
    ) -> Vec<ConversionRecord> {
        convert(&self.mercator, coordinates, addresses)
    }

    /// Write the CSV report and the HTML map
    pub fn write_outputs(&self, records: &[ConversionRecord]) -> Result<OutputFiles> {
        write_report(&self.config.report_path, records)?;
        write_map(&self.config.map_path, records)?;
        Ok(OutputFiles {
            report: self.config.report_path.clone(),
            map: self.config.map_path.clone(),
        })
    }
}
