use super::Place;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cached answer for one geocoding query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key the entry was stored under
    pub query: String,
    /// Upstream answer; `None` when the service had no match
    pub place: Option<Place>,
    /// Unix timestamp when the answer was fetched
    pub cached_at: i64,
}

impl CacheEntry {
    fn age(&self) -> Duration {
        let now = chrono::Utc::now().timestamp();
        Duration::from_secs(now.saturating_sub(self.cached_at).max(0) as u64)
    }
}

/// Geocoding cache keyed by query, optionally persisted as JSON
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: HashMap<String, CacheEntry>,
    /// Entries older than this are treated as misses
    max_age: Option<Duration>,
    /// Where `save` writes to; `None` keeps the cache in memory only
    path: Option<PathBuf>,
}

impl GeocodeCache {
    /// In-memory cache that lives for the process only
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache that `save` writes to `path`
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            ..Self::default()
        }
    }

    /// Load the cache file, or start empty if it doesn't exist yet
    pub fn load(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let data = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read cache file {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("Failed to parse cache file {}", path.display()))?
        } else {
            HashMap::new()
        };

        log::debug!("Loaded {} geocoding cache entries", entries.len());

        Ok(Self {
            entries,
            max_age: None,
            path: Some(path),
        })
    }

    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the cache to its file; a no-op for in-memory caches
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write cache file {}", path.display()))?;
        log::debug!(
            "Saved {} geocoding cache entries to {}",
            self.entries.len(),
            path.display()
        );
        Ok(())
    }

    /// Fresh entry for the key, if any
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key).filter(|entry| match self.max_age {
            Some(max_age) => entry.age() <= max_age,
            None => true,
        })
    }

    pub fn insert(&mut self, key: &str, place: Option<Place>) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                query: key.to_string(),
                place,
                cached_at: chrono::Utc::now().timestamp(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries past the maximum age
    pub fn purge_expired(&mut self) -> usize {
        let Some(max_age) = self.max_age else {
            return 0;
        };
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.age() <= max_age);
        before - self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let found = self
            .entries
            .values()
            .filter(|entry| entry.place.is_some())
            .count();
        CacheStats {
            total_entries: self.entries.len(),
            found,
            not_found: self.entries.len() - found,
        }
    }
}

/// Cache statistics
#[derive(Debug, PartialEq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub found: usize,
    pub not_found: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Coordinate;
    use tempfile::TempDir;

    fn place(name: &str) -> Place {
        Place {
            display_name: name.to_string(),
            coordinate: Coordinate::new(47.6062, -122.3321).unwrap(),
        }
    }

    #[test]
    fn test_cache_roundtrip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache_path = temp_dir.path().join("nested").join("geo_cache.json");

        let mut cache = GeocodeCache::load(cache_path.clone())?;
        assert!(cache.is_empty());

        cache.insert("47.6062,-122.3321", Some(place("Seattle")));
        cache.insert("Atlantis", None);
        cache.save()?;

        let loaded = GeocodeCache::load(cache_path)?;
        assert_eq!(loaded.len(), 2);

        let entry = loaded.get("47.6062,-122.3321").unwrap();
        assert_eq!(entry.query, "47.6062,-122.3321");
        assert_eq!(entry.place, Some(place("Seattle")));
        assert_eq!(loaded.get("Atlantis").unwrap().place, None);

        Ok(())
    }

    #[test]
    fn test_in_memory_save_is_noop() -> Result<()> {
        let mut cache = GeocodeCache::new();
        cache.insert("key", None);
        cache.save()?;
        assert!(cache.path().is_none());
        Ok(())
    }

    #[test]
    fn test_corrupt_file_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache_path = temp_dir.path().join("geo_cache.json");
        fs::write(&cache_path, "{not json")?;

        assert!(GeocodeCache::load(cache_path).is_err());
        Ok(())
    }

    #[test]
    fn test_max_age_expires_entries() {
        let mut cache = GeocodeCache::new().with_max_age(Some(Duration::from_secs(3600)));
        cache.insert("fresh", Some(place("Fresh")));
        cache.entries.insert(
            "stale".to_string(),
            CacheEntry {
                query: "stale".to_string(),
                place: Some(place("Stale")),
                cached_at: chrono::Utc::now().timestamp() - 7200,
            },
        );

        assert!(cache.get("fresh").is_some());
        assert!(cache.get("stale").is_none());

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats() {
        let mut cache = GeocodeCache::new();
        cache.insert("a", Some(place("A")));
        cache.insert("b", Some(place("B")));
        cache.insert("c", None);

        assert_eq!(
            cache.stats(),
            CacheStats {
                total_entries: 3,
                found: 2,
                not_found: 1,
            }
        );
    }
}
