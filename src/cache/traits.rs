//! Core traits and types for the caching system.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Key-value text storage backing the client cache.
///
/// Values are opaque strings; collections are stored as one JSON blob per key.
pub trait KeyValueStore: Send + Sync {
  /// Read the value stored under `key`.
  fn get(&self, key: &str) -> Result<Option<String>>;

  /// Store `value` under `key`, replacing any previous value.
  fn set(&self, key: &str, value: &str) -> Result<()>;

  /// Remove `key`. Removing a missing key is not an error.
  fn remove(&self, key: &str) -> Result<()>;
}

/// Trait for entities that live in a cached collection.
///
/// Implementors name the cache key of their collection, the basic shape check
/// applied when it is loaded, and the mock dataset used when nothing valid is
/// cached.
pub trait Cacheable: Clone + Serialize + DeserializeOwned {
  /// Cache key holding the serialized collection (e.g. "growdesk-categories")
  fn storage_key() -> &'static str;

  /// Basic shape check for one raw cached entry.
  fn has_basic_shape(value: &Value) -> bool;

  /// Mock dataset seeding an empty cache.
  fn seed() -> Vec<Self>;
}

/// Result from a load operation, including data and where it came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Data freshly received from the API.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Data read back from the cache.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }

  /// Data taken from the mock dataset.
  pub fn seeded(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Seed,
    }
  }

  /// Placeholder data returned because the API could not be used.
  pub fn fallback(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Fallback,
    }
  }
}

/// Indicates where loaded data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data previously written to the cache
  Cache,
  /// Mock dataset, written to the cache on first use
  Seed,
  /// Demo placeholder served instead of a failed network response
  Fallback,
}
