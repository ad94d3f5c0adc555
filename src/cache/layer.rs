//! Collection layer: whole-collection JSON blobs on top of a key-value store.

use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::traits::{CacheResult, Cacheable, KeyValueStore};

/// Outcome of a cleanup pass over one cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanOutcome {
  /// Nothing stored under the key
  Missing,
  /// Every entry passed the validator; cache untouched
  Clean,
  /// Invalid entries were dropped and the collection rewritten
  Pruned { dropped: usize },
  /// The stored value was not a JSON array and was removed
  Removed,
}

/// Loads and stores entity collections, one JSON array per cache key.
///
/// Every write serializes the whole collection; there is no diffing.
pub struct CollectionCache<S: KeyValueStore + ?Sized> {
  storage: Arc<S>,
}

impl<S: KeyValueStore + ?Sized> CollectionCache<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  /// The underlying key-value store.
  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  /// Load the collection for `T`, seeding it with `T::seed()` when nothing
  /// valid is cached.
  pub fn load<T: Cacheable>(&self) -> Result<CacheResult<Vec<T>>> {
    self.load_with(T::storage_key(), T::has_basic_shape, T::seed)
  }

  /// Load with validation and seed fallback.
  ///
  /// 1. Parse the cached blob; a missing or malformed blob counts as absent
  /// 2. Drop entries failing `validator` or failing to deserialize, rewriting
  ///    the cache if anything was dropped
  /// 3. If nothing valid remains, store and return `seed()`
  pub fn load_with<T, V, F>(&self, key: &str, validator: V, seed: F) -> Result<CacheResult<Vec<T>>>
  where
    T: Serialize + serde::de::DeserializeOwned,
    V: Fn(&Value) -> bool,
    F: FnOnce() -> Vec<T>,
  {
    match self.read_valid(key, &validator)? {
      Some(items) if !items.is_empty() => {
        tracing::debug!(key, count = items.len(), "collection loaded from cache");
        Ok(CacheResult::from_cache(items))
      }
      _ => {
        let items = seed();
        tracing::info!(key, count = items.len(), "no cached data, seeding mock dataset");
        self.write(key, &items)?;
        Ok(CacheResult::seeded(items))
      }
    }
  }

  /// Replace the cached collection for `T`.
  pub fn save<T: Cacheable>(&self, items: &[T]) -> Result<()> {
    self.write(T::storage_key(), items)
  }

  /// Filter the raw cached collection under `key` with `validator`.
  pub fn clean_with<V>(&self, key: &str, validator: V) -> Result<CleanOutcome>
  where
    V: Fn(&Value) -> bool,
  {
    let Some(blob) = self.storage.get(key)? else {
      return Ok(CleanOutcome::Missing);
    };

    let entries = match serde_json::from_str::<Value>(&blob) {
      Ok(Value::Array(entries)) => entries,
      _ => {
        tracing::warn!(key, "cached value is not a JSON array, removing it");
        self.storage.remove(key)?;
        return Ok(CleanOutcome::Removed);
      }
    };

    let total = entries.len();
    let valid: Vec<Value> = entries.into_iter().filter(|v| validator(v)).collect();
    if valid.len() == total {
      return Ok(CleanOutcome::Clean);
    }

    let dropped = total - valid.len();
    tracing::warn!(key, dropped, "dropped invalid cached entries");
    self.write(key, &valid)?;
    Ok(CleanOutcome::Pruned { dropped })
  }

  fn read_valid<T, V>(&self, key: &str, validator: &V) -> Result<Option<Vec<T>>>
  where
    T: serde::de::DeserializeOwned,
    V: Fn(&Value) -> bool,
  {
    let Some(blob) = self.storage.get(key)? else {
      return Ok(None);
    };

    let entries = match serde_json::from_str::<Value>(&blob) {
      Ok(Value::Array(entries)) => entries,
      Ok(_) => {
        tracing::warn!(key, "cached value is not a JSON array");
        return Ok(None);
      }
      Err(e) => {
        tracing::warn!(key, error = %e, "failed to parse cached collection");
        return Ok(None);
      }
    };

    let total = entries.len();
    let mut kept = Vec::with_capacity(total);
    let mut items = Vec::with_capacity(total);
    for entry in entries {
      if !validator(&entry) {
        continue;
      }
      if let Ok(item) = serde_json::from_value::<T>(entry.clone()) {
        kept.push(entry);
        items.push(item);
      }
    }

    if kept.len() != total {
      tracing::warn!(key, dropped = total - kept.len(), "filtered invalid cached entries");
      self.write(key, &kept)?;
    }

    Ok(Some(items))
  }

  fn write<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
    let blob =
      serde_json::to_string(items).map_err(|e| eyre!("Failed to serialize {}: {}", key, e))?;
    tracing::debug!(key, count = items.len(), "writing collection to cache");
    self.storage.set(key, &blob)
  }
}

impl<S: KeyValueStore + ?Sized> Clone for CollectionCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, MemoryStorage};
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Tag {
    id: u32,
    name: String,
  }

  fn has_id(value: &Value) -> bool {
    value.get("id").is_some()
  }

  fn seed() -> Vec<Tag> {
    vec![Tag {
      id: 1,
      name: "seed".to_string(),
    }]
  }

  fn setup() -> (Arc<MemoryStorage>, CollectionCache<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let cache = CollectionCache::new(Arc::clone(&storage));
    (storage, cache)
  }

  #[test]
  fn test_load_seeds_empty_cache() {
    let (storage, cache) = setup();

    let result = cache.load_with("tags", has_id, seed).unwrap();
    assert_eq!(result.source, CacheSource::Seed);
    assert_eq!(result.data, seed());

    let blob = storage.get("tags").unwrap().unwrap();
    let stored: Vec<Tag> = serde_json::from_str(&blob).unwrap();
    assert_eq!(stored, seed());
  }

  #[test]
  fn test_load_treats_malformed_blob_as_absent() {
    let (storage, cache) = setup();
    storage.set("tags", "{not json").unwrap();

    let result = cache.load_with("tags", has_id, seed).unwrap();
    assert_eq!(result.source, CacheSource::Seed);
    assert_eq!(result.data, seed());
  }

  #[test]
  fn test_load_drops_invalid_entries_and_rewrites() {
    let (storage, cache) = setup();
    let blob = json!([
      {"id": 7, "name": "kept"},
      {"name": "no id"},
      {"id": "wrong type", "name": "bad"},
      42
    ]);
    storage.set("tags", &blob.to_string()).unwrap();

    let result = cache.load_with("tags", has_id, seed).unwrap();
    assert_eq!(result.source, CacheSource::Cache);
    assert_eq!(
      result.data,
      vec![Tag {
        id: 7,
        name: "kept".to_string()
      }]
    );

    let rewritten: Value = serde_json::from_str(&storage.get("tags").unwrap().unwrap()).unwrap();
    assert_eq!(rewritten, json!([{"id": 7, "name": "kept"}]));
  }

  #[test]
  fn test_load_seeds_when_every_entry_is_invalid() {
    let (_storage, cache) = setup();
    cache
      .storage()
      .set("tags", &json!([{"name": "x"}]).to_string())
      .unwrap();

    let result = cache.load_with("tags", has_id, seed).unwrap();
    assert_eq!(result.source, CacheSource::Seed);
  }

  #[test]
  fn test_clean_with_outcomes() {
    let (storage, cache) = setup();
    assert_eq!(cache.clean_with("tags", has_id).unwrap(), CleanOutcome::Missing);

    storage.set("tags", &json!([{"id": 1}]).to_string()).unwrap();
    assert_eq!(cache.clean_with("tags", has_id).unwrap(), CleanOutcome::Clean);

    storage
      .set("tags", &json!([{"id": 1}, {"x": 2}, {"y": 3}]).to_string())
      .unwrap();
    assert_eq!(
      cache.clean_with("tags", has_id).unwrap(),
      CleanOutcome::Pruned { dropped: 2 }
    );
    assert_eq!(
      storage.get("tags").unwrap().unwrap(),
      json!([{"id": 1}]).to_string()
    );

    storage.set("tags", "\"text\"").unwrap();
    assert_eq!(cache.clean_with("tags", has_id).unwrap(), CleanOutcome::Removed);
    assert_eq!(storage.get("tags").unwrap(), None);
  }
}
