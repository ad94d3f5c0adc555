//! One-time cache cleanup keyed by a remote version descriptor.

use color_eyre::Result;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::api::api_types::CacheDescriptor;
use crate::api::client::ApiClient;
use crate::cache::{
  CleanOutcome, CollectionCache, KeyValueStore, CATEGORIES_KEY, CLEAN_VERSION_KEY, TICKETS_KEY,
  USERS_KEY,
};
use crate::validators::{is_valid_category, is_valid_ticket, is_valid_user};

/// Collections checked by the cleanup pass, with their validators.
const CLEANUP_TARGETS: [(&str, fn(&Value) -> bool); 3] = [
  (USERS_KEY, is_valid_user),
  (TICKETS_KEY, is_valid_ticket),
  (CATEGORIES_KEY, is_valid_category),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
  /// The cleanup already ran for this version
  UpToDate { version: u64 },
  /// The cleanup ran and the marker now records `version`
  Cleaned {
    version: u64,
    dropped: usize,
    removed: usize,
  },
  /// The descriptor could not be fetched; cache left as is
  Unavailable,
}

pub struct CacheMigration<S: KeyValueStore + ?Sized> {
  cache: CollectionCache<S>,
}

impl<S: KeyValueStore + ?Sized> CacheMigration<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      cache: CollectionCache::new(storage),
    }
  }

  /// Fetch the descriptor and apply it. Never fails: a missing descriptor or
  /// a cache error leaves the cache as it is.
  pub async fn run(&self, client: &ApiClient, descriptor_url: &Url) -> MigrationOutcome {
    let descriptor = match client.get_url::<CacheDescriptor>(descriptor_url).await {
      Ok(descriptor) => descriptor,
      Err(e) => {
        tracing::warn!(url = %descriptor_url, error = %e, "cache descriptor unavailable");
        return MigrationOutcome::Unavailable;
      }
    };

    match self.apply(&descriptor) {
      Ok(outcome) => outcome,
      Err(e) => {
        tracing::error!(error = %e, "cache cleanup failed");
        MigrationOutcome::Unavailable
      }
    }
  }

  /// Run the cleanup if `descriptor.version` is newer than the recorded marker.
  pub fn apply(&self, descriptor: &CacheDescriptor) -> Result<MigrationOutcome> {
    let version = descriptor.version;
    if !self.needs_cleanup(version)? {
      tracing::debug!(version, "cache already cleaned for this version");
      return Ok(MigrationOutcome::UpToDate { version });
    }

    tracing::info!(version, id = %descriptor.id, "starting cache cleanup");
    let mut dropped = 0;
    let mut removed = 0;
    for (key, validator) in CLEANUP_TARGETS {
      match self.cache.clean_with(key, validator)? {
        CleanOutcome::Pruned { dropped: n } => dropped += n,
        CleanOutcome::Removed => removed += 1,
        CleanOutcome::Missing | CleanOutcome::Clean => {}
      }
    }

    self
      .cache
      .storage()
      .set(CLEAN_VERSION_KEY, &version.to_string())?;
    tracing::info!(version, dropped, removed, "cache cleanup complete");

    Ok(MigrationOutcome::Cleaned {
      version,
      dropped,
      removed,
    })
  }

  /// True when no marker is recorded, the marker is unreadable, or it is
  /// older than `version`.
  fn needs_cleanup(&self, version: u64) -> Result<bool> {
    let Some(marker) = self.cache.storage().get(CLEAN_VERSION_KEY)? else {
      return Ok(true);
    };

    match marker.trim().parse::<u64>() {
      Ok(last) => Ok(last < version),
      Err(_) => {
        tracing::warn!(marker = %marker, "unreadable cache version marker");
        Ok(true)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::test_support::{closed_port_url, respond_with};
  use crate::cache::MemoryStorage;
  use serde_json::json;

  fn descriptor(version: u64) -> CacheDescriptor {
    CacheDescriptor {
      id: json!("localStorage-fix"),
      version,
    }
  }

  fn setup() -> (Arc<MemoryStorage>, CacheMigration<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let migration = CacheMigration::new(Arc::clone(&storage));
    (storage, migration)
  }

  fn seed_dirty_cache(storage: &MemoryStorage) {
    let users = json!([
      {"id": "1", "email": "a@b.c", "firstName": "A", "lastName": "B", "role": "admin"},
      {"id": "9", "email": "x@y.z"}
    ]);
    storage.set(USERS_KEY, &users.to_string()).unwrap();
    storage.set(TICKETS_KEY, "not json").unwrap();
    storage
      .set(CATEGORIES_KEY, &json!([{"id": 1, "name": "General"}]).to_string())
      .unwrap();
  }

  #[test]
  fn test_first_run_cleans_and_records_version() {
    let (storage, migration) = setup();
    seed_dirty_cache(&storage);

    let outcome = migration.apply(&descriptor(3)).unwrap();
    assert_eq!(
      outcome,
      MigrationOutcome::Cleaned {
        version: 3,
        dropped: 1,
        removed: 1
      }
    );

    assert_eq!(storage.get(CLEAN_VERSION_KEY).unwrap(), Some("3".to_string()));
    assert_eq!(storage.get(TICKETS_KEY).unwrap(), None);
    let users: Vec<Value> = serde_json::from_str(&storage.get(USERS_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(users.len(), 1);
  }

  #[test]
  fn test_numeric_user_id_survives_cleanup_and_restores_session() {
    use crate::cache::{TOKEN_KEY, USER_ID_KEY};
    use crate::stores::{SessionStore, UserStore};

    let (storage, migration) = setup();
    let users = json!([
      {"id": 4, "email": "jefa@growdesk.com", "firstName": "Lucía", "lastName": "Mora", "role": "admin"}
    ]);
    storage.set(USERS_KEY, &users.to_string()).unwrap();
    storage.set(TOKEN_KEY, "abc").unwrap();
    storage.set(USER_ID_KEY, "4").unwrap();

    let outcome = migration.apply(&descriptor(1)).unwrap();
    assert!(matches!(outcome, MigrationOutcome::Cleaned { dropped: 0, .. }));

    let mut users = UserStore::new(Arc::clone(&storage));
    let mut session = SessionStore::new(Arc::clone(&storage), false);
    assert!(session.check_auth(&mut users));
    assert!(session.is_admin());
    assert_eq!(session.full_name(), "Lucía Mora");

    let cached: Vec<Value> = serde_json::from_str(&storage.get(USERS_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0]["email"], "jefa@growdesk.com");
  }

  #[test]
  fn test_same_version_runs_once() {
    let (storage, migration) = setup();
    seed_dirty_cache(&storage);

    migration.apply(&descriptor(3)).unwrap();
    let after_first = storage.snapshot().unwrap();

    // Dirty the cache again; the second startup must not touch it
    storage.set(TICKETS_KEY, "still not json").unwrap();
    let before_second = storage.snapshot().unwrap();
    assert_ne!(after_first, before_second);

    let outcome = migration.apply(&descriptor(3)).unwrap();
    assert_eq!(outcome, MigrationOutcome::UpToDate { version: 3 });
    assert_eq!(storage.snapshot().unwrap(), before_second);
  }

  #[test]
  fn test_newer_version_runs_again() {
    let (storage, migration) = setup();
    storage.set(CLEAN_VERSION_KEY, "2").unwrap();

    let outcome = migration.apply(&descriptor(5)).unwrap();
    assert!(matches!(outcome, MigrationOutcome::Cleaned { version: 5, .. }));
    assert_eq!(storage.get(CLEAN_VERSION_KEY).unwrap(), Some("5".to_string()));

    let outcome = migration.apply(&descriptor(4)).unwrap();
    assert_eq!(outcome, MigrationOutcome::UpToDate { version: 4 });
    assert_eq!(storage.get(CLEAN_VERSION_KEY).unwrap(), Some("5".to_string()));
  }

  #[test]
  fn test_unreadable_marker_triggers_cleanup() {
    let (storage, migration) = setup();
    storage.set(CLEAN_VERSION_KEY, "v1").unwrap();

    let outcome = migration.apply(&descriptor(1)).unwrap();
    assert!(matches!(outcome, MigrationOutcome::Cleaned { version: 1, .. }));
  }

  #[tokio::test]
  async fn test_unreachable_descriptor_is_not_fatal() {
    let (storage, migration) = setup();
    seed_dirty_cache(&storage);
    let before = storage.snapshot().unwrap();

    let url = Url::parse(&format!("{}/localStorage-fix.json", closed_port_url().await)).unwrap();
    let client = ApiClient::from_url(url.as_str());
    let outcome = migration.run(&client, &url).await;

    assert_eq!(outcome, MigrationOutcome::Unavailable);
    assert_eq!(storage.snapshot().unwrap(), before);
  }

  #[tokio::test]
  async fn test_run_fetches_descriptor() {
    let (server, mut requests) = respond_with(200, r#"{"id":"fix","version":7}"#).await;
    let (storage, migration) = setup();

    let url = Url::parse(&format!("{}/localStorage-fix.json", server)).unwrap();
    let client = ApiClient::from_url(&server);
    let outcome = migration.run(&client, &url).await;

    assert!(matches!(outcome, MigrationOutcome::Cleaned { version: 7, .. }));
    assert_eq!(storage.get(CLEAN_VERSION_KEY).unwrap(), Some("7".to_string()));
    let request = requests.recv().await.unwrap();
    assert!(request.head.starts_with("GET /localStorage-fix.json"));
  }
}
