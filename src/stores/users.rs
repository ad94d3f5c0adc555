use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::api::types::User;
use crate::api::users::UsersService;
use crate::cache::{CacheSource, Cacheable, CollectionCache, KeyValueStore};

use super::track;

/// User directory, cached locally. Empty until fetched.
pub struct UserStore<S: KeyValueStore + ?Sized> {
  cache: CollectionCache<S>,
  users: Vec<User>,
  error: Option<String>,
}

impl<S: KeyValueStore + ?Sized> UserStore<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      cache: CollectionCache::new(storage),
      users: Vec::new(),
      error: None,
    }
  }

  pub fn users(&self) -> &[User] {
    &self.users
  }

  pub fn is_empty(&self) -> bool {
    self.users.is_empty()
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  /// Linear lookup by id.
  pub fn find(&self, id: &str) -> Option<&User> {
    self.users.iter().find(|u| u.id == id)
  }

  /// Load from cache, seeding the mock users when it is empty.
  pub fn fetch(&mut self) -> Result<&[User]> {
    let loaded = self.cache.load::<User>();
    let loaded = track(&mut self.error, "failed to load users", loaded)?;
    self.users = loaded.data;
    Ok(&self.users)
  }

  /// Replace the whole directory with the mock users.
  pub fn init_mock_users(&mut self) -> Result<()> {
    self.users = User::seed();
    let saved = self.persist();
    track(&mut self.error, "failed to initialize mock users", saved)?;
    tracing::info!(count = self.users.len(), "mock users initialized");
    Ok(())
  }

  /// Replace the directory with the backend's when it answers; otherwise keep
  /// whatever the cache (or the mock dataset) provides.
  pub async fn refresh(&mut self, service: &UsersService) -> Result<CacheSource> {
    match service.list_users().await {
      Ok(users) => {
        self.users = users;
        let saved = self.persist();
        track(&mut self.error, "failed to save users", saved)?;
        Ok(CacheSource::Network)
      }
      Err(e) => {
        tracing::warn!(error = %e, "user list unavailable, using cached users");
        let loaded = self.cache.load::<User>();
        let loaded = track(&mut self.error, "failed to load users", loaded)?;
        self.users = loaded.data;
        Ok(loaded.source)
      }
    }
  }

  /// Append `user`; an empty id gets the next numeric id.
  pub fn add(&mut self, mut user: User) -> Result<User> {
    if user.id.is_empty() {
      user.id = self.next_id().to_string();
    }
    let result = if self.find(&user.id).is_some() {
      Err(eyre!("User {} already exists", user.id))
    } else {
      self.users.push(user.clone());
      self.persist()
    };

    track(&mut self.error, "failed to add user", result)?;
    Ok(user)
  }

  pub fn update(&mut self, user: User) -> Result<User> {
    let result = match self.users.iter_mut().find(|u| u.id == user.id) {
      Some(existing) => {
        *existing = user.clone();
        self.persist()
      }
      None => Err(eyre!("User {} not found", user.id)),
    };

    track(&mut self.error, "failed to update user", result)?;
    Ok(user)
  }

  /// Remove the user with `id`. Unknown ids are ignored.
  pub fn delete(&mut self, id: &str) -> Result<()> {
    let before = self.users.len();
    self.users.retain(|u| u.id != id);
    if self.users.len() == before {
      return Ok(());
    }

    let saved = self.persist();
    track(&mut self.error, "failed to delete user", saved)
  }

  fn next_id(&self) -> u64 {
    self
      .users
      .iter()
      .filter_map(|u| u.id.parse::<u64>().ok())
      .max()
      .map_or(1, |max| max + 1)
  }

  fn persist(&self) -> Result<()> {
    self.cache.save(&self.users)
  }
}
