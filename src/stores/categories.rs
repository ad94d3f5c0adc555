use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::api::types::Category;
use crate::cache::{CollectionCache, KeyValueStore};

use super::track;

/// Ticket categories, cached locally.
///
/// Ids of locally added categories are `max + 1`; two offline clients adding
/// at the same time will hand out the same id.
pub struct CategoryStore<S: KeyValueStore + ?Sized> {
  cache: CollectionCache<S>,
  categories: Vec<Category>,
  error: Option<String>,
}

impl<S: KeyValueStore + ?Sized> CategoryStore<S> {
  /// Create the store and load it from cache (or the mock dataset).
  pub fn new(storage: Arc<S>) -> Result<Self> {
    let mut store = Self {
      cache: CollectionCache::new(storage),
      categories: Vec::new(),
      error: None,
    };
    store.fetch()?;
    Ok(store)
  }

  pub fn categories(&self) -> &[Category] {
    &self.categories
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn find(&self, id: u64) -> Option<&Category> {
    self.categories.iter().find(|c| c.id == id)
  }

  /// Reload from cache, seeding the mock categories when it is empty.
  pub fn fetch(&mut self) -> Result<&[Category]> {
    let loaded = self.cache.load::<Category>();
    let loaded = track(&mut self.error, "failed to load categories", loaded)?;
    self.categories = loaded.data;
    Ok(&self.categories)
  }

  /// Append a category with the next free id.
  pub fn add(&mut self, name: &str, description: &str) -> Result<Category> {
    let category = Category {
      id: self.next_id(),
      name: name.to_string(),
      description: description.to_string(),
    };
    self.categories.push(category.clone());

    let saved = self.persist();
    track(&mut self.error, "failed to add category", saved)?;
    tracing::info!(id = category.id, name, "category added");
    Ok(category)
  }

  /// Replace the category carrying the same id.
  pub fn update(&mut self, category: Category) -> Result<Category> {
    let result = match self.categories.iter_mut().find(|c| c.id == category.id) {
      Some(existing) => {
        *existing = category.clone();
        self.persist()
      }
      None => Err(eyre!("Category {} not found", category.id)),
    };

    track(&mut self.error, "failed to update category", result)?;
    tracing::info!(id = category.id, "category updated");
    Ok(category)
  }

  /// Remove the category with `id`. Unknown ids are ignored.
  pub fn delete(&mut self, id: u64) -> Result<()> {
    let before = self.categories.len();
    self.categories.retain(|c| c.id != id);
    if self.categories.len() == before {
      tracing::debug!(id, "category not present, nothing to delete");
      self.error = None;
      return Ok(());
    }

    let saved = self.persist();
    track(&mut self.error, "failed to delete category", saved)?;
    tracing::info!(id, "category deleted");
    Ok(())
  }

  fn next_id(&self) -> u64 {
    self.categories.iter().map(|c| c.id).max().map_or(1, |max| max + 1)
  }

  fn persist(&self) -> Result<()> {
    self.cache.save(&self.categories)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::cache::mock_categories;
  use crate::cache::{MemoryStorage, CATEGORIES_KEY};

  fn setup() -> (Arc<MemoryStorage>, CategoryStore<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let store = CategoryStore::new(Arc::clone(&storage)).unwrap();
    (storage, store)
  }

  fn cached(storage: &MemoryStorage) -> Vec<Category> {
    serde_json::from_str(&storage.get(CATEGORIES_KEY).unwrap().unwrap()).unwrap()
  }

  #[test]
  fn test_fetch_on_empty_cache_seeds_mocks() {
    let (storage, store) = setup();
    assert_eq!(store.categories(), mock_categories().as_slice());
    assert_eq!(cached(&storage), mock_categories());
  }

  #[test]
  fn test_fetch_prefers_cache() {
    let storage = Arc::new(MemoryStorage::new());
    storage
      .set(CATEGORIES_KEY, r#"[{"id":9,"name":"Redes","description":"VPN"}]"#)
      .unwrap();

    let store = CategoryStore::new(Arc::clone(&storage)).unwrap();
    assert_eq!(store.categories().len(), 1);
    assert_eq!(store.categories()[0].name, "Redes");
  }

  #[test]
  fn test_add_uses_max_plus_one_and_appends() {
    let (storage, mut store) = setup();
    store.delete(2).unwrap();

    let added = store.add("Redes", "Conectividad").unwrap();
    assert_eq!(added.id, 5);

    let ids: Vec<u64> = store.categories().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 3, 4, 5]);
    assert_eq!(cached(&storage), store.categories());
  }

  #[test]
  fn test_add_to_empty_collection_starts_at_one() {
    let (_storage, mut store) = setup();
    for id in 1..=4 {
      store.delete(id).unwrap();
    }
    assert!(store.categories().is_empty());

    let added = store.add("Primera", "").unwrap();
    assert_eq!(added.id, 1);
  }

  #[test]
  fn test_update_replaces_in_place() {
    let (storage, mut store) = setup();
    let mut category = store.find(3).unwrap().clone();
    category.description = "Cobros".to_string();

    store.update(category).unwrap();
    assert_eq!(store.categories()[2].description, "Cobros");
    assert_eq!(cached(&storage)[2].description, "Cobros");
  }

  #[test]
  fn test_update_missing_category_fails() {
    let (_storage, mut store) = setup();
    let result = store.update(Category {
      id: 42,
      name: "Nada".to_string(),
      description: String::new(),
    });

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not found"));
    assert_eq!(store.error(), Some("failed to update category"));
  }

  #[test]
  fn test_delete_removes_exactly_one() {
    let (storage, mut store) = setup();
    store.delete(2).unwrap();

    let ids: Vec<u64> = store.categories().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 3, 4]);
    assert_eq!(cached(&storage), store.categories());
  }

  #[test]
  fn test_delete_absent_id_is_noop() {
    let (storage, mut store) = setup();
    let before = storage.snapshot().unwrap();

    store.delete(99).unwrap();
    assert_eq!(store.categories(), mock_categories().as_slice());
    assert_eq!(storage.snapshot().unwrap(), before);
    assert_eq!(store.error(), None);
  }
}
