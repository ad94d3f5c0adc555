//! Persistent client cache.
//!
//! This module provides the offline cache shared by every store:
//! - A key-value text store (SQLite on disk, or in memory)
//! - Whole-collection JSON blobs with validation on load
//! - Seeding from a mock dataset when nothing valid is cached

mod layer;
mod storage;
mod traits;

pub use layer::{CleanOutcome, CollectionCache};
pub use storage::{MemoryStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, Cacheable, KeyValueStore};

/// Bearer token of the current session
pub const TOKEN_KEY: &str = "token";
/// Id of the current session's user
pub const USER_ID_KEY: &str = "userId";
/// JSON of the current session's user
pub const USER_KEY: &str = "user";
/// Cached user list
pub const USERS_KEY: &str = "growdesk-users";
/// Cached ticket list
pub const TICKETS_KEY: &str = "growdesk_tickets";
/// Cached category list
pub const CATEGORIES_KEY: &str = "growdesk-categories";
/// Last descriptor version the cleanup pass ran for
pub const CLEAN_VERSION_KEY: &str = "localStorage-clean-version";
