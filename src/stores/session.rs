//! Session state: who is logged in, restored from and written to the cache.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::api::api_types::LoginRequest;
use crate::api::auth::AuthBackend;
use crate::api::types::{Role, User};
use crate::cache::{KeyValueStore, TOKEN_KEY, USER_ID_KEY, USER_KEY};

use super::users::UserStore;

/// Where the client should go after a session change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  Dashboard,
  Tickets,
  Login,
}

impl Route {
  pub fn path(&self) -> &'static str {
    match self {
      Route::Dashboard => "/dashboard",
      Route::Tickets => "/tickets",
      Route::Login => "/login",
    }
  }

  fn for_role(role: Role) -> Self {
    match role {
      Role::Admin => Route::Dashboard,
      Role::Assistant | Role::Employee => Route::Tickets,
    }
  }
}

/// Profile fields a user may change on their own account
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
  pub email: Option<String>,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub department: Option<String>,
}

/// Current session.
///
/// "Authenticated" means a token is held; it is never checked for expiry.
/// Cache and memory are updated one after the other, so a failure between
/// the two writes can leave them disagreeing.
pub struct SessionStore<S: KeyValueStore + ?Sized> {
  storage: Arc<S>,
  user: Option<User>,
  token: Option<String>,
  loading: bool,
  error: Option<String>,
  dev_mode: bool,
}

impl<S: KeyValueStore + ?Sized> SessionStore<S> {
  /// Create the store, restoring token and user from the cache.
  pub fn new(storage: Arc<S>, dev_mode: bool) -> Self {
    let mut store = Self {
      storage,
      user: None,
      token: None,
      loading: false,
      error: None,
      dev_mode,
    };
    store.init_from_storage();
    store
  }

  fn init_from_storage(&mut self) {
    self.token = self.read_cached(TOKEN_KEY);

    if let Some(raw) = self.read_cached(USER_KEY) {
      match serde_json::from_str::<User>(&raw) {
        Ok(user) => self.user = Some(user),
        Err(e) => tracing::error!(error = %e, "failed to parse cached user"),
      }
    }
  }

  pub fn user(&self) -> Option<&User> {
    self.user.as_ref()
  }

  pub fn token(&self) -> Option<&str> {
    self.token.as_deref()
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn is_authenticated(&self) -> bool {
    self.token.is_some()
  }

  pub fn is_admin(&self) -> bool {
    self.has_role(Role::Admin)
  }

  pub fn is_assistant(&self) -> bool {
    self.has_role(Role::Assistant)
  }

  pub fn is_employee(&self) -> bool {
    self.has_role(Role::Employee)
  }

  /// "First Last", or empty without a user.
  pub fn full_name(&self) -> String {
    self.user.as_ref().map(User::full_name).unwrap_or_default()
  }

  fn has_role(&self, role: Role) -> bool {
    self.user.as_ref().is_some_and(|u| u.role == role)
  }

  /// Exchange credentials for a session.
  ///
  /// Returns the route to show next, or `None` with `error()` set when the
  /// backend refuses or cannot be reached.
  pub async fn login<A: AuthBackend>(
    &mut self,
    backend: &A,
    email: &str,
    password: &str,
  ) -> Option<Route> {
    self.loading = true;
    self.error = None;

    let credentials = LoginRequest {
      email: email.to_string(),
      password: password.to_string(),
    };
    let result = backend.login(&credentials).await;
    self.loading = false;

    let response = match result {
      Ok(response) => response,
      Err(e) => {
        tracing::error!(email, error = %e, "login failed");
        let message = e.to_string();
        self.error = Some(if message.is_empty() {
          "authentication failed".to_string()
        } else {
          message
        });
        return None;
      }
    };

    if let Err(e) = self.store_session(&response.token, &response.user) {
      tracing::error!(error = %e, "failed to cache session");
      self.error = Some("failed to save session".to_string());
      return None;
    }

    let route = Route::for_role(response.user.role);
    tracing::info!(user_id = %response.user.id, role = %response.user.role, "logged in");
    self.token = Some(response.token);
    self.user = Some(response.user);
    Some(route)
  }

  /// End the session. Always succeeds.
  pub fn logout(&mut self) -> Route {
    self.clear_cached_session();
    self.user = None;
    self.token = None;
    tracing::info!("logged out");
    Route::Login
  }

  /// Rebuild the session from the cache.
  ///
  /// The cached user id is looked up in `users` (loading it first if empty).
  /// In dev mode a miss retries against the mock users. Any failure clears
  /// the cached token and user id.
  pub fn check_auth(&mut self, users: &mut UserStore<S>) -> bool {
    let Some(token) = self.read_cached(TOKEN_KEY) else {
      self.user = None;
      self.token = None;
      return false;
    };
    self.token = Some(token);

    self.loading = true;
    let result = self.lookup_cached_user(users);
    self.loading = false;

    match result {
      Ok(user) => {
        tracing::debug!(user_id = %user.id, "session restored");
        self.user = Some(user);
        true
      }
      Err(e) => {
        tracing::warn!(error = %e, "session could not be restored");
        self.storage.remove(TOKEN_KEY).ok();
        self.storage.remove(USER_ID_KEY).ok();
        self.token = None;
        self.user = None;
        false
      }
    }
  }

  fn lookup_cached_user(&self, users: &mut UserStore<S>) -> Result<User> {
    let user_id = self.cached_user_id()?;

    if users.is_empty() {
      users.fetch()?;
    }

    if let Some(user) = users.find(&user_id) {
      return Ok(user.clone());
    }

    if self.dev_mode {
      users.init_mock_users()?;
      if let Some(user) = users.find(&user_id) {
        tracing::info!(user_id = %user_id, "session restored from mock users");
        return Ok(user.clone());
      }
    }

    Err(eyre!("User {} not found", user_id))
  }

  /// Merge `changes` into the current user. False without a session.
  pub fn update_profile(&mut self, changes: ProfileUpdate) -> bool {
    let Some(user) = self.user.as_mut() else {
      return false;
    };

    if let Some(email) = changes.email {
      user.email = email;
    }
    if let Some(first_name) = changes.first_name {
      user.first_name = first_name;
    }
    if let Some(last_name) = changes.last_name {
      user.last_name = last_name;
    }
    if let Some(department) = changes.department {
      user.department = Some(department);
    }

    let saved = serde_json::to_string(&*user)
      .map_err(|e| eyre!("Failed to serialize user: {}", e))
      .and_then(|raw| self.storage.set(USER_KEY, &raw));
    if let Err(e) = saved {
      tracing::error!(error = %e, "failed to update profile");
      self.error = Some("failed to update profile".to_string());
      return false;
    }
    true
  }

  /// Reload the current user's profile from the user directory.
  pub fn fetch_current_user_profile(&mut self, users: &mut UserStore<S>) -> Option<User> {
    self.token.as_ref()?;

    self.loading = true;
    let result = self.reload_user(users);
    self.loading = false;

    match result {
      Ok(user) => {
        self.user = Some(user.clone());
        Some(user)
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to load current user profile");
        self.error = Some("failed to load current user profile".to_string());
        None
      }
    }
  }

  fn reload_user(&self, users: &mut UserStore<S>) -> Result<User> {
    let user_id = self.cached_user_id()?;
    users.fetch()?;
    users
      .find(&user_id)
      .cloned()
      .ok_or_else(|| eyre!("User {} not found", user_id))
  }

  fn cached_user_id(&self) -> Result<String> {
    self
      .storage
      .get(USER_ID_KEY)?
      .ok_or_else(|| eyre!("No user id cached for this session"))
  }

  /// Cached value under `key`; a read failure is logged and counts as absent.
  fn read_cached(&self, key: &str) -> Option<String> {
    match self.storage.get(key) {
      Ok(value) => value,
      Err(e) => {
        tracing::error!(key, error = %e, "failed to read cached session");
        None
      }
    }
  }

  fn store_session(&self, token: &str, user: &User) -> Result<()> {
    let raw = serde_json::to_string(user).map_err(|e| eyre!("Failed to serialize user: {}", e))?;
    self.storage.set(TOKEN_KEY, token)?;
    self.storage.set(USER_ID_KEY, &user.id)?;
    self.storage.set(USER_KEY, &raw)
  }

  fn clear_cached_session(&self) {
    for key in [TOKEN_KEY, USER_ID_KEY, USER_KEY] {
      if let Err(e) = self.storage.remove(key) {
        tracing::error!(key, error = %e, "failed to clear cached session");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::api_types::AuthResponse;
  use crate::api::cache::mock_users;
  use crate::cache::MemoryStorage;

  /// Backend accepting one password for every mock user.
  struct FakeBackend;

  impl AuthBackend for FakeBackend {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse> {
      if credentials.password != "secret" {
        return Err(eyre!("Credenciales inválidas"));
      }
      let user = mock_users()
        .into_iter()
        .find(|u| u.email == credentials.email)
        .ok_or_else(|| eyre!("Credenciales inválidas"))?;
      Ok(AuthResponse {
        token: format!("token-{}", user.id),
        user,
      })
    }
  }

  /// Storage whose reads always fail.
  struct BrokenStorage;

  impl KeyValueStore for BrokenStorage {
    fn get(&self, _key: &str) -> Result<Option<String>> {
      Err(eyre!("disk I/O error"))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
      Ok(())
    }

    fn remove(&self, _key: &str) -> Result<()> {
      Err(eyre!("remove must not be reached"))
    }
  }

  fn setup(dev_mode: bool) -> (Arc<MemoryStorage>, SessionStore<MemoryStorage>, UserStore<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let session = SessionStore::new(Arc::clone(&storage), dev_mode);
    let users = UserStore::new(Arc::clone(&storage));
    (storage, session, users)
  }

  #[tokio::test]
  async fn test_login_admin_routes_to_dashboard() {
    let (storage, mut session, _users) = setup(false);

    let route = session
      .login(&FakeBackend, "admin@growdesk.com", "secret")
      .await;
    assert_eq!(route, Some(Route::Dashboard));
    assert!(session.is_authenticated());
    assert!(session.is_admin());
    assert!(!session.is_employee());
    assert_eq!(session.full_name(), "Admin Sistema");

    assert_eq!(storage.get(TOKEN_KEY).unwrap(), Some("token-1".to_string()));
    assert_eq!(storage.get(USER_ID_KEY).unwrap(), Some("1".to_string()));
    assert!(storage.get(USER_KEY).unwrap().is_some());
  }

  #[tokio::test]
  async fn test_login_non_admin_routes_to_tickets() {
    let (_storage, mut session, _users) = setup(false);

    let route = session
      .login(&FakeBackend, "empleado@growdesk.com", "secret")
      .await;
    assert_eq!(route, Some(Route::Tickets));
    assert!(session.is_employee());
    assert_eq!(route.map(|r| r.path()), Some("/tickets"));
  }

  #[tokio::test]
  async fn test_login_failure_records_error() {
    let (storage, mut session, _users) = setup(false);

    let route = session
      .login(&FakeBackend, "admin@growdesk.com", "wrong")
      .await;
    assert_eq!(route, None);
    assert!(!session.is_authenticated());
    assert!(!session.is_loading());
    assert_eq!(session.error(), Some("Credenciales inválidas"));
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
  }

  #[test]
  fn test_new_restores_cached_session() {
    let storage = Arc::new(MemoryStorage::new());
    let user = mock_users().remove(1);
    storage.set(TOKEN_KEY, "abc").unwrap();
    storage
      .set(USER_KEY, &serde_json::to_string(&user).unwrap())
      .unwrap();

    let session = SessionStore::new(Arc::clone(&storage), false);
    assert_eq!(session.token(), Some("abc"));
    assert!(session.is_assistant());
  }

  #[test]
  fn test_new_ignores_unparseable_user() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(USER_KEY, "{broken").unwrap();

    let session = SessionStore::new(storage, false);
    assert!(session.user().is_none());
    assert_eq!(session.full_name(), "");
  }

  #[test]
  fn test_read_errors_count_as_no_session() {
    let storage = Arc::new(BrokenStorage);
    let mut session = SessionStore::new(Arc::clone(&storage), false);
    assert!(session.token().is_none());
    assert!(session.user().is_none());

    let mut users = UserStore::new(storage);
    assert!(!session.check_auth(&mut users));
    assert!(!session.is_authenticated());
  }

  #[test]
  fn test_check_auth_without_token() {
    let (_storage, mut session, mut users) = setup(false);
    assert!(!session.check_auth(&mut users));
    assert!(!session.is_authenticated());
    assert!(users.is_empty());
  }

  #[test]
  fn test_check_auth_finds_cached_user() {
    let (storage, mut session, mut users) = setup(false);
    storage.set(TOKEN_KEY, "abc").unwrap();
    storage.set(USER_ID_KEY, "2").unwrap();

    assert!(session.check_auth(&mut users));
    assert_eq!(session.user().map(|u| u.id.as_str()), Some("2"));
    assert!(!users.is_empty());
  }

  #[test]
  fn test_check_auth_unknown_user_clears_cache() {
    let (storage, mut session, mut users) = setup(false);
    storage.set(TOKEN_KEY, "abc").unwrap();
    storage.set(USER_ID_KEY, "999").unwrap();

    assert!(!session.check_auth(&mut users));
    assert!(!session.is_authenticated());
    assert!(session.user().is_none());
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(USER_ID_KEY).unwrap(), None);
  }

  #[test]
  fn test_check_auth_missing_user_id_clears_cache() {
    let (storage, mut session, mut users) = setup(false);
    storage.set(TOKEN_KEY, "abc").unwrap();

    assert!(!session.check_auth(&mut users));
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
  }

  #[test]
  fn test_check_auth_dev_mode_falls_back_to_mock_users() {
    let (storage, mut session, mut users) = setup(true);
    storage.set(TOKEN_KEY, "abc").unwrap();
    storage.set(USER_ID_KEY, "3").unwrap();
    storage
      .set(
        crate::cache::USERS_KEY,
        r#"[{"id":"50","email":"otro@growdesk.com","firstName":"O","lastName":"T","role":"employee"}]"#,
      )
      .unwrap();

    assert!(session.check_auth(&mut users));
    assert!(session.is_employee());
    assert_eq!(users.users(), mock_users().as_slice());
  }

  #[tokio::test]
  async fn test_logout_clears_everything() {
    let (storage, mut session, _users) = setup(false);
    session
      .login(&FakeBackend, "asistente@growdesk.com", "secret")
      .await;

    assert_eq!(session.logout(), Route::Login);
    assert!(!session.is_authenticated());
    assert!(session.user().is_none());
    assert!(storage.snapshot().unwrap().is_empty());
  }

  #[test]
  fn test_logout_without_session() {
    let (storage, mut session, _users) = setup(false);
    assert_eq!(session.logout(), Route::Login);
    assert!(!session.is_authenticated());
    assert!(storage.snapshot().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_update_profile() {
    let (storage, mut session, _users) = setup(false);
    assert!(!session.update_profile(ProfileUpdate::default()));

    session
      .login(&FakeBackend, "empleado@growdesk.com", "secret")
      .await;
    let changed = session.update_profile(ProfileUpdate {
      last_name: Some("Martínez".to_string()),
      ..Default::default()
    });
    assert!(changed);
    assert_eq!(session.full_name(), "Juan Martínez");

    let cached: User = serde_json::from_str(&storage.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(cached.last_name, "Martínez");
  }

  #[test]
  fn test_fetch_current_user_profile() {
    let (storage, mut session, mut users) = setup(false);
    assert!(session.fetch_current_user_profile(&mut users).is_none());

    storage.set(TOKEN_KEY, "abc").unwrap();
    storage.set(USER_ID_KEY, "1").unwrap();
    let mut session = SessionStore::new(Arc::clone(&storage), false);

    let user = session.fetch_current_user_profile(&mut users).unwrap();
    assert_eq!(user.role, Role::Admin);
    assert!(session.is_admin());
  }
}
