use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::api::api_types::RegisterRequest;
use crate::api::auth::AuthService;
use crate::api::client::ApiClient;
use crate::api::tickets::TicketService;
use crate::api::types::User;
use crate::api::users::UsersService;
use crate::cache::{KeyValueStore, MemoryStorage, SqliteStorage};
use crate::config::Config;
use crate::migration::{CacheMigration, MigrationOutcome};
use crate::stores::{CategoryStore, ProfileUpdate, Route, SessionStore, TicketStore, UserStore};

/// Main application state.
///
/// Every store shares the same cache; nothing is global.
pub struct App {
  config: Config,
  storage: Arc<dyn KeyValueStore>,
  client: ApiClient,
  session: SessionStore<dyn KeyValueStore>,
  users: UserStore<dyn KeyValueStore>,
  categories: CategoryStore<dyn KeyValueStore>,
  tickets: TicketStore<dyn KeyValueStore>,
}

impl App {
  /// Open the configured cache (or an in-memory one) and start the app.
  pub async fn new(config: Config, ephemeral: bool) -> Result<Self> {
    let storage: Arc<dyn KeyValueStore> = if ephemeral {
      Arc::new(MemoryStorage::new())
    } else {
      Arc::new(SqliteStorage::open(config.cache.path.as_deref())?)
    };
    Self::start(config, storage).await
  }

  /// Startup sequence:
  /// 1. Cache cleanup against the remote descriptor (never fatal)
  /// 2. Mock users in dev mode
  /// 3. Stores loaded from cache
  /// 4. Session restored from cache
  pub async fn start(config: Config, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
    let client = ApiClient::new(&config.api)?;

    match config.descriptor_url() {
      Ok(url) => {
        let outcome = CacheMigration::new(Arc::clone(&storage))
          .run(&client, &url)
          .await;
        if let MigrationOutcome::Cleaned { version, .. } = outcome {
          tracing::info!(version, "cache migrated");
        }
      }
      Err(e) => tracing::warn!(error = %e, "skipping cache cleanup"),
    }

    let mut users = UserStore::new(Arc::clone(&storage));
    if config.dev_mode {
      users.init_mock_users()?;
    }
    let categories = CategoryStore::new(Arc::clone(&storage))?;
    let tickets = TicketStore::new(Arc::clone(&storage));

    let mut session = SessionStore::new(Arc::clone(&storage), config.dev_mode);
    let authenticated = session.check_auth(&mut users);
    tracing::info!(authenticated, "app initialized");

    Ok(Self {
      config,
      storage,
      client,
      session,
      users,
      categories,
      tickets,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn session(&self) -> &SessionStore<dyn KeyValueStore> {
    &self.session
  }

  pub fn categories(&mut self) -> &mut CategoryStore<dyn KeyValueStore> {
    &mut self.categories
  }

  pub fn tickets(&mut self) -> &mut TicketStore<dyn KeyValueStore> {
    &mut self.tickets
  }

  pub fn users(&mut self) -> &mut UserStore<dyn KeyValueStore> {
    &mut self.users
  }

  /// The logged-in user, or an error telling how to log in.
  pub fn require_user(&self) -> Result<&User> {
    match self.session.user() {
      Some(user) if self.session.is_authenticated() => Ok(user),
      _ => Err(eyre!("Not logged in. Run `growdesk login <email>` first.")),
    }
  }

  /// API client carrying the session token, if any.
  fn authorized_client(&self) -> ApiClient {
    self
      .client
      .with_token(self.session.token().map(String::from))
  }

  pub fn ticket_service(&self) -> TicketService<dyn KeyValueStore> {
    TicketService::new(
      self.authorized_client(),
      Arc::clone(&self.storage),
      self.config.demo_fallback,
    )
  }

  pub fn users_service(&self) -> UsersService {
    UsersService::new(self.authorized_client())
  }

  pub async fn login(&mut self, email: &str, password: &str) -> Result<Route> {
    let auth = AuthService::new(self.client.clone());
    match self.session.login(&auth, email, password).await {
      Some(route) => Ok(route),
      None => Err(eyre!(
        "{}",
        self.session.error().unwrap_or("authentication failed")
      )),
    }
  }

  /// Create an account, then log into it.
  pub async fn register(&mut self, request: RegisterRequest) -> Result<Route> {
    let auth = AuthService::new(self.client.clone());
    auth.register(&request).await?;
    self.login(&request.email, &request.password).await
  }

  /// Current user as the backend sees it.
  pub async fn remote_profile(&self) -> Result<User> {
    AuthService::new(self.authorized_client()).me().await
  }

  pub fn logout(&mut self) -> Route {
    self.session.logout()
  }

  /// Edit the logged-in user's own profile.
  pub fn update_profile(&mut self, changes: ProfileUpdate) -> Result<&User> {
    if !self.session.update_profile(changes) {
      return Err(eyre!(
        "{}",
        self.session.error().unwrap_or("Not logged in")
      ));
    }
    self.require_user()
  }

  /// Re-read the logged-in user from the cached user directory.
  pub fn reload_profile(&mut self) -> Result<&User> {
    self
      .session
      .fetch_current_user_profile(&mut self.users)
      .ok_or_else(|| eyre!("Could not reload profile"))?;
    self.require_user()
  }

  /// Reload tickets from the API, keeping the cached list when offline.
  pub async fn refresh_tickets(&mut self) -> Result<crate::cache::CacheSource> {
    let service = self.ticket_service();
    self.tickets.refresh(&service).await
  }
}
