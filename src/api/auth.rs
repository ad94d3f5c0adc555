use color_eyre::Result;

use super::api_types::{AuthResponse, LoginRequest, RegisterRequest};
use super::client::ApiClient;
use super::types::User;

/// Anything able to exchange credentials for a session.
#[allow(async_fn_in_trait)]
pub trait AuthBackend {
  async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse>;
}

/// Authentication endpoints
#[derive(Clone)]
pub struct AuthService {
  client: ApiClient,
}

impl AuthService {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }

  /// Create an account and return its first session.
  pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
    self.client.post(&["auth", "register"], request).await
  }

  /// Profile of the user owning the client's token.
  pub async fn me(&self) -> Result<User> {
    self.client.get(&["auth", "me"]).await
  }
}

impl AuthBackend for AuthService {
  async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse> {
    self.client.post(&["auth", "login"], credentials).await
  }
}
