use color_eyre::Result;

use super::client::ApiClient;
use super::types::User;

/// User directory endpoints
#[derive(Clone)]
pub struct UsersService {
  client: ApiClient,
}

impl UsersService {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }

  /// All users known to the backend.
  pub async fn list_users(&self) -> Result<Vec<User>> {
    self.client.get(&["users"]).await
  }
}
