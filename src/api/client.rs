use color_eyre::{
  eyre::{eyre, Report},
  Result,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::config::ApiConfig;

/// Failure of a request that reached the send stage
#[derive(Debug)]
pub enum ApiError {
  /// No HTTP answer at all (connection refused, timeout, DNS)
  Transport(String),
  /// The server answered with a non-success status
  Status { status: StatusCode, message: String },
}

impl fmt::Display for ApiError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ApiError::Transport(message) | ApiError::Status { message, .. } => f.write_str(message),
    }
  }
}

impl std::error::Error for ApiError {}

/// True when `err` means the backend could not be reached, as opposed to the
/// backend refusing the request.
pub fn is_unreachable(err: &Report) -> bool {
  matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Transport(_)))
}

/// GrowDesk REST API client wrapper
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }
    let http = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let base_url =
      Url::parse(&config.url).map_err(|e| eyre!("Invalid API url {}: {}", config.url, e))?;

    Ok(Self {
      http,
      base_url,
      token: None,
    })
  }

  /// Client rooted at `url` with default settings.
  #[cfg(test)]
  pub fn from_url(url: &str) -> Self {
    Self::new(&ApiConfig {
      url: url.to_string(),
      timeout_secs: Some(5),
    })
    .unwrap()
  }

  /// Copy of this client sending `token` as bearer authorization.
  pub fn with_token(&self, token: Option<String>) -> Self {
    Self {
      token,
      ..self.clone()
    }
  }

  /// Resolve endpoint segments (e.g. `["tickets", id]`) below the base url.
  /// Each segment is percent-encoded, so ids cannot change the route.
  fn endpoint(&self, segments: &[&str]) -> Result<Url> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| eyre!("API url {} cannot hold a path", self.base_url))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
    let url = self.endpoint(segments)?;
    self.send_json(Method::GET, url, None::<&()>).await
  }

  pub async fn post<B: Serialize, T: DeserializeOwned>(&self, segments: &[&str], body: &B) -> Result<T> {
    let url = self.endpoint(segments)?;
    self.send_json(Method::POST, url, Some(body)).await
  }

  pub async fn put<B: Serialize, T: DeserializeOwned>(&self, segments: &[&str], body: &B) -> Result<T> {
    let url = self.endpoint(segments)?;
    self.send_json(Method::PUT, url, Some(body)).await
  }

  /// DELETE an endpoint; any response body is ignored.
  pub async fn delete(&self, segments: &[&str]) -> Result<()> {
    let url = self.endpoint(segments)?;
    let request = self.http.request(Method::DELETE, url.clone());
    self.send(request, &Method::DELETE, &url).await?;
    Ok(())
  }

  /// GET an absolute url (static resources outside the API root).
  pub async fn get_url<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
    self.send_json(Method::GET, url.clone(), None::<&()>).await
  }

  async fn send_json<B: Serialize, T: DeserializeOwned>(
    &self,
    method: Method,
    url: Url,
    body: Option<&B>,
  ) -> Result<T> {
    let mut request = self.http.request(method.clone(), url.clone());
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = self.send(request, &method, &url).await?;
    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse response from {} {}: {}", method, url.path(), e))
  }

  async fn send(
    &self,
    mut request: RequestBuilder,
    method: &Method,
    url: &Url,
  ) -> Result<reqwest::Response> {
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    tracing::debug!(%method, path = url.path(), "api request");
    let response = request
      .send()
      .await
      .map_err(|e| ApiError::Transport(format!("{} {} failed: {}", method, url.path(), e)))?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match body.trim() {
      "" => format!("{} {} returned {}", method, url.path(), status),
      text => text.to_string(),
    };
    Err(ApiError::Status { status, message }.into())
  }
}
