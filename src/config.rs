use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Name of the static cache descriptor served next to the API.
const DESCRIPTOR_FILE: &str = "localStorage-fix.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Seed mock users at startup and fall back to them when restoring a session
  #[serde(default)]
  pub dev_mode: bool,
  /// Serve the placeholder ticket when ticket reads fail
  #[serde(default = "default_true")]
  pub demo_fallback: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api: ApiConfig::default(),
      cache: CacheConfig::default(),
      dev_mode: false,
      demo_fallback: true,
    }
  }
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base url of the REST API (e.g. "http://localhost:8080/api")
  #[serde(default = "default_api_url")]
  pub url: String,
  /// Request timeout; the HTTP client default applies when unset
  pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: None,
    }
  }
}

fn default_api_url() -> String {
  "http://localhost:8080/api".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Cache database location (default: $XDG_DATA_HOME/growdesk/cache.db)
  pub path: Option<PathBuf>,
  /// Url of the cache descriptor (default: <api origin>/localStorage-fix.json)
  pub descriptor_url: Option<String>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./growdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/growdesk/config.yaml
  ///
  /// Defaults apply when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        tracing::info!("no configuration file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("growdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("growdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config = Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    tracing::info!(path = %path.display(), "configuration loaded");
    Ok(config)
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Url of the cache descriptor checked at startup.
  pub fn descriptor_url(&self) -> Result<Url> {
    if let Some(url) = &self.cache.descriptor_url {
      return Url::parse(url).map_err(|e| eyre!("Invalid descriptor url {}: {}", url, e));
    }

    let api = Url::parse(&self.api.url)
      .map_err(|e| eyre!("Invalid API url {}: {}", self.api.url, e))?;
    api
      .join(&format!("/{}", DESCRIPTOR_FILE))
      .map_err(|e| eyre!("Failed to build descriptor url: {}", e))
  }

  /// Get the login password from environment variables.
  ///
  /// Checks GROWDESK_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("GROWDESK_PASSWORD")
      .map_err(|_| eyre!("Password not found. Pass --password or set GROWDESK_PASSWORD."))
  }
}
