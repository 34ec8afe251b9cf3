use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub origin: OriginConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub images: ImagesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OriginConfig {
  /// Base URL of the WordPress installation.
  pub url: String,
  /// Base URL for the Store API, when served from a different host.
  pub store_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Cache directory (defaults to the platform data dir).
  pub dir: Option<PathBuf>,
  #[serde(default = "default_expiry_minutes")]
  pub expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
  /// URL path prefix under which cached image files are served.
  #[serde(default = "default_image_prefix")]
  pub public_prefix: String,
  /// Hosts whose images are mirrored. Defaults to the origin host.
  #[serde(default)]
  pub allowed_hosts: Vec<String>,
  #[serde(default = "default_image_max_age_days")]
  pub max_age_days: i64,
}

fn default_true() -> bool {
  true
}

fn default_expiry_minutes() -> i64 {
  60
}

fn default_image_prefix() -> String {
  "/cache/images".to_string()
}

fn default_image_max_age_days() -> i64 {
  30
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      dir: None,
      expiry_minutes: default_expiry_minutes(),
    }
  }
}

impl Default for ImagesConfig {
  fn default() -> Self {
    Self {
      public_prefix: default_image_prefix(),
      allowed_hosts: Vec::new(),
      max_age_days: default_image_max_age_days(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./woostore.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/woostore/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/woostore/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("woostore.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("woostore").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// WooCommerce consumer credentials from the environment.
  ///
  /// Secrets never live in the config file. When either half is missing,
  /// wc/v3 calls fail with a credentials error rather than a network one.
  pub fn consumer_credentials() -> Option<(String, String)> {
    let key = std::env::var("WOOSTORE_CONSUMER_KEY").ok()?;
    let secret = std::env::var("WOOSTORE_CONSUMER_SECRET").ok()?;
    Some((key, secret))
  }

  /// The Store API base URL (falls back to the origin URL).
  pub fn store_url(&self) -> &str {
    self.origin.store_url.as_deref().unwrap_or(&self.origin.url)
  }

  /// Cache directory, defaulting to the platform data dir.
  pub fn cache_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.cache.dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("woostore").join("cache"))
  }

  /// Image-cache host allowlist, defaulting to the origin's own host.
  pub fn image_hosts(&self) -> Vec<String> {
    if !self.images.allowed_hosts.is_empty() {
      return self.images.allowed_hosts.clone();
    }
    url::Url::parse(&self.origin.url)
      .ok()
      .and_then(|u| u.host_str().map(String::from))
      .into_iter()
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_parses_with_defaults() {
    let config: Config =
      serde_yaml::from_str("origin:\n  url: https://shop.example.com\n").unwrap();

    assert!(config.cache.enabled);
    assert_eq!(config.cache.expiry_minutes, 60);
    assert_eq!(config.images.public_prefix, "/cache/images");
    assert_eq!(config.store_url(), "https://shop.example.com");
    assert_eq!(config.image_hosts(), vec!["shop.example.com".to_string()]);
  }

  #[test]
  fn test_explicit_values_override_defaults() {
    let yaml = r#"
origin:
  url: https://shop.example.com
  store_url: https://store.example.com
cache:
  enabled: false
  expiry_minutes: 15
images:
  allowed_hosts: [cdn.example.com]
  max_age_days: 7
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();

    assert!(!config.cache.enabled);
    assert_eq!(config.cache.expiry_minutes, 15);
    assert_eq!(config.store_url(), "https://store.example.com");
    assert_eq!(config.image_hosts(), vec!["cdn.example.com".to_string()]);
    assert_eq!(config.images.max_age_days, 7);
  }
}
