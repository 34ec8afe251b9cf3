//! Content-addressable download cache for origin-hosted images.
//!
//! Image URLs referencing allowlisted origin hosts are mirrored to local
//! files named by a hash of the URL, so repeated requests for the same URL
//! always resolve to the same file. Anything else passes through verbatim —
//! the cache must never become an open image proxy, and a broken cache must
//! never break a displayed image.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

/// File extensions eligible for caching.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "avif"];

/// Concurrent downloads per batch. Deliberate rate limiting against the
/// origin server, not a parallelism optimization.
const BATCH_SIZE: usize = 5;
const BATCH_DELAY_MS: u64 = 200;

const METADATA_FILE: &str = "images.json";
const STATS_FILE: &str = "image-stats.json";

/// A downloaded image's bytes plus the MIME type the server reported.
pub struct FetchedImage {
  pub bytes: Vec<u8>,
  pub mime_type: Option<String>,
}

/// Downloads image bytes. Abstracted so tests can count and script downloads.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
  async fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

/// HTTP fetcher with a long timeout; image downloads are streamed in the
/// background and must not be cut short by the shorter API timeouts.
pub struct HttpImageFetcher {
  client: reqwest::Client,
}

impl HttpImageFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(std::time::Duration::from_secs(30))
      .build()
      .map_err(|e| eyre!("Failed to build image HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
  async fn fetch(&self, url: &str) -> Result<FetchedImage> {
    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to download {}: {}", url, e))?;

    if !response.status().is_success() {
      return Err(eyre!("Download of {} returned HTTP {}", url, response.status()));
    }

    let mime_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);

    let bytes = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", url, e))?;

    Ok(FetchedImage {
      bytes: bytes.to_vec(),
      mime_type,
    })
  }
}

/// Metadata for one mirrored image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedImage {
  pub original_url: String,
  pub local_path: PathBuf,
  pub filename: String,
  pub size: u64,
  pub mime_type: Option<String>,
  pub downloaded_at: DateTime<Utc>,
  pub last_accessed: DateTime<Utc>,
}

/// Aggregate counters, persisted alongside the metadata.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ImageStats {
  pub hits: u64,
  pub misses: u64,
  pub errors: u64,
  pub total_size: u64,
  pub count: u64,
}

struct ImageCacheState {
  images: HashMap<String, CachedImage>,
  stats: ImageStats,
}

/// Download-and-store cache for remote images, keyed by URL hash.
pub struct ImageCache {
  dir: PathBuf,
  files_dir: PathBuf,
  /// URL path prefix under which cached files are served.
  public_prefix: String,
  /// Hosts whose images are mirrored; all other URLs pass through.
  allowed_hosts: Vec<String>,
  fetcher: Arc<dyn ImageFetcher>,
  state: Mutex<ImageCacheState>,
}

impl ImageCache {
  /// Open the cache, loading any persisted metadata and stats.
  pub fn open(
    dir: PathBuf,
    public_prefix: String,
    allowed_hosts: Vec<String>,
    fetcher: Arc<dyn ImageFetcher>,
  ) -> Result<Self> {
    let files_dir = dir.join("files");
    std::fs::create_dir_all(&files_dir)
      .map_err(|e| eyre!("Failed to create image cache directory: {}", e))?;

    let images = std::fs::read(dir.join(METADATA_FILE))
      .ok()
      .and_then(|bytes| serde_json::from_slice(&bytes).ok())
      .unwrap_or_default();
    let stats = std::fs::read(dir.join(STATS_FILE))
      .ok()
      .and_then(|bytes| serde_json::from_slice(&bytes).ok())
      .unwrap_or_default();

    Ok(Self {
      dir,
      files_dir,
      public_prefix,
      allowed_hosts,
      fetcher,
      state: Mutex::new(ImageCacheState { images, stats }),
    })
  }

  /// Whether this URL is one we mirror: an image extension on an
  /// allowlisted host.
  fn is_candidate(&self, raw: &str) -> bool {
    let parsed = match url::Url::parse(raw) {
      Ok(parsed) => parsed,
      Err(_) => return false,
    };

    let host_allowed = parsed
      .host_str()
      .map(|host| self.allowed_hosts.iter().any(|allowed| allowed == host))
      .unwrap_or(false);
    if !host_allowed {
      return false;
    }

    extension_of(parsed.path())
      .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
      .unwrap_or(false)
  }

  fn filename_for(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hex::encode(hasher.finalize());

    // Extension comes from the URL path, so query strings never leak into
    // the filename.
    let ext = url::Url::parse(url)
      .ok()
      .and_then(|parsed| extension_of(parsed.path()));
    match ext {
      Some(ext) => format!("{}.{}", digest, ext),
      None => digest,
    }
  }

  fn public_url(&self, filename: &str) -> String {
    format!("{}/{}", self.public_prefix.trim_end_matches('/'), filename)
  }

  /// Resolve a URL to its locally-cached equivalent, downloading on miss.
  ///
  /// Always returns a usable URL: pass-through for non-candidates, and the
  /// original URL when the download fails.
  pub async fn cached_image_url(&self, url: &str) -> String {
    if !self.is_candidate(url) {
      return url.to_string();
    }

    // Hit path: verify the backing file still exists (self-healing against
    // manual deletion) before trusting the metadata.
    {
      let mut state = self.state.lock().expect("image cache lock poisoned");
      if let Some(cached) = state.images.get(url).cloned() {
        if cached.local_path.exists() {
          state.stats.hits += 1;
          if let Some(entry) = state.images.get_mut(url) {
            entry.last_accessed = Utc::now();
          }
          return self.public_url(&cached.filename);
        }
        state.stats.total_size = state.stats.total_size.saturating_sub(cached.size);
        state.stats.count = state.stats.count.saturating_sub(1);
        state.images.remove(url);
      }
      state.stats.misses += 1;
    }

    let fetched = match self.fetcher.fetch(url).await {
      Ok(fetched) => fetched,
      Err(e) => {
        tracing::warn!("Image download failed, serving original URL: {}", e);
        let mut state = self.state.lock().expect("image cache lock poisoned");
        state.stats.errors += 1;
        return url.to_string();
      }
    };

    let filename = Self::filename_for(url);
    let local_path = self.files_dir.join(&filename);
    if let Err(e) = std::fs::write(&local_path, &fetched.bytes) {
      tracing::warn!("Failed to write cached image {}: {}", local_path.display(), e);
      let mut state = self.state.lock().expect("image cache lock poisoned");
      state.stats.errors += 1;
      return url.to_string();
    }

    let now = Utc::now();
    let image = CachedImage {
      original_url: url.to_string(),
      local_path,
      filename: filename.clone(),
      size: fetched.bytes.len() as u64,
      mime_type: fetched.mime_type,
      downloaded_at: now,
      last_accessed: now,
    };

    {
      let mut state = self.state.lock().expect("image cache lock poisoned");
      state.stats.total_size += image.size;
      state.stats.count += 1;
      state.images.insert(url.to_string(), image);
      self.persist(&state);
    }

    self.public_url(&filename)
  }

  /// Mirror a set of URLs: deduplicated, downloaded in fixed-size batches
  /// with a short pause between batches.
  pub async fn cache_batch(&self, urls: Vec<String>) {
    let unique: Vec<String> = urls
      .into_iter()
      .collect::<HashSet<_>>()
      .into_iter()
      .collect();

    for batch in unique.chunks(BATCH_SIZE) {
      futures::future::join_all(batch.iter().map(|url| self.cached_image_url(url))).await;
      tokio::time::sleep(std::time::Duration::from_millis(BATCH_DELAY_MS)).await;
    }
  }

  /// Evict entries whose last access exceeds `max_age`, deleting the
  /// backing files.
  pub fn cleanup(&self, max_age: Duration) -> usize {
    let cutoff = Utc::now() - max_age;
    let mut state = self.state.lock().expect("image cache lock poisoned");

    let expired: Vec<String> = state
      .images
      .iter()
      .filter(|(_, image)| image.last_accessed < cutoff)
      .map(|(url, _)| url.clone())
      .collect();

    for url in &expired {
      if let Some(image) = state.images.remove(url) {
        if let Err(e) = std::fs::remove_file(&image.local_path) {
          if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to delete cached image {}: {}", image.local_path.display(), e);
          }
        }
        state.stats.total_size = state.stats.total_size.saturating_sub(image.size);
        state.stats.count = state.stats.count.saturating_sub(1);
      }
    }

    if !expired.is_empty() {
      self.persist(&state);
    }
    expired.len()
  }

  pub fn stats(&self) -> ImageStats {
    self.state.lock().expect("image cache lock poisoned").stats
  }

  fn persist(&self, state: &ImageCacheState) {
    let write = |name: &str, value: serde_json::Result<Vec<u8>>| match value {
      Ok(bytes) => {
        if let Err(e) = std::fs::write(self.dir.join(name), bytes) {
          tracing::warn!("Failed to persist {}: {}", name, e);
        }
      }
      Err(e) => tracing::warn!("Failed to serialize {}: {}", name, e),
    };

    write(METADATA_FILE, serde_json::to_vec_pretty(&state.images));
    write(STATS_FILE, serde_json::to_vec_pretty(&state.stats));
  }
}

fn extension_of(path: &str) -> Option<String> {
  let name = path.rsplit('/').next()?;
  let (_, ext) = name.rsplit_once('.')?;
  if ext.is_empty() {
    None
  } else {
    Some(ext.to_ascii_lowercase())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct CountingFetcher {
    downloads: AtomicUsize,
    fail: bool,
  }

  impl CountingFetcher {
    fn new() -> Arc<Self> {
      Arc::new(Self {
        downloads: AtomicUsize::new(0),
        fail: false,
      })
    }

    fn failing() -> Arc<Self> {
      Arc::new(Self {
        downloads: AtomicUsize::new(0),
        fail: true,
      })
    }
  }

  #[async_trait]
  impl ImageFetcher for CountingFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedImage> {
      self.downloads.fetch_add(1, Ordering::SeqCst);
      if self.fail {
        return Err(eyre!("simulated download failure"));
      }
      Ok(FetchedImage {
        bytes: b"imagebytes".to_vec(),
        mime_type: Some("image/jpeg".to_string()),
      })
    }
  }

  fn cache(fetcher: Arc<dyn ImageFetcher>) -> (tempfile::TempDir, ImageCache) {
    let dir = tempfile::tempdir().unwrap();
    let cache = ImageCache::open(
      dir.path().to_path_buf(),
      "/cache/images".to_string(),
      vec!["shop.example.com".to_string()],
      fetcher,
    )
    .unwrap();
    (dir, cache)
  }

  const URL: &str = "https://shop.example.com/wp-content/uploads/photo.jpg";

  #[tokio::test]
  async fn test_idempotent_caching_downloads_once() {
    let fetcher = CountingFetcher::new();
    let (_dir, cache) = cache(fetcher.clone());

    let first = cache.cached_image_url(URL).await;
    let second = cache.cached_image_url(URL).await;

    assert_eq!(first, second);
    assert!(first.starts_with("/cache/images/"));
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
  }

  #[tokio::test]
  async fn test_non_candidate_urls_pass_through() {
    let fetcher = CountingFetcher::new();
    let (_dir, cache) = cache(fetcher.clone());

    let other_host = "https://cdn.elsewhere.net/photo.jpg";
    assert_eq!(cache.cached_image_url(other_host).await, other_host);

    let not_an_image = "https://shop.example.com/wp-json/wc/v3/products";
    assert_eq!(cache.cached_image_url(not_an_image).await, not_an_image);

    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_failed_download_returns_original_url() {
    let fetcher = CountingFetcher::failing();
    let (_dir, cache) = cache(fetcher);

    assert_eq!(cache.cached_image_url(URL).await, URL);
    assert_eq!(cache.stats().errors, 1);
  }

  #[tokio::test]
  async fn test_self_heals_when_backing_file_deleted() {
    let fetcher = CountingFetcher::new();
    let (dir, cache) = cache(fetcher.clone());

    cache.cached_image_url(URL).await;

    // Simulate manual deletion of the backing file.
    for entry in std::fs::read_dir(dir.path().join("files")).unwrap().flatten() {
      std::fs::remove_file(entry.path()).unwrap();
    }

    let url = cache.cached_image_url(URL).await;
    assert!(url.starts_with("/cache/images/"));
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_cleanup_evicts_old_entries() {
    let fetcher = CountingFetcher::new();
    let (_dir, cache) = cache(fetcher);

    cache.cached_image_url(URL).await;
    {
      let mut state = cache.state.lock().unwrap();
      let image = state.images.get_mut(URL).unwrap();
      image.last_accessed = Utc::now() - Duration::days(30);
    }

    let removed = cache.cleanup(Duration::days(7));
    assert_eq!(removed, 1);

    let stats = cache.stats();
    assert_eq!(stats.count, 0);
    assert_eq!(stats.total_size, 0);
  }

  #[tokio::test]
  async fn test_batch_deduplicates() {
    let fetcher = CountingFetcher::new();
    let (_dir, cache) = cache(fetcher.clone());

    cache
      .cache_batch(vec![URL.to_string(), URL.to_string(), URL.to_string()])
      .await;

    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
  }
}
