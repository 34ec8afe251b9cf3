//! File-backed cache store: one JSON file per key with per-entry expiry.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default expiry for entries that don't override it.
pub const DEFAULT_EXPIRY_MINUTES: i64 = 60;

/// A single cache file: the payload plus freshness metadata.
///
/// `last_updated` is stamped exactly once, at write time. Staleness is
/// computed on read as `now - last_updated > expiry_minutes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  pub data: T,
  pub last_updated: DateTime<Utc>,
  pub expiry_minutes: i64,
}

/// Hit/miss counters for the cache store.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
  pub hits: u64,
  pub misses: u64,
}

/// Disk cache keyed by name, one JSON file per key.
///
/// Reads never fail: a missing, corrupt, or expired entry is a miss, and
/// callers uniformly handle `None` by refetching from origin. Writes are
/// whole-file overwrites so a reader always sees a fully-formed entry.
pub struct DiskCacheStore {
  dir: PathBuf,
  default_expiry_minutes: i64,
  hits: AtomicU64,
  misses: AtomicU64,
}

impl DiskCacheStore {
  /// Open the store, creating the cache directory if needed.
  pub fn open(dir: PathBuf) -> Result<Self> {
    std::fs::create_dir_all(&dir)
      .map_err(|e| eyre!("Failed to create cache directory {}: {}", dir.display(), e))?;

    Ok(Self {
      dir,
      default_expiry_minutes: DEFAULT_EXPIRY_MINUTES,
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
    })
  }

  pub fn with_default_expiry(mut self, minutes: i64) -> Self {
    self.default_expiry_minutes = minutes;
    self
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{}.json", key))
  }

  fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
    let path = self.path_for(key);
    let bytes = match std::fs::read(&path) {
      Ok(bytes) => bytes,
      Err(e) => {
        tracing::debug!("Cache read miss for {}: {}", key, e);
        return None;
      }
    };

    match serde_json::from_slice(&bytes) {
      Ok(entry) => Some(entry),
      Err(e) => {
        tracing::warn!("Corrupt cache file for {}, treating as miss: {}", key, e);
        None
      }
    }
  }

  /// Read a value, returning `None` on miss or staleness.
  ///
  /// Staleness and absence are deliberately indistinguishable: both require
  /// an origin refetch.
  pub fn get<T: DeserializeOwned>(&self, key: &str, expiry_override: Option<i64>) -> Option<T> {
    let entry = match self.read_entry::<T>(key) {
      Some(entry) => entry,
      None => {
        self.misses.fetch_add(1, Ordering::Relaxed);
        return None;
      }
    };

    let expiry_minutes = expiry_override.unwrap_or(entry.expiry_minutes);
    if Utc::now() - entry.last_updated > Duration::minutes(expiry_minutes) {
      self.misses.fetch_add(1, Ordering::Relaxed);
      return None;
    }

    self.hits.fetch_add(1, Ordering::Relaxed);
    Some(entry.data)
  }

  /// Read a value ignoring expiry.
  ///
  /// The webhook upsert path and the preserve-on-failure policy both need
  /// the current file contents even when the entry has gone stale.
  pub fn peek<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    self.read_entry(key).map(|entry: CacheEntry<T>| entry.data)
  }

  /// Write a value, overwriting any existing entry wholesale.
  pub fn set<T: Serialize>(&self, key: &str, data: &T, expiry_override: Option<i64>) -> Result<()> {
    let entry = CacheEntry {
      data,
      last_updated: Utc::now(),
      expiry_minutes: expiry_override.unwrap_or(self.default_expiry_minutes),
    };

    let bytes = serde_json::to_vec_pretty(&entry)
      .map_err(|e| eyre!("Failed to serialize cache entry {}: {}", key, e))?;

    let path = self.path_for(key);
    std::fs::write(&path, bytes)
      .map_err(|e| eyre!("Failed to write cache file {}: {}", path.display(), e))?;

    Ok(())
  }

  /// Remove a single entry.
  pub fn invalidate(&self, key: &str) {
    let path = self.path_for(key);
    if let Err(e) = std::fs::remove_file(&path) {
      if e.kind() != std::io::ErrorKind::NotFound {
        tracing::warn!("Failed to invalidate cache key {}: {}", key, e);
      }
    }
  }

  /// Remove every entry in the cache directory.
  pub fn clear(&self) {
    let entries = match std::fs::read_dir(&self.dir) {
      Ok(entries) => entries,
      Err(e) => {
        tracing::warn!("Failed to list cache directory: {}", e);
        return;
      }
    };

    for entry in entries.flatten() {
      let path = entry.path();
      if path.extension().and_then(|e| e.to_str()) == Some("json") {
        let _ = std::fs::remove_file(path);
      }
    }
  }

  pub fn stats(&self) -> CacheStats {
    CacheStats {
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
    }
  }
}
