//! Opaque key-value persistence used by the cart and wishlist layers.
//!
//! Token storage and per-identity persistence are deliberately reduced to a
//! string key-value contract so the higher layers never depend on where the
//! values actually live.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// String key-value store.
pub trait KeyValueStore: Send + Sync {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&self, key: &str, value: &str);
  fn remove(&self, key: &str);
}

/// In-memory store. Used in tests and as the default for ephemeral sessions.
#[derive(Default)]
pub struct MemoryKv {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KeyValueStore for MemoryKv {
  fn get(&self, key: &str) -> Option<String> {
    self.entries.lock().ok()?.get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) {
    if let Ok(mut entries) = self.entries.lock() {
      entries.insert(key.to_string(), value.to_string());
    }
  }

  fn remove(&self, key: &str) {
    if let Ok(mut entries) = self.entries.lock() {
      entries.remove(key);
    }
  }
}

/// File-backed store: a single JSON object, rewritten wholesale on each set.
pub struct FileKv {
  path: PathBuf,
  entries: Mutex<HashMap<String, String>>,
}

impl FileKv {
  /// Open or create the store at the given path.
  pub fn open(path: PathBuf) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let entries = match std::fs::read_to_string(&path) {
      Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
      Err(_) => HashMap::new(),
    };

    Ok(Self {
      path,
      entries: Mutex::new(entries),
    })
  }

  fn persist(&self, entries: &HashMap<String, String>) {
    match serde_json::to_vec_pretty(entries) {
      Ok(bytes) => {
        if let Err(e) = std::fs::write(&self.path, bytes) {
          tracing::warn!("Failed to persist key-value store {}: {}", self.path.display(), e);
        }
      }
      Err(e) => tracing::warn!("Failed to serialize key-value store: {}", e),
    }
  }
}

impl KeyValueStore for FileKv {
  fn get(&self, key: &str) -> Option<String> {
    self.entries.lock().ok()?.get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) {
    if let Ok(mut entries) = self.entries.lock() {
      entries.insert(key.to_string(), value.to_string());
      self.persist(&entries);
    }
  }

  fn remove(&self, key: &str) {
    if let Ok(mut entries) = self.entries.lock() {
      entries.remove(key);
      self.persist(&entries);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_memory_roundtrip() {
    let kv = MemoryKv::new();
    assert_eq!(kv.get("a"), None);

    kv.set("a", "1");
    assert_eq!(kv.get("a").as_deref(), Some("1"));

    kv.remove("a");
    assert_eq!(kv.get("a"), None);
  }

  #[test]
  fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kv.json");

    {
      let kv = FileKv::open(path.clone()).unwrap();
      kv.set("token", "abc");
    }

    let kv = FileKv::open(path).unwrap();
    assert_eq!(kv.get("token").as_deref(), Some("abc"));
  }
}
