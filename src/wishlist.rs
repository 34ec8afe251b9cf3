//! Identity-scoped wishlist persistence.
//!
//! Much simpler than the cart: items live only in the key-value store, one
//! JSON blob per identity, with a login-time merge of the guest set into
//! the user's set. No remote synchronization, so no queue and no rollback.

use chrono::Utc;
use std::sync::Arc;

use crate::cart::CartIdentity;
use crate::kv::KeyValueStore;
use crate::wp::types::{CachedProduct, WishlistItem};

pub struct Wishlist {
  kv: Arc<dyn KeyValueStore>,
  identity: std::sync::Mutex<CartIdentity>,
}

fn storage_key(identity: &CartIdentity) -> String {
  match identity {
    CartIdentity::Guest => "wishlist:guest".to_string(),
    CartIdentity::User(id) => format!("wishlist:user-{}", id),
  }
}

impl Wishlist {
  pub fn new(kv: Arc<dyn KeyValueStore>, identity: CartIdentity) -> Self {
    Self {
      kv,
      identity: std::sync::Mutex::new(identity),
    }
  }

  fn identity(&self) -> CartIdentity {
    self.identity.lock().expect("wishlist identity lock poisoned").clone()
  }

  fn load(&self, identity: &CartIdentity) -> Vec<WishlistItem> {
    self
      .kv
      .get(&storage_key(identity))
      .and_then(|json| serde_json::from_str(&json).ok())
      .unwrap_or_default()
  }

  fn save(&self, identity: &CartIdentity, items: &[WishlistItem]) {
    match serde_json::to_string(items) {
      Ok(json) => self.kv.set(&storage_key(identity), &json),
      Err(e) => tracing::warn!("Failed to serialize wishlist: {}", e),
    }
  }

  pub fn items(&self) -> Vec<WishlistItem> {
    self.load(&self.identity())
  }

  pub fn contains(&self, product_id: u64) -> bool {
    self.items().iter().any(|i| i.id == product_id)
  }

  /// Add a product. Adding an already-present product is a no-op.
  pub fn add(&self, product: &CachedProduct) {
    let identity = self.identity();
    let mut items = self.load(&identity);
    if items.iter().any(|i| i.id == product.id) {
      return;
    }
    items.push(WishlistItem {
      id: product.id,
      product: product.clone(),
      added_at: Utc::now(),
    });
    self.save(&identity, &items);
  }

  pub fn remove(&self, product_id: u64) {
    let identity = self.identity();
    let mut items = self.load(&identity);
    items.retain(|i| i.id != product_id);
    self.save(&identity, &items);
  }

  /// Log a user in: merge the guest set into the user's stored set.
  ///
  /// Union by product id with the user's copy winning on duplicates; the
  /// merged set becomes the user's canonical wishlist and the guest store
  /// is cleared.
  pub fn merge_on_login(&self, user_id: u64) {
    let guest = CartIdentity::Guest;
    let user = CartIdentity::User(user_id);

    let mut merged = self.load(&user);
    for item in self.load(&guest) {
      if !merged.iter().any(|existing| existing.id == item.id) {
        merged.push(item);
      }
    }

    self.save(&user, &merged);
    self.kv.remove(&storage_key(&guest));
    *self.identity.lock().expect("wishlist identity lock poisoned") = user;
  }

  /// Revert to the guest identity (logout). Guest starts empty; the user's
  /// stored set stays put for their next login.
  pub fn set_guest(&self) {
    *self.identity.lock().expect("wishlist identity lock poisoned") = CartIdentity::Guest;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kv::MemoryKv;

  fn product(id: u64) -> CachedProduct {
    CachedProduct {
      id,
      name: format!("Product {}", id),
      slug: format!("product-{}", id),
      description: String::new(),
      short_description: String::new(),
      price: "1.00".to_string(),
      regular_price: "1.00".to_string(),
      sale_price: String::new(),
      on_sale: false,
      featured: false,
      stock_status: "instock".to_string(),
      images: Vec::new(),
      categories: Vec::new(),
      tags: Vec::new(),
      variations: Vec::new(),
      last_updated: Utc::now(),
    }
  }

  #[test]
  fn test_add_is_idempotent() {
    let wishlist = Wishlist::new(Arc::new(MemoryKv::new()), CartIdentity::Guest);
    wishlist.add(&product(1));
    wishlist.add(&product(1));
    assert_eq!(wishlist.items().len(), 1);
  }

  #[test]
  fn test_remove() {
    let wishlist = Wishlist::new(Arc::new(MemoryKv::new()), CartIdentity::Guest);
    wishlist.add(&product(1));
    wishlist.add(&product(2));

    wishlist.remove(1);
    assert!(!wishlist.contains(1));
    assert!(wishlist.contains(2));
  }

  #[test]
  fn test_login_merges_guest_into_user_and_clears_guest() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());

    // The user saved [2, 3] in an earlier session.
    {
      let as_user = Wishlist::new(Arc::clone(&kv), CartIdentity::User(9));
      as_user.add(&product(2));
      as_user.add(&product(3));
    }

    // A guest browses and saves [1, 2], then logs in as that user.
    let wishlist = Wishlist::new(Arc::clone(&kv), CartIdentity::Guest);
    wishlist.add(&product(1));
    wishlist.add(&product(2));
    wishlist.merge_on_login(9);

    let mut ids: Vec<u64> = wishlist.items().iter().map(|i| i.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);

    // Guest storage is gone.
    assert!(kv.get(&storage_key(&CartIdentity::Guest)).is_none());
  }

  #[test]
  fn test_logout_returns_to_empty_guest_set() {
    let wishlist = Wishlist::new(Arc::new(MemoryKv::new()), CartIdentity::Guest);
    wishlist.add(&product(1));
    wishlist.merge_on_login(9);

    wishlist.set_guest();
    assert!(wishlist.items().is_empty());
  }
}
