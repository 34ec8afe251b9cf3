//! Cart session: effects around the reducer, reconciling local state with
//! the token-addressed remote cart.
//!
//! Every mutation follows the same discipline: optimistic local change,
//! remote call through the operation queue, then either adoption of the
//! server's authoritative response or rollback to the pre-mutation lines.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use super::queue::OperationQueue;
use super::state::{
  is_local_key, local_key, pending_key, CartAction, CartState, LoadingKind,
};
use crate::kv::KeyValueStore;
use crate::wp::store_api::CartSnapshot;
use crate::wp::types::{CachedProduct, CartItem};
use crate::wp::{StoreApi, StoreApiError};

/// Initial load: one attempt plus retries at 1s, 2s, 4s.
const MAX_LOAD_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum CartError {
  #[error("Could not load the cart: {message}")]
  LoadFailed { attempts: u32, message: String },

  #[error("No cart line with key \"{0}\"")]
  ItemNotFound(String),

  #[error(transparent)]
  Store(#[from] StoreApiError),

  #[error("Cart operation did not complete")]
  Interrupted,
}

/// Who the cart belongs to. A token minted for one identity is never reused
/// for another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartIdentity {
  Guest,
  User(u64),
}

impl CartIdentity {
  fn suffix(&self) -> String {
    match self {
      CartIdentity::Guest => "guest".to_string(),
      CartIdentity::User(id) => format!("user-{}", id),
    }
  }

  pub fn token_key(&self) -> String {
    format!("cart-token:{}", self.suffix())
  }

  pub fn items_key(&self) -> String {
    format!("cart-items:{}", self.suffix())
  }
}

pub struct CartSession {
  state: Mutex<CartState>,
  identity: Mutex<CartIdentity>,
  store_api: Arc<dyn StoreApi>,
  queue: OperationQueue,
  kv: Arc<dyn KeyValueStore>,
  retry_base: Duration,
  settle_delay: Duration,
}

impl CartSession {
  pub fn new(
    store_api: Arc<dyn StoreApi>,
    kv: Arc<dyn KeyValueStore>,
    identity: CartIdentity,
  ) -> Self {
    Self {
      state: Mutex::new(CartState::default()),
      identity: Mutex::new(identity),
      store_api,
      queue: OperationQueue::new(),
      kv,
      retry_base: Duration::from_secs(1),
      settle_delay: Duration::from_millis(300),
    }
  }

  /// Shrink the retry/settle delays; tests should not sleep for real.
  pub fn with_timings(mut self, retry_base: Duration, settle_delay: Duration) -> Self {
    self.retry_base = retry_base;
    self.settle_delay = settle_delay;
    self
  }

  /// A snapshot of the current state.
  pub fn state(&self) -> CartState {
    self.state.lock().expect("cart state lock poisoned").clone()
  }

  pub fn identity(&self) -> CartIdentity {
    self.identity.lock().expect("identity lock poisoned").clone()
  }

  // ==========================================================================
  // Internal state plumbing
  // ==========================================================================

  fn apply(&self, action: CartAction) {
    self.state.lock().expect("cart state lock poisoned").apply(action);
  }

  fn set_loading(&self, kind: LoadingKind, active: bool) {
    self.apply(CartAction::SetLoading { kind, active });
  }

  fn items_snapshot(&self) -> Vec<CartItem> {
    self.state.lock().expect("cart state lock poisoned").items.clone()
  }

  fn token(&self) -> Option<String> {
    self.kv.get(&self.identity().token_key())
  }

  fn save_token(&self, token: &str) {
    self.kv.set(&self.identity().token_key(), token);
  }

  fn drop_token(&self) {
    self.kv.remove(&self.identity().token_key());
  }

  /// Persist local lines so a later failed hydration can fall back to them.
  fn persist_items(&self) {
    let items = self.items_snapshot();
    match serde_json::to_string(&items) {
      Ok(json) => self.kv.set(&self.identity().items_key(), &json),
      Err(e) => tracing::warn!("Failed to serialize cart items: {}", e),
    }
  }

  fn persisted_items(&self) -> Vec<CartItem> {
    self
      .kv
      .get(&self.identity().items_key())
      .and_then(|json| serde_json::from_str(&json).ok())
      .unwrap_or_default()
  }

  /// Adopt a server response wholesale: rotated token, lines, totals,
  /// coupons. Minor-unit conversion happens inside the `ApiCart` mappers.
  fn adopt_snapshot(&self, snapshot: CartSnapshot) {
    let token = snapshot.token.or_else(|| self.token());
    if let Some(token) = &token {
      self.save_token(token);
    }

    let cart = snapshot.cart;
    self.apply(CartAction::CartLoaded {
      items: cart.local_items(),
      totals: cart.local_totals(),
      coupons: cart.local_coupons(),
      token,
    });
    self.persist_items();
  }

  // ==========================================================================
  // Initialization and identity
  // ==========================================================================

  /// Load the remote cart for the current identity, retrying with
  /// exponential backoff. On exhaustion, fall back to locally-persisted
  /// lines (or empty) and still mark the cart hydrated, surfacing the
  /// connectivity error to the caller.
  pub async fn initialize(&self) -> Result<(), CartError> {
    self.set_loading(LoadingKind::Loading, true);

    match self.load_with_retries().await {
      Ok(snapshot) => {
        self.adopt_snapshot(snapshot);
        Ok(())
      }
      Err(e) => {
        let fallback = self.persisted_items();
        self.apply(CartAction::HydrationFallback { items: fallback });
        Err(CartError::LoadFailed {
          attempts: MAX_LOAD_RETRIES + 1,
          message: e.to_string(),
        })
      }
    }
  }

  async fn load_with_retries(&self) -> Result<CartSnapshot, StoreApiError> {
    let token = self.token();
    let mut backoff = self.retry_base;
    let mut attempt = 0u32;

    loop {
      match self.store_api.get_cart(token.as_deref()).await {
        Ok(snapshot) => return Ok(snapshot),
        Err(e) => {
          self.apply(CartAction::IncrementRetry);
          if attempt >= MAX_LOAD_RETRIES {
            return Err(e);
          }
          attempt += 1;
          tokio::time::sleep(backoff).await;
          backoff *= 2;
        }
      }
    }
  }

  /// Switch the cart to a different identity.
  ///
  /// Clears in-memory state, abandons the old identity's token, waits a
  /// short settling delay for the auth state to fully commit, then reloads
  /// under the new identity. The delay ordering prevents loading a cart
  /// with the stale identity's token.
  pub async fn set_identity(&self, new_identity: CartIdentity) -> Result<(), CartError> {
    {
      let mut identity = self.identity.lock().expect("identity lock poisoned");
      if *identity == new_identity {
        return Ok(());
      }
      *identity = new_identity;
    }

    self.apply(CartAction::Reset);
    tokio::time::sleep(self.settle_delay).await;
    self.initialize().await
  }

  // ==========================================================================
  // Mutations
  // ==========================================================================

  pub async fn add_to_cart(&self, product: &CachedProduct, quantity: u32) -> Result<(), CartError> {
    self.set_loading(LoadingKind::Adding, true);
    let result = self.add_inner(product, quantity).await;
    self.set_loading(LoadingKind::Adding, false);
    result
  }

  async fn add_inner(&self, product: &CachedProduct, quantity: u32) -> Result<(), CartError> {
    let before = self.items_snapshot();
    let product_id = product.id;

    self.apply(CartAction::OptimisticAdd {
      item: CartItem {
        key: pending_key(product_id),
        product_id,
        name: product.name.clone(),
        price: product.price.parse().unwrap_or(0.0),
        quantity,
        image: product.images.first().cloned(),
      },
    });
    self.persist_items();

    let api = Arc::clone(&self.store_api);
    let token = self.token();
    let outcome = self
      .queue
      .run(async move {
        let added = api.add_item(token.as_deref(), product_id, quantity).await?;
        // The add response does not reliably carry recalculated totals or
        // coupon state; a full refetch does.
        let token = added.token.or(token);
        let full = api.get_cart(token.as_deref()).await?;
        Ok::<CartSnapshot, StoreApiError>(CartSnapshot {
          token: full.token.or(token),
          cart: full.cart,
        })
      })
      .await
      .map_err(|_| CartError::Interrupted)?;

    match outcome {
      Ok(snapshot) => {
        self.adopt_snapshot(snapshot);
        Ok(())
      }
      Err(e) if e.is_store_unavailable() => {
        // Degraded mode: the line stays local-only rather than failing
        // the whole operation.
        tracing::warn!("Store API unavailable, keeping product {} local-only", product_id);
        self.apply(CartAction::ConfirmLocalItem { product_id });
        self.persist_items();
        Ok(())
      }
      Err(e) => {
        self.apply(CartAction::ItemsRestored { items: before });
        self.persist_items();
        Err(e.into())
      }
    }
  }

  pub async fn update_cart_item(&self, key: &str, quantity: u32) -> Result<(), CartError> {
    if quantity == 0 {
      return self.remove_from_cart(key).await;
    }

    self.set_loading(LoadingKind::Updating, true);
    let result = self.update_inner(key, quantity).await;
    self.set_loading(LoadingKind::Updating, false);
    result
  }

  async fn update_inner(&self, key: &str, quantity: u32) -> Result<(), CartError> {
    let before = self.items_snapshot();
    if !before.iter().any(|i| i.key == key) {
      return Err(CartError::ItemNotFound(key.to_string()));
    }

    self.apply(CartAction::OptimisticUpdate {
      key: key.to_string(),
      quantity,
    });
    self.persist_items();

    // Lines the server never acknowledged have nothing to sync.
    if is_local_key(key) {
      return Ok(());
    }

    let api = Arc::clone(&self.store_api);
    let token = self.token();
    let key_owned = key.to_string();
    let outcome = self
      .queue
      .run(async move { api.update_item(token.as_deref(), &key_owned, quantity).await })
      .await
      .map_err(|_| CartError::Interrupted)?;

    match outcome {
      Ok(snapshot) => {
        // The update response carries the full cart; no extra round trip.
        self.adopt_snapshot(snapshot);
        Ok(())
      }
      Err(e) => {
        self.apply(CartAction::ItemsRestored { items: before });
        self.persist_items();
        Err(e.into())
      }
    }
  }

  pub async fn remove_from_cart(&self, key: &str) -> Result<(), CartError> {
    self.set_loading(LoadingKind::Removing, true);
    let result = self.remove_inner(key).await;
    self.set_loading(LoadingKind::Removing, false);
    result
  }

  async fn remove_inner(&self, key: &str) -> Result<(), CartError> {
    let before = self.items_snapshot();
    if !before.iter().any(|i| i.key == key) {
      return Err(CartError::ItemNotFound(key.to_string()));
    }

    self.apply(CartAction::OptimisticRemove {
      key: key.to_string(),
    });
    self.persist_items();

    if is_local_key(key) {
      return Ok(());
    }

    let api = Arc::clone(&self.store_api);
    let token = self.token();
    let key_owned = key.to_string();
    let outcome = self
      .queue
      .run(async move { api.remove_item(token.as_deref(), &key_owned).await })
      .await
      .map_err(|_| CartError::Interrupted)?;

    match outcome {
      Ok(snapshot) => {
        self.adopt_snapshot(snapshot);
        Ok(())
      }
      Err(e) => {
        self.apply(CartAction::ItemsRestored { items: before });
        self.persist_items();
        Err(e.into())
      }
    }
  }

  /// Clear the cart.
  ///
  /// The Store API has no bulk-clear endpoint, so the remote side iterates
  /// remove-item over the current lines. Local state and the token are
  /// cleared regardless of the remote outcome.
  pub async fn clear_cart(&self) -> Result<(), CartError> {
    self.set_loading(LoadingKind::Clearing, true);

    let token = self.token();
    self.apply(CartAction::ClearCart);
    self.drop_token();
    self.persist_items();

    let api = Arc::clone(&self.store_api);
    let remote = self
      .queue
      .run(async move {
        let Some(token) = token else { return };
        match api.get_cart(Some(&token)).await {
          Ok(snapshot) => {
            for item in snapshot.cart.items {
              if let Err(e) = api.remove_item(Some(&token), &item.key).await {
                tracing::warn!("Remote remove of line {} failed: {}", item.key, e);
              }
            }
          }
          Err(e) => tracing::warn!("Remote clear skipped: {}", e),
        }
      })
      .await;

    if remote.is_err() {
      tracing::warn!("Remote clear was dropped by the queue");
    }

    self.set_loading(LoadingKind::Clearing, false);
    Ok(())
  }

  // ==========================================================================
  // Coupons
  // ==========================================================================

  pub async fn apply_coupon(&self, code: &str) -> Result<(), CartError> {
    // Already applied locally: reject before spending a round trip.
    let duplicate = self
      .state
      .lock()
      .expect("cart state lock poisoned")
      .applied_coupons
      .iter()
      .any(|c| c.code.eq_ignore_ascii_case(code));
    if duplicate {
      return Err(CartError::Store(StoreApiError::CouponAlreadyApplied {
        code: code.to_string(),
      }));
    }

    self.set_loading(LoadingKind::ApplyingCoupon, true);

    let api = Arc::clone(&self.store_api);
    let token = self.token();
    let code_owned = code.to_string();
    let outcome = self
      .queue
      .run(async move { api.apply_coupon(token.as_deref(), &code_owned).await })
      .await
      .map_err(|_| CartError::Interrupted);

    self.set_loading(LoadingKind::ApplyingCoupon, false);

    match outcome? {
      Ok(snapshot) => {
        self.adopt_snapshot(snapshot);
        Ok(())
      }
      Err(e) => Err(e.into()),
    }
  }

  /// Remove a coupon, verifying it is actually applied server-side first.
  ///
  /// If the server already lacks the coupon (a desync: a previous remove
  /// succeeded unobserved), removing it again would itself error; instead
  /// the server's current state is adopted to resynchronize the client.
  pub async fn remove_coupon(&self, code: &str) -> Result<(), CartError> {
    self.set_loading(LoadingKind::RemovingCoupon, true);

    let api = Arc::clone(&self.store_api);
    let token = self.token();
    let code_owned = code.to_string();
    let outcome = self
      .queue
      .run(async move {
        let current = api.get_cart(token.as_deref()).await?;
        let token = current.token.clone().or(token);

        if !current.cart.has_coupon(&code_owned) {
          return Ok(CartSnapshot {
            token,
            cart: current.cart,
          });
        }

        api.remove_coupon(token.as_deref(), &code_owned).await
      })
      .await
      .map_err(|_| CartError::Interrupted);

    self.set_loading(LoadingKind::RemovingCoupon, false);

    match outcome? {
      Ok(snapshot) => {
        self.adopt_snapshot(snapshot);
        Ok(())
      }
      Err(e) => Err(e.into()),
    }
  }

  // ==========================================================================
  // Divergence repair
  // ==========================================================================

  /// Re-push local lines to the remote cart and refetch.
  ///
  /// Runs only when the reducer has flagged the cart (`needs_sync`) and a
  /// token exists; repairs divergence after operations performed offline
  /// or against a stale token.
  pub async fn sync(&self) -> Result<(), CartError> {
    let needs_sync = self.state.lock().expect("cart state lock poisoned").needs_sync;
    if !needs_sync {
      return Ok(());
    }
    let Some(token) = self.token() else {
      return Ok(());
    };

    let items = self.items_snapshot();
    let api = Arc::clone(&self.store_api);
    let outcome = self
      .queue
      .run(async move {
        for item in items {
          if let Err(e) = api
            .add_item(Some(&token), item.product_id, item.quantity)
            .await
          {
            tracing::warn!("Sync re-add of product {} failed: {}", item.product_id, e);
          }
        }
        api.get_cart(Some(&token)).await
      })
      .await
      .map_err(|_| CartError::Interrupted)?;

    match outcome {
      Ok(snapshot) => {
        self.adopt_snapshot(snapshot);
        Ok(())
      }
      Err(e) => Err(e.into()),
    }
  }
}

// Convenience for callers that only know a product id (e.g. sync paths).
pub fn local_only_key(product_id: u64) -> String {
  local_key(product_id)
}
