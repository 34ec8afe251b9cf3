//! Cart state and its pure reducer.
//!
//! All state transitions are synchronous and side-effect free; the session
//! layer drives them around remote calls. Totals are never mutated
//! independently: they come from a server response when one is available,
//! otherwise they are recomputed from the local lines.

use serde::{Deserialize, Serialize};

use crate::wp::types::{AppliedCoupon, CartItem, CartTotals};

/// Per-operation loading flags for the UI.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadingStates {
  pub loading: bool,
  pub adding: bool,
  pub updating: bool,
  pub removing: bool,
  pub applying_coupon: bool,
  pub removing_coupon: bool,
  pub clearing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingKind {
  Loading,
  Adding,
  Updating,
  Removing,
  ApplyingCoupon,
  RemovingCoupon,
  Clearing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartState {
  pub items: Vec<CartItem>,
  pub cart_token: Option<String>,
  pub totals: CartTotals,
  pub applied_coupons: Vec<AppliedCoupon>,
  pub is_hydrated: bool,
  pub needs_sync: bool,
  pub retry_count: u32,
  pub loading: LoadingStates,
}

#[derive(Debug, Clone)]
pub enum CartAction {
  SetLoading {
    kind: LoadingKind,
    active: bool,
  },
  /// Wholesale replacement from an authoritative server response.
  CartLoaded {
    items: Vec<CartItem>,
    totals: CartTotals,
    coupons: Vec<AppliedCoupon>,
    token: Option<String>,
  },
  /// Hydration gave up on the network; present persisted local items so
  /// the UI never shows an indefinite loading state.
  HydrationFallback {
    items: Vec<CartItem>,
  },
  /// Optimistic insert-or-increment, keyed by product id since the server
  /// line key is not known yet.
  OptimisticAdd {
    item: CartItem,
  },
  /// Optimistic quantity change; zero or below removes the line.
  OptimisticUpdate {
    key: String,
    quantity: u32,
  },
  OptimisticRemove {
    key: String,
  },
  /// Rollback: restore the pre-mutation lines.
  ItemsRestored {
    items: Vec<CartItem>,
  },
  /// Mark a pending line as permanently local-only (degraded mode).
  ConfirmLocalItem {
    product_id: u64,
  },
  /// Local clear; flags the cart for a later remote sync.
  ClearCart,
  /// Reset for an identity change: nothing survives, nothing to sync.
  Reset,
  IncrementRetry,
}

/// Prefix for lines the server has not acknowledged yet.
pub const PENDING_KEY_PREFIX: &str = "pending-";
/// Prefix for lines that will never sync (store unavailable).
pub const LOCAL_KEY_PREFIX: &str = "local-";

pub fn pending_key(product_id: u64) -> String {
  format!("{}{}", PENDING_KEY_PREFIX, product_id)
}

pub fn local_key(product_id: u64) -> String {
  format!("{}{}", LOCAL_KEY_PREFIX, product_id)
}

/// Whether a line key was generated locally rather than by the server.
pub fn is_local_key(key: &str) -> bool {
  key.starts_with(PENDING_KEY_PREFIX) || key.starts_with(LOCAL_KEY_PREFIX)
}

impl CartState {
  pub fn apply(&mut self, action: CartAction) {
    match action {
      CartAction::SetLoading { kind, active } => {
        let flag = match kind {
          LoadingKind::Loading => &mut self.loading.loading,
          LoadingKind::Adding => &mut self.loading.adding,
          LoadingKind::Updating => &mut self.loading.updating,
          LoadingKind::Removing => &mut self.loading.removing,
          LoadingKind::ApplyingCoupon => &mut self.loading.applying_coupon,
          LoadingKind::RemovingCoupon => &mut self.loading.removing_coupon,
          LoadingKind::Clearing => &mut self.loading.clearing,
        };
        *flag = active;
      }

      CartAction::CartLoaded {
        items,
        totals,
        coupons,
        token,
      } => {
        self.items = items;
        self.totals = totals;
        self.applied_coupons = coupons;
        if token.is_some() {
          self.cart_token = token;
        }
        self.is_hydrated = true;
        self.needs_sync = false;
        self.retry_count = 0;
        self.loading.loading = false;
      }

      CartAction::HydrationFallback { items } => {
        self.items = items;
        self.applied_coupons.clear();
        self.recompute_local_totals();
        self.is_hydrated = true;
        self.loading.loading = false;
      }

      CartAction::OptimisticAdd { item } => {
        match self.items.iter_mut().find(|i| i.product_id == item.product_id) {
          Some(existing) => existing.quantity += item.quantity,
          None => self.items.push(item),
        }
        self.recompute_local_totals();
      }

      CartAction::OptimisticUpdate { key, quantity } => {
        if quantity == 0 {
          self.items.retain(|i| i.key != key);
        } else if let Some(item) = self.items.iter_mut().find(|i| i.key == key) {
          item.quantity = quantity;
        }
        self.recompute_local_totals();
      }

      CartAction::OptimisticRemove { key } => {
        self.items.retain(|i| i.key != key);
        self.recompute_local_totals();
      }

      CartAction::ItemsRestored { items } => {
        self.items = items;
        self.recompute_local_totals();
      }

      CartAction::ConfirmLocalItem { product_id } => {
        let pending = pending_key(product_id);
        if let Some(item) = self.items.iter_mut().find(|i| i.key == pending) {
          item.key = local_key(product_id);
        }
      }

      CartAction::ClearCart => {
        self.items.clear();
        self.applied_coupons.clear();
        self.totals = CartTotals::default();
        self.cart_token = None;
        self.needs_sync = true;
      }

      CartAction::Reset => {
        *self = CartState {
          is_hydrated: false,
          ..CartState::default()
        };
      }

      CartAction::IncrementRetry => {
        self.retry_count += 1;
      }
    }
  }

  /// Recompute totals from local lines, keeping whatever discount/tax/
  /// shipping figures the last server response established.
  fn recompute_local_totals(&mut self) {
    let subtotal: f64 = self.items.iter().map(CartItem::line_total).sum();
    self.totals.subtotal = subtotal;
    self.totals.total = (subtotal - self.totals.discount_total
      + self.totals.tax_total
      + self.totals.shipping_total)
      .max(0.0);
  }

  pub fn item_count(&self) -> u32 {
    self.items.iter().map(|i| i.quantity).sum()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(key: &str, product_id: u64, price: f64, quantity: u32) -> CartItem {
    CartItem {
      key: key.to_string(),
      product_id,
      name: format!("Product {}", product_id),
      price,
      quantity,
      image: None,
    }
  }

  #[test]
  fn test_optimistic_add_appends_then_increments() {
    let mut state = CartState::default();

    state.apply(CartAction::OptimisticAdd {
      item: item(&pending_key(7), 7, 10.0, 1),
    });
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.totals.total, 10.0);

    state.apply(CartAction::OptimisticAdd {
      item: item(&pending_key(7), 7, 10.0, 2),
    });
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].quantity, 3);
    assert_eq!(state.totals.total, 30.0);
  }

  #[test]
  fn test_update_to_zero_removes_line() {
    let mut state = CartState::default();
    state.apply(CartAction::OptimisticAdd {
      item: item("k1", 1, 5.0, 2),
    });

    state.apply(CartAction::OptimisticUpdate {
      key: "k1".to_string(),
      quantity: 0,
    });
    assert!(state.items.is_empty());
    assert_eq!(state.totals.total, 0.0);
  }

  #[test]
  fn test_cart_loaded_is_authoritative() {
    let mut state = CartState::default();
    state.apply(CartAction::OptimisticAdd {
      item: item("k1", 1, 5.0, 2),
    });
    state.needs_sync = true;

    state.apply(CartAction::CartLoaded {
      items: vec![item("srv-1", 1, 5.0, 2)],
      totals: CartTotals {
        subtotal: 10.0,
        total: 10.0,
        ..Default::default()
      },
      coupons: Vec::new(),
      token: Some("tok".to_string()),
    });

    assert!(state.is_hydrated);
    assert!(!state.needs_sync);
    assert_eq!(state.cart_token.as_deref(), Some("tok"));
    assert_eq!(state.items[0].key, "srv-1");
  }

  #[test]
  fn test_clear_sets_needs_sync_and_drops_token() {
    let mut state = CartState::default();
    state.cart_token = Some("tok".to_string());
    state.apply(CartAction::OptimisticAdd {
      item: item("k1", 1, 5.0, 1),
    });

    state.apply(CartAction::ClearCart);
    assert!(state.items.is_empty());
    assert!(state.needs_sync);
    assert!(state.cart_token.is_none());
    assert_eq!(state.totals, CartTotals::default());
  }

  #[test]
  fn test_confirm_local_item_rekeys_pending_line() {
    let mut state = CartState::default();
    state.apply(CartAction::OptimisticAdd {
      item: item(&pending_key(7), 7, 10.0, 1),
    });

    state.apply(CartAction::ConfirmLocalItem { product_id: 7 });
    assert_eq!(state.items[0].key, local_key(7));
    assert!(is_local_key(&state.items[0].key));
  }

  #[test]
  fn test_local_total_keeps_server_discount() {
    let mut state = CartState::default();
    state.totals.discount_total = 2.0;

    state.apply(CartAction::OptimisticAdd {
      item: item("k1", 1, 10.0, 1),
    });
    assert_eq!(state.totals.subtotal, 10.0);
    assert_eq!(state.totals.total, 8.0);
  }
}
