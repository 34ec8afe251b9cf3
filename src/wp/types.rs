//! Normalized domain types: the shapes the cache and cart layers work with.
//!
//! Every cached collection is a flat ordered list; lookups by id/slug are
//! linear scans, acceptable at catalog scale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRef {
  pub id: u64,
  pub name: String,
  pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariationAttribute {
  pub name: String,
  pub option: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductVariation {
  pub id: u64,
  pub price: String,
  pub sku: String,
  pub attributes: Vec<VariationAttribute>,
  pub image: Option<String>,
}

/// Normalized product projection. `variations` is always fully-resolved
/// objects or an empty list, never bare origin ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedProduct {
  pub id: u64,
  pub name: String,
  pub slug: String,
  pub description: String,
  pub short_description: String,
  pub price: String,
  pub regular_price: String,
  pub sale_price: String,
  pub on_sale: bool,
  pub featured: bool,
  pub stock_status: String,
  pub images: Vec<String>,
  pub categories: Vec<ProductRef>,
  pub tags: Vec<ProductRef>,
  pub variations: Vec<ProductVariation>,
  pub last_updated: DateTime<Utc>,
}

impl CachedProduct {
  /// Every image URL this product references, including variation images.
  pub fn image_urls(&self) -> impl Iterator<Item = &str> {
    self
      .images
      .iter()
      .map(String::as_str)
      .chain(self.variations.iter().filter_map(|v| v.image.as_deref()))
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCategory {
  pub id: u64,
  pub name: String,
  pub slug: String,
  pub description: String,
  pub parent: u64,
  pub count: u64,
  pub image: Option<String>,
  pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPage {
  pub id: u64,
  pub slug: String,
  pub title: String,
  pub content: String,
  pub excerpt: String,
  pub status: String,
  pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPost {
  pub id: u64,
  pub slug: String,
  pub title: String,
  pub content: String,
  pub excerpt: String,
  pub date: String,
  pub categories: Vec<u64>,
  pub featured_image: Option<String>,
  pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
  pub id: u64,
  pub title: String,
  pub url: String,
  pub target: String,
  pub children: Vec<MenuItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedMenu {
  pub id: u64,
  pub name: String,
  pub slug: String,
  /// Theme location, inferred when the origin doesn't provide one.
  pub location: String,
  pub items: Vec<MenuItem>,
  pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSiteInfo {
  pub name: String,
  pub description: String,
  pub url: String,
  pub home: String,
  pub last_updated: DateTime<Utc>,
}

// ============================================================================
// Cart-side types
// ============================================================================

/// One cart line. `key` is unique per line; remotely-synced lines carry the
/// server's key, degraded local-only lines carry a locally-generated one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
  pub key: String,
  pub product_id: u64,
  pub name: String,
  pub price: f64,
  pub quantity: u32,
  pub image: Option<String>,
}

impl CartItem {
  pub fn line_total(&self) -> f64 {
    self.price * self.quantity as f64
  }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CartTotals {
  pub subtotal: f64,
  pub discount_total: f64,
  pub tax_total: f64,
  pub shipping_total: f64,
  pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedCoupon {
  pub code: String,
  pub discount_type: String,
  pub amount: String,
  pub discount_total: f64,
  pub discount_tax: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishlistItem {
  pub id: u64,
  pub product: CachedProduct,
  pub added_at: DateTime<Utc>,
}
