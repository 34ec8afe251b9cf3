//! Serde-deserializable types matching WordPress / WooCommerce API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on what the storefront actually needs.
//! Every field defaults: origin payloads vary wildly between WordPress and
//! WooCommerce versions, and a malformed field must degrade to a default
//! instead of failing the whole collection.

use chrono::Utc;
use serde::Deserialize;

use super::types::{
  AppliedCoupon, CachedCategory, CachedPage, CachedPost, CachedProduct, CachedSiteInfo, CartItem,
  CartTotals, MenuItem, ProductRef, ProductVariation, VariationAttribute,
};

/// Convert a minor-currency-unit string ("1050" cents) to a major-unit
/// amount (10.50). Store API monetary fields are integer minor units; this
/// is the single point where they cross into local representation.
pub fn minor_to_major(value: &str) -> f64 {
  value.trim().parse::<i64>().map(|v| v as f64 / 100.0).unwrap_or(0.0)
}

// ============================================================================
// Common nested types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiImage {
  #[serde(default)]
  pub src: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiTermRef {
  #[serde(default)]
  pub id: u64,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub slug: String,
}

/// WordPress "rendered" wrapper for title/content/excerpt fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiRendered {
  #[serde(default)]
  pub rendered: String,
}

// ============================================================================
// WooCommerce REST v3: products and categories
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiVariationAttribute {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub option: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiVariation {
  #[serde(default)]
  pub id: u64,
  #[serde(default)]
  pub price: String,
  #[serde(default)]
  pub sku: String,
  #[serde(default)]
  pub attributes: Vec<ApiVariationAttribute>,
  pub image: Option<ApiImage>,
}

/// Product variations arrive in two shapes depending on how the origin was
/// queried: fully-expanded objects, or a lazy list of bare numeric ids.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiVariations {
  Ids(Vec<u64>),
  Expanded(Vec<ApiVariation>),
}

impl Default for ApiVariations {
  fn default() -> Self {
    ApiVariations::Ids(Vec::new())
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiProduct {
  #[serde(default)]
  pub id: u64,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub slug: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub short_description: String,
  #[serde(default)]
  pub price: String,
  #[serde(default)]
  pub regular_price: String,
  #[serde(default)]
  pub sale_price: String,
  #[serde(default)]
  pub on_sale: bool,
  #[serde(default)]
  pub featured: bool,
  #[serde(default)]
  pub stock_status: String,
  #[serde(default)]
  pub images: Vec<ApiImage>,
  #[serde(default)]
  pub categories: Vec<ApiTermRef>,
  #[serde(default)]
  pub tags: Vec<ApiTermRef>,
  #[serde(default)]
  pub variations: ApiVariations,
}

impl ApiProduct {
  pub fn into_cached(self) -> CachedProduct {
    // Bare variation ids are useless to a cache consumer (they'd require
    // another origin round trip), so they normalize to an empty list.
    let variations = match self.variations {
      ApiVariations::Ids(_) => Vec::new(),
      ApiVariations::Expanded(variations) => variations
        .into_iter()
        .map(|v| ProductVariation {
          id: v.id,
          price: v.price,
          sku: v.sku,
          attributes: v
            .attributes
            .into_iter()
            .map(|a| VariationAttribute {
              name: a.name,
              option: a.option,
            })
            .collect(),
          image: v.image.map(|i| i.src).filter(|src| !src.is_empty()),
        })
        .collect(),
    };

    CachedProduct {
      id: self.id,
      name: self.name,
      slug: self.slug,
      description: self.description,
      short_description: self.short_description,
      price: self.price,
      regular_price: self.regular_price,
      sale_price: self.sale_price,
      on_sale: self.on_sale,
      featured: self.featured,
      stock_status: self.stock_status,
      images: self
        .images
        .into_iter()
        .map(|i| i.src)
        .filter(|src| !src.is_empty())
        .collect(),
      categories: self.categories.into_iter().map(term_to_ref).collect(),
      tags: self.tags.into_iter().map(term_to_ref).collect(),
      variations,
      last_updated: Utc::now(),
    }
  }
}

fn term_to_ref(term: ApiTermRef) -> ProductRef {
  ProductRef {
    id: term.id,
    name: term.name,
    slug: term.slug,
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCategory {
  #[serde(default)]
  pub id: u64,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub slug: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub parent: u64,
  #[serde(default)]
  pub count: u64,
  pub image: Option<ApiImage>,
}

impl ApiCategory {
  pub fn into_cached(self) -> CachedCategory {
    CachedCategory {
      id: self.id,
      name: self.name,
      slug: self.slug,
      description: self.description,
      parent: self.parent,
      count: self.count,
      image: self.image.map(|i| i.src).filter(|src| !src.is_empty()),
      last_updated: Utc::now(),
    }
  }
}

// ============================================================================
// WordPress REST v2: pages and posts
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiPage {
  #[serde(default)]
  pub id: u64,
  #[serde(default)]
  pub slug: String,
  #[serde(default)]
  pub title: ApiRendered,
  #[serde(default)]
  pub content: ApiRendered,
  #[serde(default)]
  pub excerpt: ApiRendered,
  #[serde(default)]
  pub status: String,
}

impl ApiPage {
  pub fn into_cached(self) -> CachedPage {
    CachedPage {
      id: self.id,
      slug: self.slug,
      title: self.title.rendered,
      content: self.content.rendered,
      excerpt: self.excerpt.rendered,
      status: self.status,
      last_updated: Utc::now(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiPost {
  #[serde(default)]
  pub id: u64,
  #[serde(default)]
  pub slug: String,
  #[serde(default)]
  pub title: ApiRendered,
  #[serde(default)]
  pub content: ApiRendered,
  #[serde(default)]
  pub excerpt: ApiRendered,
  #[serde(default)]
  pub date: String,
  #[serde(default)]
  pub categories: Vec<u64>,
  /// Present when the post was fetched with `_embed`.
  #[serde(rename = "_embedded")]
  pub embedded: Option<serde_json::Value>,
}

impl ApiPost {
  pub fn into_cached(self) -> CachedPost {
    let featured_image = extract_featured_image(self.embedded.as_ref());
    CachedPost {
      id: self.id,
      slug: self.slug,
      title: self.title.rendered,
      content: self.content.rendered,
      excerpt: self.excerpt.rendered,
      date: self.date,
      categories: self.categories,
      featured_image,
      last_updated: Utc::now(),
    }
  }
}

/// Extract the featured image URL from an `_embedded` blob.
/// The media entry can be missing, an error object, or a full attachment.
fn extract_featured_image(embedded: Option<&serde_json::Value>) -> Option<String> {
  let media = embedded?
    .get("wp:featuredmedia")?
    .as_array()?
    .first()?;

  media
    .get("source_url")
    .and_then(|v| v.as_str())
    .map(String::from)
}

// ============================================================================
// Menus plugin: /wp-json/menus/v1
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMenuItem {
  #[serde(rename = "ID", default)]
  pub id: u64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub target: String,
  #[serde(default)]
  pub child_items: Option<Vec<ApiMenuItem>>,
}

impl ApiMenuItem {
  pub fn into_item(self) -> MenuItem {
    MenuItem {
      id: self.id,
      title: self.title,
      url: self.url,
      target: self.target,
      children: self
        .child_items
        .unwrap_or_default()
        .into_iter()
        .map(ApiMenuItem::into_item)
        .collect(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMenu {
  #[serde(rename = "term_id", default)]
  pub id: u64,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub slug: String,
  /// Present only when the menu is assigned to a theme location.
  #[serde(default)]
  pub location: Option<String>,
  #[serde(default)]
  pub items: Vec<ApiMenuItem>,
}

// ============================================================================
// Site info: the /wp-json/ index
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiSiteInfo {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub home: String,
}

impl ApiSiteInfo {
  pub fn into_cached(self) -> CachedSiteInfo {
    CachedSiteInfo {
      name: self.name,
      description: self.description,
      url: self.url,
      home: self.home,
      last_updated: Utc::now(),
    }
  }
}

// ============================================================================
// Store API: cart
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCartItemPrices {
  #[serde(default)]
  pub price: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCartItem {
  #[serde(default)]
  pub key: String,
  #[serde(default)]
  pub id: u64,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub quantity: u32,
  #[serde(default)]
  pub images: Vec<ApiImage>,
  #[serde(default)]
  pub prices: ApiCartItemPrices,
}

/// Cart-level totals. WooCommerce versions and extensions disagree on which
/// discount field is populated, so both candidates are modeled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCartTotals {
  #[serde(default)]
  pub total_items: String,
  #[serde(default)]
  pub total_price: String,
  #[serde(default)]
  pub total_tax: String,
  #[serde(default)]
  pub total_shipping: String,
  pub total_discount: Option<String>,
  pub discount_total: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCouponTotals {
  #[serde(default)]
  pub total_discount: String,
  #[serde(default)]
  pub total_discount_tax: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCartCoupon {
  #[serde(default)]
  pub code: String,
  #[serde(default)]
  pub discount_type: String,
  #[serde(default)]
  pub amount: String,
  #[serde(default)]
  pub totals: ApiCouponTotals,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCart {
  #[serde(default)]
  pub items: Vec<ApiCartItem>,
  #[serde(default)]
  pub totals: ApiCartTotals,
  #[serde(default)]
  pub coupons: Vec<ApiCartCoupon>,
}

impl ApiCart {
  /// The cart-wide discount total, in major units.
  ///
  /// Priority order across WooCommerce versions: the direct total-discount
  /// field, then the alternate discount field, then the sum of individual
  /// coupon discounts. Only when all sources are absent is it zero.
  pub fn discount_total(&self) -> f64 {
    if let Some(value) = non_empty(self.totals.total_discount.as_deref()) {
      return minor_to_major(value);
    }
    if let Some(value) = non_empty(self.totals.discount_total.as_deref()) {
      return minor_to_major(value);
    }
    self
      .coupons
      .iter()
      .map(|c| minor_to_major(&c.totals.total_discount))
      .sum()
  }

  pub fn local_items(&self) -> Vec<CartItem> {
    self
      .items
      .iter()
      .map(|item| CartItem {
        key: item.key.clone(),
        product_id: item.id,
        name: item.name.clone(),
        price: minor_to_major(&item.prices.price),
        quantity: item.quantity,
        image: item
          .images
          .first()
          .map(|i| i.src.clone())
          .filter(|src| !src.is_empty()),
      })
      .collect()
  }

  pub fn local_totals(&self) -> CartTotals {
    CartTotals {
      subtotal: minor_to_major(&self.totals.total_items),
      discount_total: self.discount_total(),
      tax_total: minor_to_major(&self.totals.total_tax),
      shipping_total: minor_to_major(&self.totals.total_shipping),
      total: minor_to_major(&self.totals.total_price),
    }
  }

  pub fn local_coupons(&self) -> Vec<AppliedCoupon> {
    self
      .coupons
      .iter()
      .map(|c| AppliedCoupon {
        code: c.code.clone(),
        discount_type: c.discount_type.clone(),
        amount: c.amount.clone(),
        discount_total: minor_to_major(&c.totals.total_discount),
        discount_tax: minor_to_major(&c.totals.total_discount_tax),
      })
      .collect()
  }

  pub fn has_coupon(&self, code: &str) -> bool {
    self.coupons.iter().any(|c| c.code.eq_ignore_ascii_case(code))
  }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
  value.filter(|v| !v.trim().is_empty())
}

/// WordPress/WooCommerce error body: `{ code, message, data: { status } }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
  #[serde(default)]
  pub code: String,
  #[serde(default)]
  pub message: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minor_to_major() {
    assert_eq!(minor_to_major("1000"), 10.0);
    assert_eq!(minor_to_major("1"), 0.01);
    assert_eq!(minor_to_major(""), 0.0);
    assert_eq!(minor_to_major("garbage"), 0.0);
  }

  #[test]
  fn test_variations_as_bare_ids_normalize_to_empty() {
    let product: ApiProduct =
      serde_json::from_str(r#"{"id": 1, "name": "Shirt", "variations": [101, 102]}"#).unwrap();
    let cached = product.into_cached();
    assert!(cached.variations.is_empty());
  }

  #[test]
  fn test_variations_expanded_are_mapped() {
    let product: ApiProduct = serde_json::from_str(
      r#"{
        "id": 1,
        "name": "Shirt",
        "variations": [
          {"id": 101, "price": "19.99", "attributes": [{"name": "Size", "option": "M"}]}
        ]
      }"#,
    )
    .unwrap();

    let cached = product.into_cached();
    assert_eq!(cached.variations.len(), 1);
    assert_eq!(cached.variations[0].id, 101);
    assert_eq!(cached.variations[0].attributes[0].option, "M");
  }

  #[test]
  fn test_discount_prefers_direct_total_field() {
    let cart: ApiCart = serde_json::from_str(
      r#"{
        "totals": {"total_discount": "500", "discount_total": "100"},
        "coupons": [{"code": "x", "totals": {"total_discount": "300"}}]
      }"#,
    )
    .unwrap();
    assert_eq!(cart.discount_total(), 5.0);
  }

  #[test]
  fn test_discount_falls_back_to_coupon_sum() {
    let cart: ApiCart = serde_json::from_str(
      r#"{
        "totals": {},
        "coupons": [
          {"code": "a", "totals": {"total_discount": "300"}},
          {"code": "b", "totals": {"total_discount": "200"}}
        ]
      }"#,
    )
    .unwrap();
    assert_eq!(cart.discount_total(), 5.0);
  }

  #[test]
  fn test_discount_zero_when_all_sources_absent() {
    let cart = ApiCart::default();
    assert_eq!(cart.discount_total(), 0.0);
  }

  #[test]
  fn test_featured_image_extraction() {
    let post: ApiPost = serde_json::from_str(
      r#"{
        "id": 9,
        "title": {"rendered": "Hello"},
        "_embedded": {"wp:featuredmedia": [{"source_url": "https://x/img.jpg"}]}
      }"#,
    )
    .unwrap();
    let cached = post.into_cached();
    assert_eq!(cached.featured_image.as_deref(), Some("https://x/img.jpg"));
  }
}
