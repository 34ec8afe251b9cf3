//! Domain cache service: typed caching over the disk store for the six
//! origin resource kinds, plus the webhook-driven single-product path.
//!
//! Policy shared by every kind: an origin fetch failure preserves whatever
//! cache already exists. A catalog that fails to refresh keeps serving
//! yesterday's products rather than going blank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::{DiskCacheStore, ImageCache};
use crate::wp::api_types::ApiProduct;
use crate::wp::types::{
  CachedCategory, CachedMenu, CachedPage, CachedPost, CachedProduct, CachedSiteInfo, MenuItem,
};
use crate::wp::{OriginApi, OriginError};

pub const SITE_INFO_KEY: &str = "site-info";
pub const MENUS_KEY: &str = "menus";
pub const PRODUCTS_KEY: &str = "products";
pub const CATEGORIES_KEY: &str = "categories";
pub const PAGES_KEY: &str = "pages";
pub const POSTS_KEY: &str = "posts";
pub const METADATA_KEY: &str = "cache-metadata";

/// The six cacheable resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
  SiteInfo,
  Menus,
  Products,
  Categories,
  Pages,
  Posts,
}

impl ResourceKind {
  pub const ALL: [ResourceKind; 6] = [
    ResourceKind::SiteInfo,
    ResourceKind::Menus,
    ResourceKind::Products,
    ResourceKind::Categories,
    ResourceKind::Pages,
    ResourceKind::Posts,
  ];

  pub fn key(&self) -> &'static str {
    match self {
      ResourceKind::SiteInfo => SITE_INFO_KEY,
      ResourceKind::Menus => MENUS_KEY,
      ResourceKind::Products => PRODUCTS_KEY,
      ResourceKind::Categories => CATEGORIES_KEY,
      ResourceKind::Pages => PAGES_KEY,
      ResourceKind::Posts => POSTS_KEY,
    }
  }
}

impl FromStr for ResourceKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "site-info" | "siteinfo" => Ok(ResourceKind::SiteInfo),
      "menus" | "menu" => Ok(ResourceKind::Menus),
      "products" | "product" => Ok(ResourceKind::Products),
      "categories" | "category" => Ok(ResourceKind::Categories),
      "pages" | "page" => Ok(ResourceKind::Pages),
      "posts" | "post" => Ok(ResourceKind::Posts),
      other => Err(format!("unknown resource kind: {}", other)),
    }
  }
}

/// Record of the last refresh cycle, persisted alongside the data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshMetadata {
  pub last_full_refresh: Option<DateTime<Utc>>,
  pub last_partial_refresh: Option<PartialRefresh>,
  pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialRefresh {
  pub kind: String,
  pub at: DateTime<Utc>,
}

pub struct CacheServiceConfig {
  /// Gates the normal caching paths. Webhook mutations persist regardless:
  /// they are the only source of real-time updates.
  pub enabled: bool,
  /// Origin base URL, needed for menu URL rewriting.
  pub origin_url: String,
  pub expiry_minutes: i64,
}

pub struct CacheService {
  store: Arc<DiskCacheStore>,
  origin: Arc<dyn OriginApi>,
  images: Option<Arc<ImageCache>>,
  config: CacheServiceConfig,
  /// Serializes every write to the products key: full recache and webhook
  /// upsert/remove would otherwise race their read-modify-write cycles.
  products_lock: Mutex<()>,
}

impl CacheService {
  pub fn new(
    store: Arc<DiskCacheStore>,
    origin: Arc<dyn OriginApi>,
    images: Option<Arc<ImageCache>>,
    config: CacheServiceConfig,
  ) -> Self {
    Self {
      store,
      origin,
      images,
      config,
      products_lock: Mutex::new(()),
    }
  }

  pub fn store(&self) -> &DiskCacheStore {
    &self.store
  }

  fn expiry(&self) -> Option<i64> {
    Some(self.config.expiry_minutes)
  }

  // ==========================================================================
  // Cache reads: empty on miss, never an error
  // ==========================================================================

  pub fn get_site_info(&self) -> Option<CachedSiteInfo> {
    self.store.get(SITE_INFO_KEY, None)
  }

  pub fn get_menus(&self) -> Vec<CachedMenu> {
    self.store.get(MENUS_KEY, None).unwrap_or_default()
  }

  pub fn get_products(&self) -> Vec<CachedProduct> {
    self.store.get(PRODUCTS_KEY, None).unwrap_or_default()
  }

  pub fn get_categories(&self) -> Vec<CachedCategory> {
    self.store.get(CATEGORIES_KEY, None).unwrap_or_default()
  }

  pub fn get_pages(&self) -> Vec<CachedPage> {
    self.store.get(PAGES_KEY, None).unwrap_or_default()
  }

  pub fn get_posts(&self) -> Vec<CachedPost> {
    self.store.get(POSTS_KEY, None).unwrap_or_default()
  }

  // ==========================================================================
  // Origin refresh: fetch, normalize, persist
  // ==========================================================================

  /// Persist a refreshed collection, or preserve the old one on failure.
  ///
  /// Writes an empty collection only when no prior cache existed, so that
  /// repeated misses don't hammer a failing origin within one TTL window.
  fn settle_collection<T: Serialize + for<'de> Deserialize<'de>>(
    &self,
    key: &str,
    fetched: Result<Vec<T>, OriginError>,
  ) -> Vec<T> {
    match fetched {
      Ok(items) => {
        if self.config.enabled {
          if let Err(e) = self.store.set(key, &items, self.expiry()) {
            tracing::warn!("Failed to persist {}: {}", key, e);
          }
        }
        items
      }
      Err(e) => {
        tracing::warn!("Origin fetch for {} failed, preserving cache: {}", key, e);
        match self.store.peek::<Vec<T>>(key) {
          Some(existing) => existing,
          None => {
            if self.config.enabled {
              if let Err(e) = self.store.set(key, &Vec::<T>::new(), self.expiry()) {
                tracing::warn!("Failed to persist empty {}: {}", key, e);
              }
            }
            Vec::new()
          }
        }
      }
    }
  }

  pub async fn cache_site_info(&self) -> Option<CachedSiteInfo> {
    match self.origin.fetch_site_info().await {
      Ok(info) => {
        let cached = info.into_cached();
        if self.config.enabled {
          if let Err(e) = self.store.set(SITE_INFO_KEY, &cached, self.expiry()) {
            tracing::warn!("Failed to persist site info: {}", e);
          }
        }
        Some(cached)
      }
      Err(e) => {
        tracing::warn!("Origin fetch for site info failed, preserving cache: {}", e);
        self.store.peek(SITE_INFO_KEY)
      }
    }
  }

  pub async fn cache_menus(&self) -> Vec<CachedMenu> {
    let fetched = self
      .origin
      .fetch_menus()
      .await
      .map(|menus| normalize_menus(menus, &self.config.origin_url));
    self.settle_collection(MENUS_KEY, fetched)
  }

  pub async fn cache_products(&self) -> Vec<CachedProduct> {
    let fetched = self.origin.fetch_products().await.map(|products| {
      products
        .into_iter()
        .map(ApiProduct::into_cached)
        .collect::<Vec<_>>()
    });

    let products = {
      let _guard = self.products_lock.lock().await;
      self.settle_collection(PRODUCTS_KEY, fetched)
    };

    if let Some(images) = &self.images {
      let urls: Vec<String> = products
        .iter()
        .flat_map(|p| p.image_urls().map(String::from))
        .collect();
      images.cache_batch(urls).await;
    }

    products
  }

  pub async fn cache_categories(&self) -> Vec<CachedCategory> {
    let fetched = self.origin.fetch_categories().await.map(|categories| {
      categories
        .into_iter()
        .map(|c| c.into_cached())
        .collect::<Vec<_>>()
    });
    self.settle_collection(CATEGORIES_KEY, fetched)
  }

  pub async fn cache_pages(&self) -> Vec<CachedPage> {
    let fetched = self
      .origin
      .fetch_pages()
      .await
      .map(|pages| pages.into_iter().map(|p| p.into_cached()).collect::<Vec<_>>());
    self.settle_collection(PAGES_KEY, fetched)
  }

  pub async fn cache_posts(&self) -> Vec<CachedPost> {
    let fetched = self
      .origin
      .fetch_posts()
      .await
      .map(|posts| posts.into_iter().map(|p| p.into_cached()).collect::<Vec<_>>());
    self.settle_collection(POSTS_KEY, fetched)
  }

  // ==========================================================================
  // Refresh orchestration
  // ==========================================================================

  /// Invalidate and recache exactly one kind.
  pub async fn refresh_partial(&self, kind: ResourceKind) {
    tracing::info!("Partial refresh: {}", kind.key());
    self.store.invalidate(kind.key());

    match kind {
      ResourceKind::SiteInfo => {
        self.cache_site_info().await;
      }
      ResourceKind::Menus => {
        self.cache_menus().await;
      }
      ResourceKind::Products => {
        self.cache_products().await;
      }
      ResourceKind::Categories => {
        self.cache_categories().await;
      }
      ResourceKind::Pages => {
        self.cache_pages().await;
      }
      ResourceKind::Posts => {
        self.cache_posts().await;
      }
    }

    let mut metadata = self.metadata();
    metadata.last_partial_refresh = Some(PartialRefresh {
      kind: kind.key().to_string(),
      at: Utc::now(),
    });
    metadata.checksum = self.checksum();
    self.write_metadata(&metadata);
  }

  /// Invalidate and recache every kind, then record the refresh.
  pub async fn refresh_all(&self) {
    tracing::info!("Full refresh started");
    for kind in ResourceKind::ALL {
      self.store.invalidate(kind.key());
    }

    self.cache_site_info().await;
    self.cache_menus().await;
    self.cache_products().await;
    self.cache_categories().await;
    self.cache_pages().await;
    self.cache_posts().await;

    let mut metadata = self.metadata();
    metadata.last_full_refresh = Some(Utc::now());
    metadata.checksum = self.checksum();
    self.write_metadata(&metadata);
    tracing::info!("Full refresh complete");
  }

  pub fn metadata(&self) -> RefreshMetadata {
    self.store.peek(METADATA_KEY).unwrap_or_default()
  }

  fn write_metadata(&self, metadata: &RefreshMetadata) {
    if let Err(e) = self.store.set(METADATA_KEY, metadata, None) {
      tracing::warn!("Failed to persist refresh metadata: {}", e);
    }
  }

  /// Content checksum over the cached collections' identities.
  fn checksum(&self) -> String {
    let mut hasher = Sha256::new();
    for id in self.get_products().iter().map(|p| p.id) {
      hasher.update(id.to_le_bytes());
    }
    for id in self.get_categories().iter().map(|c| c.id) {
      hasher.update(id.to_le_bytes());
    }
    for id in self.get_pages().iter().map(|p| p.id) {
      hasher.update(id.to_le_bytes());
    }
    for id in self.get_posts().iter().map(|p| p.id) {
      hasher.update(id.to_le_bytes());
    }
    for menu in self.get_menus() {
      hasher.update(menu.id.to_le_bytes());
    }
    hex::encode(hasher.finalize())
  }

  // ==========================================================================
  // Webhook path: single-item mutations, bypassing TTL and the enabled flag
  // ==========================================================================

  /// Upsert one product from a webhook payload.
  ///
  /// Reads the current cache file directly (a missing or corrupt file is an
  /// empty list), replaces the matching entry in place so every other
  /// entry keeps its position, and writes back. Runs even when caching is
  /// disabled: this is the only source of real-time updates.
  pub async fn upsert_product_from_webhook(
    &self,
    raw: serde_json::Value,
  ) -> Result<CachedProduct, OriginError> {
    let product: ApiProduct =
      serde_json::from_value(raw).map_err(|e| OriginError::Parse(e.to_string()))?;
    let cached = product.into_cached();

    let _guard = self.products_lock.lock().await;
    let mut products: Vec<CachedProduct> = self.store.peek(PRODUCTS_KEY).unwrap_or_default();

    match products.iter_mut().find(|p| p.id == cached.id) {
      Some(existing) => *existing = cached.clone(),
      None => products.push(cached.clone()),
    }

    if let Err(e) = self.store.set(PRODUCTS_KEY, &products, self.expiry()) {
      tracing::warn!("Failed to persist webhook upsert: {}", e);
    }
    tracing::info!("Webhook upsert applied for product {}", cached.id);
    Ok(cached)
  }

  /// Remove one product by id. Same discipline as the upsert path.
  pub async fn remove_product_from_cache(&self, id: u64) -> bool {
    let _guard = self.products_lock.lock().await;
    let mut products: Vec<CachedProduct> = self.store.peek(PRODUCTS_KEY).unwrap_or_default();

    let before = products.len();
    products.retain(|p| p.id != id);
    let removed = products.len() != before;

    if removed {
      if let Err(e) = self.store.set(PRODUCTS_KEY, &products, self.expiry()) {
        tracing::warn!("Failed to persist webhook removal: {}", e);
      }
      tracing::info!("Webhook removal applied for product {}", id);
    }
    removed
  }
}

// ============================================================================
// Menu normalization
// ============================================================================

const PRIMARY_HINTS: &[&str] = &["primary", "main", "header"];

/// Normalize origin menus: infer missing locations and rewrite item URLs.
///
/// Location inference priority: explicit location from the origin, then a
/// name/slug substring match for primary/footer hints, then "primary" for
/// the first unlabeled menu and the menu's own slug for the rest. A site
/// with exactly one menu always gets "primary": there is no ambiguity to
/// resolve.
pub fn normalize_menus(menus: Vec<crate::wp::api_types::ApiMenu>, origin_url: &str) -> Vec<CachedMenu> {
  let origin_host = url::Url::parse(origin_url)
    .ok()
    .and_then(|u| u.host_str().map(String::from));

  let single = menus.len() == 1;
  let mut normalized = Vec::with_capacity(menus.len());

  for (index, menu) in menus.into_iter().enumerate() {
    let haystack = format!("{} {}", menu.name, menu.slug).to_lowercase();

    let location = match menu.location.as_deref().filter(|l| !l.is_empty()) {
      Some(explicit) => explicit.to_string(),
      None if PRIMARY_HINTS.iter().any(|hint| haystack.contains(hint)) => "primary".to_string(),
      None if haystack.contains("footer") => "footer".to_string(),
      None if index == 0 => "primary".to_string(),
      None => menu.slug.clone(),
    };

    let location = if single { "primary".to_string() } else { location };

    let items = menu
      .items
      .into_iter()
      .map(|item| rewrite_item_urls(item.into_item(), origin_host.as_deref()))
      .collect();

    normalized.push(CachedMenu {
      id: menu.id,
      name: menu.name,
      slug: menu.slug,
      location,
      items,
      last_updated: Utc::now(),
    });
  }

  normalized
}

/// Admin and upload paths stay absolute: they point at off-site assets.
const ABSOLUTE_PATH_PREFIXES: &[&str] = &["/wp-content/", "/wp-admin/"];

fn rewrite_item_urls(mut item: MenuItem, origin_host: Option<&str>) -> MenuItem {
  item.url = rewrite_url(&item.url, origin_host);
  item.children = item
    .children
    .into_iter()
    .map(|child| rewrite_item_urls(child, origin_host))
    .collect();
  item
}

/// Strip scheme+host from absolute origin URLs, leaving a root-relative
/// path. Foreign hosts and admin/upload asset URLs pass through untouched.
fn rewrite_url(raw: &str, origin_host: Option<&str>) -> String {
  let Some(origin_host) = origin_host else {
    return raw.to_string();
  };
  let Ok(parsed) = url::Url::parse(raw) else {
    return raw.to_string();
  };
  if parsed.host_str() != Some(origin_host) {
    return raw.to_string();
  }

  let path = parsed.path();
  if ABSOLUTE_PATH_PREFIXES.iter().any(|p| path.starts_with(p)) {
    return raw.to_string();
  }

  let mut relative = if path.is_empty() { "/".to_string() } else { path.to_string() };
  if let Some(query) = parsed.query() {
    relative.push('?');
    relative.push_str(query);
  }
  relative
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::wp::api_types::{ApiMenu, ApiMenuItem, ApiProduct};
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex as StdMutex;

  use crate::wp::api_types::{ApiCategory, ApiPage, ApiPost, ApiSiteInfo};

  /// Origin double: each kind either yields scripted data or fails.
  #[derive(Default)]
  struct ScriptedOrigin {
    products: StdMutex<Option<Vec<ApiProduct>>>,
    fetch_count: AtomicUsize,
  }

  impl ScriptedOrigin {
    fn with_products(products: Vec<ApiProduct>) -> Self {
      Self {
        products: StdMutex::new(Some(products)),
        fetch_count: AtomicUsize::new(0),
      }
    }

    fn failing() -> Self {
      Self::default()
    }
  }

  #[async_trait]
  impl OriginApi for ScriptedOrigin {
    async fn fetch_site_info(&self) -> Result<ApiSiteInfo, OriginError> {
      Err(OriginError::NotConnected("scripted".into()))
    }

    async fn fetch_menus(&self) -> Result<Vec<ApiMenu>, OriginError> {
      Err(OriginError::NotConnected("scripted".into()))
    }

    async fn fetch_products(&self) -> Result<Vec<ApiProduct>, OriginError> {
      self.fetch_count.fetch_add(1, Ordering::SeqCst);
      match self.products.lock().unwrap().clone() {
        Some(products) => Ok(products),
        None => Err(OriginError::NotConnected("scripted".into())),
      }
    }

    async fn fetch_categories(&self) -> Result<Vec<ApiCategory>, OriginError> {
      Ok(Vec::new())
    }

    async fn fetch_pages(&self) -> Result<Vec<ApiPage>, OriginError> {
      Ok(Vec::new())
    }

    async fn fetch_posts(&self) -> Result<Vec<ApiPost>, OriginError> {
      Ok(Vec::new())
    }
  }

  fn api_product(id: u64, name: &str) -> ApiProduct {
    ApiProduct {
      id,
      name: name.to_string(),
      slug: name.to_lowercase().replace(' ', "-"),
      ..Default::default()
    }
  }

  fn service(origin: ScriptedOrigin, enabled: bool) -> (tempfile::TempDir, CacheService) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskCacheStore::open(dir.path().to_path_buf()).unwrap());
    let service = CacheService::new(
      store,
      Arc::new(origin),
      None,
      CacheServiceConfig {
        enabled,
        origin_url: "https://shop.example.com".to_string(),
        expiry_minutes: 60,
      },
    );
    (dir, service)
  }

  #[tokio::test]
  async fn test_cache_products_persists_and_reads_back() {
    let origin = ScriptedOrigin::with_products(vec![api_product(1, "Mug"), api_product(2, "Cap")]);
    let (_dir, service) = service(origin, true);

    let cached = service.cache_products().await;
    assert_eq!(cached.len(), 2);

    let read = service.get_products();
    assert_eq!(read.len(), 2);
    assert_eq!(read[0].name, "Mug");
  }

  #[tokio::test]
  async fn test_origin_failure_preserves_existing_cache() {
    let origin = ScriptedOrigin::with_products(vec![api_product(1, "Mug")]);
    let (_dir, service) = service(origin, true);
    service.cache_products().await;

    // Origin goes down; the existing cache must survive untouched.
    let failing_service = CacheService::new(
      Arc::clone(&service.store),
      Arc::new(ScriptedOrigin::failing()),
      None,
      CacheServiceConfig {
        enabled: true,
        origin_url: "https://shop.example.com".to_string(),
        expiry_minutes: 60,
      },
    );

    let result = failing_service.cache_products().await;
    assert_eq!(result.len(), 1);
    assert_eq!(failing_service.get_products().len(), 1);
  }

  #[tokio::test]
  async fn test_origin_failure_with_no_prior_cache_writes_empty() {
    let (_dir, service) = service(ScriptedOrigin::failing(), true);

    let result = service.cache_products().await;
    assert!(result.is_empty());

    let written: Option<Vec<CachedProduct>> = service.store.peek(PRODUCTS_KEY);
    assert!(written.is_some_and(|v| v.is_empty()));
  }

  #[tokio::test]
  async fn test_webhook_upsert_replaces_in_place_preserving_order() {
    // Caching globally disabled: the webhook path must persist anyway.
    let (_dir, service) = service(ScriptedOrigin::failing(), false);

    let seed: Vec<CachedProduct> = vec![
      api_product(10, "First").into_cached(),
      api_product(42, "Target").into_cached(),
      api_product(99, "Last").into_cached(),
    ];
    service.store.set(PRODUCTS_KEY, &seed, Some(60)).unwrap();

    let raw = serde_json::json!({"id": 42, "name": "Target Renamed", "slug": "target"});
    service.upsert_product_from_webhook(raw).await.unwrap();

    let products: Vec<CachedProduct> = service.store.peek(PRODUCTS_KEY).unwrap();
    assert_eq!(products.len(), 3);
    assert_eq!(
      products.iter().map(|p| p.id).collect::<Vec<_>>(),
      vec![10, 42, 99]
    );
    assert_eq!(products[1].name, "Target Renamed");
    assert_eq!(products[0].name, "First");
    assert_eq!(products[2].name, "Last");
  }

  #[tokio::test]
  async fn test_webhook_upsert_appends_unknown_id() {
    let (_dir, service) = service(ScriptedOrigin::failing(), false);

    let raw = serde_json::json!({"id": 7, "name": "Brand New"});
    service.upsert_product_from_webhook(raw).await.unwrap();

    let products: Vec<CachedProduct> = service.store.peek(PRODUCTS_KEY).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, 7);
  }

  #[tokio::test]
  async fn test_webhook_remove_only_touches_matching_id() {
    let (_dir, service) = service(ScriptedOrigin::failing(), false);
    let seed: Vec<CachedProduct> = vec![
      api_product(1, "Keep").into_cached(),
      api_product(2, "Drop").into_cached(),
    ];
    service.store.set(PRODUCTS_KEY, &seed, Some(60)).unwrap();

    assert!(service.remove_product_from_cache(2).await);
    assert!(!service.remove_product_from_cache(2).await);

    let products: Vec<CachedProduct> = service.store.peek(PRODUCTS_KEY).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, 1);
  }

  #[tokio::test]
  async fn test_refresh_all_records_metadata() {
    let origin = ScriptedOrigin::with_products(vec![api_product(1, "Mug")]);
    let (_dir, service) = service(origin, true);

    service.refresh_all().await;

    let metadata = service.metadata();
    assert!(metadata.last_full_refresh.is_some());
    assert!(!metadata.checksum.is_empty());
  }

  #[tokio::test]
  async fn test_refresh_partial_records_kind() {
    let origin = ScriptedOrigin::with_products(vec![api_product(1, "Mug")]);
    let (_dir, service) = service(origin, true);

    service.refresh_partial(ResourceKind::Products).await;

    let metadata = service.metadata();
    let partial = metadata.last_partial_refresh.unwrap();
    assert_eq!(partial.kind, "products");
    assert!(metadata.last_full_refresh.is_none());
  }

  // ==========================================================================
  // Menu normalization
  // ==========================================================================

  fn api_menu(id: u64, name: &str, slug: &str, location: Option<&str>) -> ApiMenu {
    ApiMenu {
      id,
      name: name.to_string(),
      slug: slug.to_string(),
      location: location.map(String::from),
      items: Vec::new(),
    }
  }

  #[test]
  fn test_menu_location_inference_priority() {
    let menus = vec![
      api_menu(1, "Site Header", "site-header", None),
      api_menu(2, "Footer Links", "footer-links", None),
      api_menu(3, "Sidebar", "sidebar", None),
    ];

    let normalized = normalize_menus(menus, "https://shop.example.com");
    assert_eq!(normalized[0].location, "primary");
    assert_eq!(normalized[1].location, "footer");
    assert_eq!(normalized[2].location, "sidebar");
  }

  #[test]
  fn test_first_unlabeled_menu_defaults_to_primary() {
    let menus = vec![
      api_menu(1, "Stuff", "stuff", None),
      api_menu(2, "Things", "things", None),
    ];

    let normalized = normalize_menus(menus, "https://shop.example.com");
    assert_eq!(normalized[0].location, "primary");
    assert_eq!(normalized[1].location, "things");
  }

  #[test]
  fn test_single_menu_is_always_primary() {
    let menus = vec![api_menu(1, "Weird Name", "weird", Some("sidebar"))];
    let normalized = normalize_menus(menus, "https://shop.example.com");
    assert_eq!(normalized[0].location, "primary");
  }

  #[test]
  fn test_explicit_location_wins_over_hints() {
    let menus = vec![
      api_menu(1, "Main Menu", "main", Some("mobile")),
      api_menu(2, "Other", "other", None),
    ];
    let normalized = normalize_menus(menus, "https://shop.example.com");
    assert_eq!(normalized[0].location, "mobile");
  }

  #[test]
  fn test_menu_urls_rewritten_to_root_relative() {
    let mut menu = api_menu(1, "Main", "main", Some("primary"));
    menu.items = vec![
      ApiMenuItem {
        id: 1,
        title: "Shop".to_string(),
        url: "https://shop.example.com/shop?orderby=price".to_string(),
        target: String::new(),
        child_items: Some(vec![ApiMenuItem {
          id: 2,
          title: "Sale".to_string(),
          url: "https://shop.example.com/shop/sale".to_string(),
          target: String::new(),
          child_items: None,
        }]),
      },
      ApiMenuItem {
        id: 3,
        title: "Brochure".to_string(),
        url: "https://shop.example.com/wp-content/uploads/brochure.pdf".to_string(),
        target: String::new(),
        child_items: None,
      },
      ApiMenuItem {
        id: 4,
        title: "External".to_string(),
        url: "https://partner.example.net/deals".to_string(),
        target: String::new(),
        child_items: None,
      },
    ];

    let normalized = normalize_menus(vec![menu], "https://shop.example.com");
    let items = &normalized[0].items;
    assert_eq!(items[0].url, "/shop?orderby=price");
    assert_eq!(items[0].children[0].url, "/shop/sale");
    // Upload assets stay absolute; foreign hosts stay untouched.
    assert_eq!(items[1].url, "https://shop.example.com/wp-content/uploads/brochure.pdf");
    assert_eq!(items[2].url, "https://partner.example.net/deals");
  }
}
