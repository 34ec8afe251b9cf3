//! Read-through convenience layer over the cache service.
//!
//! Reads hit the cache first; a miss triggers exactly one recache from
//! origin, never a loop, so a persistently failing origin costs one
//! upstream call per request instead of a cascade.
//!
//! Derived views filter the full cached collection in memory, which is fine
//! at catalog scale.

use std::sync::Arc;

use super::service::CacheService;
use crate::wp::types::{
  CachedCategory, CachedMenu, CachedPage, CachedPost, CachedProduct, CachedSiteInfo,
};

pub struct CachedApi {
  service: Arc<CacheService>,
}

impl CachedApi {
  pub fn new(service: Arc<CacheService>) -> Self {
    Self { service }
  }

  // ==========================================================================
  // Read-through collection access
  // ==========================================================================

  pub async fn site_info(&self) -> Option<CachedSiteInfo> {
    match self.service.get_site_info() {
      Some(info) => Some(info),
      None => self.service.cache_site_info().await,
    }
  }

  pub async fn menus(&self) -> Vec<CachedMenu> {
    let cached = self.service.get_menus();
    if !cached.is_empty() {
      return cached;
    }
    self.service.cache_menus().await
  }

  pub async fn products(&self) -> Vec<CachedProduct> {
    let cached = self.service.get_products();
    if !cached.is_empty() {
      return cached;
    }
    self.service.cache_products().await
  }

  pub async fn categories(&self) -> Vec<CachedCategory> {
    let cached = self.service.get_categories();
    if !cached.is_empty() {
      return cached;
    }
    self.service.cache_categories().await
  }

  pub async fn pages(&self) -> Vec<CachedPage> {
    let cached = self.service.get_pages();
    if !cached.is_empty() {
      return cached;
    }
    self.service.cache_pages().await
  }

  pub async fn posts(&self) -> Vec<CachedPost> {
    let cached = self.service.get_posts();
    if !cached.is_empty() {
      return cached;
    }
    self.service.cache_posts().await
  }

  // ==========================================================================
  // Single-item lookups
  // ==========================================================================

  pub async fn product_by_id(&self, id: u64) -> Option<CachedProduct> {
    self.products().await.into_iter().find(|p| p.id == id)
  }

  pub async fn product_by_slug(&self, slug: &str) -> Option<CachedProduct> {
    self.products().await.into_iter().find(|p| p.slug == slug)
  }

  pub async fn category_by_slug(&self, slug: &str) -> Option<CachedCategory> {
    self.categories().await.into_iter().find(|c| c.slug == slug)
  }

  pub async fn page_by_slug(&self, slug: &str) -> Option<CachedPage> {
    self.pages().await.into_iter().find(|p| p.slug == slug)
  }

  pub async fn post_by_slug(&self, slug: &str) -> Option<CachedPost> {
    self.posts().await.into_iter().find(|p| p.slug == slug)
  }

  pub async fn menu_by_location(&self, location: &str) -> Option<CachedMenu> {
    self
      .menus()
      .await
      .into_iter()
      .find(|m| m.location == location)
  }

  // ==========================================================================
  // Derived product views
  // ==========================================================================

  pub async fn featured_products(&self) -> Vec<CachedProduct> {
    self
      .products()
      .await
      .into_iter()
      .filter(|p| p.featured)
      .collect()
  }

  pub async fn on_sale_products(&self) -> Vec<CachedProduct> {
    self
      .products()
      .await
      .into_iter()
      .filter(|p| p.on_sale)
      .collect()
  }

  pub async fn products_by_category(&self, slug: &str) -> Vec<CachedProduct> {
    self
      .products()
      .await
      .into_iter()
      .filter(|p| p.categories.iter().any(|c| c.slug == slug))
      .collect()
  }

  /// Case-insensitive substring search across name, descriptions, category
  /// names, and tag names.
  pub async fn search_products(&self, query: &str) -> Vec<CachedProduct> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
      return Vec::new();
    }

    self
      .products()
      .await
      .into_iter()
      .filter(|p| {
        p.name.to_lowercase().contains(&needle)
          || p.description.to_lowercase().contains(&needle)
          || p.short_description.to_lowercase().contains(&needle)
          || p.categories.iter().any(|c| c.name.to_lowercase().contains(&needle))
          || p.tags.iter().any(|t| t.name.to_lowercase().contains(&needle))
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::DiskCacheStore;
  use crate::catalog::service::CacheServiceConfig;
  use crate::wp::api_types::{
    ApiCategory, ApiMenu, ApiPage, ApiPost, ApiProduct, ApiSiteInfo, ApiTermRef,
  };
  use crate::wp::{OriginApi, OriginError};
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct CountingOrigin {
    products: Option<Vec<ApiProduct>>,
    product_fetches: AtomicUsize,
  }

  #[async_trait]
  impl OriginApi for CountingOrigin {
    async fn fetch_site_info(&self) -> Result<ApiSiteInfo, OriginError> {
      Err(OriginError::NotConnected("down".into()))
    }

    async fn fetch_menus(&self) -> Result<Vec<ApiMenu>, OriginError> {
      Ok(Vec::new())
    }

    async fn fetch_products(&self) -> Result<Vec<ApiProduct>, OriginError> {
      self.product_fetches.fetch_add(1, Ordering::SeqCst);
      match &self.products {
        Some(products) => Ok(products.clone()),
        None => Err(OriginError::NotConnected("down".into())),
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

  fn product(id: u64, name: &str, featured: bool, on_sale: bool, category: &str) -> ApiProduct {
    ApiProduct {
      id,
      name: name.to_string(),
      slug: name.to_lowercase().replace(' ', "-"),
      featured,
      on_sale,
      categories: vec![ApiTermRef {
        id: 1,
        name: category.to_string(),
        slug: category.to_lowercase(),
      }],
      ..Default::default()
    }
  }

  fn facade(products: Option<Vec<ApiProduct>>) -> (tempfile::TempDir, Arc<CountingOrigin>, CachedApi) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskCacheStore::open(dir.path().to_path_buf()).unwrap());
    let origin = Arc::new(CountingOrigin {
      products,
      product_fetches: AtomicUsize::new(0),
    });
    let service = Arc::new(CacheService::new(
      store,
      Arc::clone(&origin) as Arc<dyn OriginApi>,
      None,
      CacheServiceConfig {
        enabled: true,
        origin_url: "https://shop.example.com".to_string(),
        expiry_minutes: 60,
      },
    ));
    (dir, origin, CachedApi::new(service))
  }

  #[tokio::test]
  async fn test_miss_triggers_exactly_one_recache() {
    let (_dir, origin, api) = facade(Some(vec![product(1, "Mug", false, false, "Kitchen")]));

    let first = api.products().await;
    assert_eq!(first.len(), 1);
    assert_eq!(origin.product_fetches.load(Ordering::SeqCst), 1);

    // Second call is served from cache, no further origin traffic.
    let second = api.products().await;
    assert_eq!(second.len(), 1);
    assert_eq!(origin.product_fetches.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_persistent_failure_costs_one_fetch_per_call() {
    let (_dir, origin, api) = facade(None);

    assert!(api.products().await.is_empty());
    assert_eq!(origin.product_fetches.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_derived_views() {
    let (_dir, _origin, api) = facade(Some(vec![
      product(1, "Red Mug", true, false, "Kitchen"),
      product(2, "Blue Cap", false, true, "Apparel"),
      product(3, "Green Mug", false, false, "Kitchen"),
    ]));

    assert_eq!(api.featured_products().await.len(), 1);
    assert_eq!(api.on_sale_products().await.len(), 1);
    assert_eq!(api.products_by_category("kitchen").await.len(), 2);

    let hits = api.search_products("mug").await;
    assert_eq!(hits.len(), 2);
    assert_eq!(api.search_products("apparel").await.len(), 1);
    assert!(api.search_products("  ").await.is_empty());
  }

  #[tokio::test]
  async fn test_lookup_by_slug() {
    let (_dir, _origin, api) = facade(Some(vec![product(1, "Red Mug", false, false, "Kitchen")]));
    assert!(api.product_by_slug("red-mug").await.is_some());
    assert!(api.product_by_slug("absent").await.is_none());
    assert_eq!(api.product_by_id(1).await.unwrap().name, "Red Mug");
  }
}
