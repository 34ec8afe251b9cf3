//! WordPress / WooCommerce origin client.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

use super::api_types::{
  ApiCategory, ApiErrorBody, ApiMenu, ApiPage, ApiPost, ApiProduct, ApiSiteInfo,
};
use super::error::OriginError;

/// Page size for paginated collection fetches.
const PER_PAGE: u32 = 100;

/// Read access to the origin's resource APIs. Abstracted so the cache
/// service can be exercised against scripted origins in tests.
#[async_trait]
pub trait OriginApi: Send + Sync {
  async fn fetch_site_info(&self) -> Result<ApiSiteInfo, OriginError>;
  async fn fetch_menus(&self) -> Result<Vec<ApiMenu>, OriginError>;
  async fn fetch_products(&self) -> Result<Vec<ApiProduct>, OriginError>;
  async fn fetch_categories(&self) -> Result<Vec<ApiCategory>, OriginError>;
  async fn fetch_pages(&self) -> Result<Vec<ApiPage>, OriginError>;
  async fn fetch_posts(&self) -> Result<Vec<ApiPost>, OriginError>;
}

/// HTTP client against a WordPress installation.
///
/// WooCommerce (`wc/v3`) routes use Basic auth with the consumer key/secret;
/// core WordPress routes are unauthenticated reads.
#[derive(Clone)]
pub struct WordPressClient {
  http: reqwest::Client,
  base: Url,
  credentials: Option<(String, String)>,
}

impl WordPressClient {
  pub fn new(base_url: &str, credentials: Option<(String, String)>) -> Result<Self, OriginError> {
    let base = Url::parse(base_url)
      .map_err(|e| OriginError::Parse(format!("invalid origin URL {}: {}", base_url, e)))?;

    let http = reqwest::Client::builder()
      .timeout(std::time::Duration::from_secs(15))
      .build()
      .map_err(OriginError::from_reqwest)?;

    Ok(Self {
      http,
      base,
      credentials,
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url, OriginError> {
    self
      .base
      .join(path)
      .map_err(|e| OriginError::Parse(format!("invalid endpoint {}: {}", path, e)))
  }

  /// Whether this path requires WooCommerce credentials.
  fn is_wc_route(path: &str) -> bool {
    path.contains("/wc/v3/")
  }

  async fn get(&self, url: Url, authenticated: bool) -> Result<reqwest::Response, OriginError> {
    let mut request = self.http.get(url.clone());
    if authenticated {
      if let Some((key, secret)) = &self.credentials {
        request = request.basic_auth(key, Some(secret));
      } else {
        return Err(OriginError::Unauthorized);
      }
    }

    let response = request.send().await.map_err(OriginError::from_reqwest)?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    match status.as_u16() {
      401 | 403 => Err(OriginError::Unauthorized),
      404 => {
        // A 404 on a wc/v3 route can mean the route itself is missing
        // (plugin deactivated) rather than a missing resource.
        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        if body.code == "rest_no_route" && Self::is_wc_route(url.path()) {
          Err(OriginError::PluginInactive)
        } else {
          Err(OriginError::NotFound(url.to_string()))
        }
      }
      _ => Err(OriginError::Http {
        status: status.as_u16(),
        url: url.to_string(),
      }),
    }
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T, OriginError> {
    let mut url = self.endpoint(path)?;
    url.query_pairs_mut().extend_pairs(query);

    let response = self.get(url, Self::is_wc_route(path)).await?;
    response
      .json()
      .await
      .map_err(|e| OriginError::Parse(e.to_string()))
  }

  /// Fetch every page of a collection endpoint, bounded by the
  /// `X-WP-TotalPages` header.
  async fn get_all_pages<T: DeserializeOwned>(
    &self,
    path: &str,
    extra_query: &[(&str, String)],
  ) -> Result<Vec<T>, OriginError> {
    let authenticated = Self::is_wc_route(path);
    let mut all = Vec::new();
    let mut page = 1u32;

    loop {
      let mut url = self.endpoint(path)?;
      {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("per_page", &PER_PAGE.to_string());
        pairs.append_pair("page", &page.to_string());
        pairs.extend_pairs(extra_query);
      }

      let response = self.get(url, authenticated).await?;
      let total_pages: u32 = response
        .headers()
        .get("X-WP-TotalPages")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);

      let items: Vec<T> = response
        .json()
        .await
        .map_err(|e| OriginError::Parse(e.to_string()))?;
      let batch_len = items.len();
      all.extend(items);

      if page >= total_pages || batch_len == 0 {
        break;
      }
      page += 1;
    }

    Ok(all)
  }
}

#[async_trait]
impl OriginApi for WordPressClient {
  async fn fetch_site_info(&self) -> Result<ApiSiteInfo, OriginError> {
    self.get_json("/wp-json/", &[]).await
  }

  async fn fetch_menus(&self) -> Result<Vec<ApiMenu>, OriginError> {
    // The list endpoint omits menu items; each menu's detail call has them.
    let listing: Vec<ApiMenu> = self.get_json("/wp-json/menus/v1/menus", &[]).await?;

    let mut menus = Vec::with_capacity(listing.len());
    for menu in listing {
      let path = format!("/wp-json/menus/v1/menus/{}", menu.slug);
      match self.get_json::<ApiMenu>(&path, &[]).await {
        Ok(detail) => menus.push(detail),
        Err(OriginError::NotFound(_)) => menus.push(menu),
        Err(e) => return Err(e),
      }
    }

    Ok(menus)
  }

  async fn fetch_products(&self) -> Result<Vec<ApiProduct>, OriginError> {
    self
      .get_all_pages("/wp-json/wc/v3/products", &[("status", "publish".to_string())])
      .await
  }

  async fn fetch_categories(&self) -> Result<Vec<ApiCategory>, OriginError> {
    self
      .get_all_pages("/wp-json/wc/v3/products/categories", &[("hide_empty", "false".to_string())])
      .await
  }

  async fn fetch_pages(&self) -> Result<Vec<ApiPage>, OriginError> {
    self.get_all_pages("/wp-json/wp/v2/pages", &[]).await
  }

  async fn fetch_posts(&self) -> Result<Vec<ApiPost>, OriginError> {
    self
      .get_all_pages("/wp-json/wp/v2/posts", &[("_embed", "1".to_string())])
      .await
  }
}
