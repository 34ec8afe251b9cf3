//! WooCommerce Store API client: the session/cart-oriented API, distinct
//! from the resource-oriented REST v3 API.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use url::Url;

use super::api_types::{ApiCart, ApiErrorBody};
use super::error::StoreApiError;

const CART_TOKEN_HEADER: &str = "Cart-Token";
const NONCE_HEADER: &str = "X-WC-Store-API-Nonce";

/// One Store API response: the full cart plus any rotated session token.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
  pub cart: ApiCart,
  /// A token returned by the server, superseding whatever the caller sent.
  pub token: Option<String>,
}

/// Cart operations against the Store API. The caller owns the token; every
/// call reads it and every response may rotate it.
#[async_trait]
pub trait StoreApi: Send + Sync {
  async fn get_cart(&self, token: Option<&str>) -> Result<CartSnapshot, StoreApiError>;
  async fn add_item(
    &self,
    token: Option<&str>,
    product_id: u64,
    quantity: u32,
  ) -> Result<CartSnapshot, StoreApiError>;
  async fn update_item(
    &self,
    token: Option<&str>,
    key: &str,
    quantity: u32,
  ) -> Result<CartSnapshot, StoreApiError>;
  async fn remove_item(&self, token: Option<&str>, key: &str)
    -> Result<CartSnapshot, StoreApiError>;
  async fn apply_coupon(&self, token: Option<&str>, code: &str)
    -> Result<CartSnapshot, StoreApiError>;
  async fn remove_coupon(
    &self,
    token: Option<&str>,
    code: &str,
  ) -> Result<CartSnapshot, StoreApiError>;
}

/// HTTP implementation. Uses a shorter timeout than the catalog client:
/// cart mutations gate UI interactions and must fail fast.
pub struct HttpStoreApi {
  http: reqwest::Client,
  base: Url,
  /// Server-issued nonce, captured from responses and replayed on writes.
  nonce: Mutex<Option<String>>,
}

impl HttpStoreApi {
  pub fn new(base_url: &str) -> Result<Self, StoreApiError> {
    let base = Url::parse(base_url)
      .map_err(|e| StoreApiError::Network(format!("invalid store URL {}: {}", base_url, e)))?;

    let http = reqwest::Client::builder()
      .timeout(std::time::Duration::from_secs(10))
      .build()
      .map_err(|e| StoreApiError::Network(e.to_string()))?;

    Ok(Self {
      http,
      base,
      nonce: Mutex::new(None),
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url, StoreApiError> {
    self
      .base
      .join(&format!("/wp-json/wc/store/v1/cart{}", path))
      .map_err(|e| StoreApiError::Network(format!("invalid endpoint {}: {}", path, e)))
  }

  async fn request(
    &self,
    path: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
    coupon: Option<&str>,
  ) -> Result<CartSnapshot, StoreApiError> {
    let url = self.endpoint(path)?;

    let mut request = match &body {
      Some(body) => self.http.post(url).json(body),
      None => self.http.get(url),
    };
    if let Some(token) = token {
      request = request.header(CART_TOKEN_HEADER, token);
    }
    if let Some(nonce) = self.nonce.lock().expect("nonce lock poisoned").clone() {
      request = request.header(NONCE_HEADER, nonce);
    }

    let response = request.send().await.map_err(|e| {
      if e.is_connect() {
        StoreApiError::StoreUnavailable(e.to_string())
      } else {
        StoreApiError::Network(e.to_string())
      }
    })?;

    let new_token = response
      .headers()
      .get(CART_TOKEN_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    if let Some(nonce) = response
      .headers()
      .get(NONCE_HEADER)
      .and_then(|v| v.to_str().ok())
    {
      *self.nonce.lock().expect("nonce lock poisoned") = Some(nonce.to_string());
    }

    let status = response.status();
    if !status.is_success() {
      let body: ApiErrorBody = response.json().await.unwrap_or_default();
      return Err(StoreApiError::from_error_body(&body.code, &body.message, coupon));
    }

    let cart: ApiCart = response
      .json()
      .await
      .map_err(|e| StoreApiError::Network(format!("malformed cart response: {}", e)))?;

    Ok(CartSnapshot {
      cart,
      token: new_token,
    })
  }
}

#[async_trait]
impl StoreApi for HttpStoreApi {
  async fn get_cart(&self, token: Option<&str>) -> Result<CartSnapshot, StoreApiError> {
    self.request("", token, None, None).await
  }

  async fn add_item(
    &self,
    token: Option<&str>,
    product_id: u64,
    quantity: u32,
  ) -> Result<CartSnapshot, StoreApiError> {
    let body = json!({ "id": product_id, "quantity": quantity });
    self.request("/add-item", token, Some(body), None).await
  }

  async fn update_item(
    &self,
    token: Option<&str>,
    key: &str,
    quantity: u32,
  ) -> Result<CartSnapshot, StoreApiError> {
    let body = json!({ "key": key, "quantity": quantity });
    self.request("/update-item", token, Some(body), None).await
  }

  async fn remove_item(
    &self,
    token: Option<&str>,
    key: &str,
  ) -> Result<CartSnapshot, StoreApiError> {
    let body = json!({ "key": key });
    self.request("/remove-item", token, Some(body), None).await
  }

  async fn apply_coupon(
    &self,
    token: Option<&str>,
    code: &str,
  ) -> Result<CartSnapshot, StoreApiError> {
    let body = json!({ "code": code });
    self
      .request("/apply-coupon", token, Some(body), Some(code))
      .await
  }

  async fn remove_coupon(
    &self,
    token: Option<&str>,
    code: &str,
  ) -> Result<CartSnapshot, StoreApiError> {
    let body = json!({ "code": code });
    self
      .request("/remove-coupon", token, Some(body), Some(code))
      .await
  }
}
