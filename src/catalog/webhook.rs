//! Webhook intake: incremental cache updates pushed from the origin.
//!
//! Product created/updated/deleted events mutate the products cache file
//! directly; other kinds fall back to a partial refresh of that kind. A
//! malformed or unknown payload is logged and acknowledged, never an error
//! back to the webhook sender.

use serde::Deserialize;

use super::service::{CacheService, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookAction {
  Created,
  Updated,
  Deleted,
  Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookKind {
  Product,
  Category,
  Page,
  Post,
  Menu,
  Test,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
  pub action: WebhookAction,
  #[serde(rename = "type")]
  pub kind: WebhookKind,
  #[serde(default)]
  pub id: u64,
  #[serde(default)]
  pub data: Option<serde_json::Value>,
  #[serde(default)]
  pub timestamp: Option<String>,
}

/// Outcome reported back to the caller (and logged).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
  ProductUpserted(u64),
  ProductRemoved(u64),
  Refreshed(&'static str),
  Acknowledged,
  Ignored(String),
}

/// Apply one webhook payload against the cache service.
pub async fn apply_webhook(service: &CacheService, payload: WebhookPayload) -> WebhookOutcome {
  match (payload.kind, payload.action) {
    (WebhookKind::Product, WebhookAction::Created | WebhookAction::Updated) => {
      let Some(data) = payload.data else {
        return WebhookOutcome::Ignored(format!(
          "product webhook for id {} carried no data",
          payload.id
        ));
      };
      match service.upsert_product_from_webhook(data).await {
        Ok(product) => WebhookOutcome::ProductUpserted(product.id),
        Err(e) => {
          tracing::warn!("Webhook product upsert failed: {}", e);
          WebhookOutcome::Ignored(e.to_string())
        }
      }
    }
    (WebhookKind::Product, WebhookAction::Deleted) => {
      service.remove_product_from_cache(payload.id).await;
      WebhookOutcome::ProductRemoved(payload.id)
    }
    (WebhookKind::Category, _) => {
      service.refresh_partial(ResourceKind::Categories).await;
      WebhookOutcome::Refreshed("categories")
    }
    (WebhookKind::Page, _) => {
      service.refresh_partial(ResourceKind::Pages).await;
      WebhookOutcome::Refreshed("pages")
    }
    (WebhookKind::Post, _) => {
      service.refresh_partial(ResourceKind::Posts).await;
      WebhookOutcome::Refreshed("posts")
    }
    (WebhookKind::Menu, _) => {
      service.refresh_partial(ResourceKind::Menus).await;
      WebhookOutcome::Refreshed("menus")
    }
    (WebhookKind::Test, _) | (_, WebhookAction::Test) => WebhookOutcome::Acknowledged,
  }
}
