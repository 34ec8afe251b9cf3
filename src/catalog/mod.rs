//! Catalog caching: the domain cache service, the read-through façade, and
//! webhook-driven incremental updates.

pub mod facade;
pub mod service;
pub mod webhook;

pub use facade::CachedApi;
pub use service::{CacheService, CacheServiceConfig, RefreshMetadata, ResourceKind};
pub use webhook::{apply_webhook, WebhookOutcome, WebhookPayload};
