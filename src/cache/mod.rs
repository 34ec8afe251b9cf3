//! Local persistence layer: the generic disk cache and the image mirror.
//!
//! This module is storefront-agnostic: it knows about keys, JSON files,
//! expiry, and image URLs, but nothing about products or carts.

mod images;
mod store;

pub use images::{
  CachedImage, FetchedImage, HttpImageFetcher, ImageCache, ImageFetcher, ImageStats,
};
pub use store::{CacheEntry, CacheStats, DiskCacheStore, DEFAULT_EXPIRY_MINUTES};
