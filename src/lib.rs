//! Headless WooCommerce storefront companion.
//!
//! The server side caches catalog data (products, categories, pages, posts,
//! menus, site info) from a WordPress/WooCommerce origin into local JSON
//! files, mirrors product images to a content-addressed store, and applies
//! webhook-driven incremental updates. The client side keeps a local cart
//! in sync with the WooCommerce Store API through serialized, optimistic
//! mutations, plus identity-scoped wishlist persistence.

pub mod cache;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod kv;
pub mod wishlist;
pub mod wp;
