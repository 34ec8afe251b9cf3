//! Origin API clients and the types that cross them.

pub mod api_types;
pub mod client;
pub mod error;
pub mod store_api;
pub mod types;

pub use client::{OriginApi, WordPressClient};
pub use error::{OriginError, StoreApiError};
pub use store_api::{CartSnapshot, HttpStoreApi, StoreApi};
