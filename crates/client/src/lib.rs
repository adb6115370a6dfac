//! Master-data client and cache for masterbook.
//!
//! This crate provides the remote catalog client, catalog diffing, and the
//! lazily populated table cache with its version-driven refresh.

pub mod catalog;
pub mod diff;
pub mod pipeline;
pub mod source;
pub mod table_cache;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use catalog::{CatalogClient, CatalogConfig};
pub use diff::diff;
pub use source::{Catalog, CatalogEntry, MasterSource, Row, TableRows, Version};
pub use table_cache::TableCache;
