//! Master-data model shared by the catalog client and the table cache.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use masterbook_core::Error;
use serde::{Deserialize, Serialize};

/// One schemaless row of a master table.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Rows of one table as held by the cache; shared, never mutated in place.
pub type TableRows = Arc<Vec<Row>>;

/// Opaque token identifying one remote snapshot. Only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog line for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub table_name: String,
    pub content_hash: String,
}

/// Remote manifest mapping table name to content hash, iterated by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self { entries: entries.into_iter().map(|e| (e.table_name.clone(), e)).collect() }
    }

    pub fn get(&self, table_name: &str) -> Option<&CatalogEntry> {
        self.entries.get(table_name)
    }

    pub fn hash(&self, table_name: &str) -> Option<&str> {
        self.entries.get(table_name).map(|e| e.content_hash.as_str())
    }

    pub fn contains(&self, table_name: &str) -> bool {
        self.entries.contains_key(table_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Remote source of versioned master data.
///
/// Implementations perform one plain fetch per call; retries are the
/// caller's decision.
#[async_trait]
pub trait MasterSource: Send + Sync {
    /// Current remote version token.
    async fn fetch_version(&self) -> Result<Version, Error>;

    /// Current remote catalog.
    async fn fetch_catalog(&self) -> Result<Catalog, Error>;

    /// All rows of one table.
    async fn fetch_table(&self, name: &str) -> Result<Vec<Row>, Error>;
}
