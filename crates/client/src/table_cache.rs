//! Lazily populated, hash-invalidated cache of master tables.
//!
//! A single `TableCache` is built per process and shared by reference. Table
//! entries are filled on first request (or by [`TableCache::preload`]) and
//! replaced only when a refresh sees their catalog hash change.
//!
//! ### Locking
//! - `state` (RwLock) guards version, catalog, and the table map. Readers take
//!   it briefly; writers take it only to install fully fetched results.
//! - `refresh_lock` (Mutex) serializes every operation that fetches and
//!   mutates: cache misses, preload, explicit loads, and refresh.
//!
//! Network I/O never runs under the `state` write lock, so a hit on an
//! already-cached table never waits behind a fetch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use masterbook_core::Error;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;

use crate::diff::diff;
use crate::source::{Catalog, MasterSource, TableRows, Version};

/// Default bound on concurrent table fetches.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

#[derive(Default)]
pub(crate) struct CacheState {
    pub(crate) version: Option<Version>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) tables: HashMap<String, TableRows>,
}

/// In-memory master-data cache backed by a [`MasterSource`].
pub struct TableCache {
    pub(crate) source: Arc<dyn MasterSource>,
    pub(crate) state: RwLock<CacheState>,
    pub(crate) refresh_lock: Mutex<()>,
    max_concurrent_fetches: usize,
}

impl TableCache {
    /// Create an empty cache. Nothing is fetched until first use.
    pub fn new(source: Arc<dyn MasterSource>) -> Self {
        Self::with_concurrency(source, DEFAULT_MAX_CONCURRENT_FETCHES)
    }

    /// Create an empty cache with a custom fetch fan-out bound.
    pub fn with_concurrency(source: Arc<dyn MasterSource>, max_concurrent_fetches: usize) -> Self {
        Self {
            source,
            state: RwLock::new(CacheState::default()),
            refresh_lock: Mutex::new(()),
            max_concurrent_fetches: max_concurrent_fetches.max(1),
        }
    }

    /// Installed version, if any.
    pub async fn version(&self) -> Option<Version> {
        self.state.read().await.version.clone()
    }

    /// Installed catalog snapshot.
    pub async fn catalog(&self) -> Arc<Catalog> {
        self.state.read().await.catalog.clone()
    }

    /// Names of cached tables, sorted.
    pub async fn cached_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().await.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn is_cached(&self, name: &str) -> bool {
        self.state.read().await.tables.contains_key(name)
    }

    async fn cached(&self, name: &str) -> Option<TableRows> {
        self.state.read().await.tables.get(name).cloned()
    }

    /// Rows of one table, fetching it on first request.
    ///
    /// A cold cache resolves version and catalog before the first fetch.
    pub async fn get_table(&self, name: &str) -> Result<TableRows, Error> {
        if let Some(rows) = self.cached(name).await {
            return Ok(rows);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(rows) = self.cached(name).await {
            return Ok(rows);
        }

        self.ensure_version_locked().await?;

        let rows: TableRows = Arc::new(self.source.fetch_table(name).await?);
        tracing::debug!(table = name, rows = rows.len(), "table loaded on demand");
        self.state
            .write()
            .await
            .tables
            .insert(name.to_string(), rows.clone());

        Ok(rows)
    }

    /// Resolve version and catalog, then fetch every table not in `excluded`.
    ///
    /// Already cached tables are refetched only if their hash changed.
    /// Returns the fetched table names in catalog order. Nothing is installed
    /// unless every fetch succeeds.
    pub async fn preload(&self, excluded: &HashSet<String>) -> Result<Vec<String>, Error> {
        let _guard = self.refresh_lock.lock().await;

        let version = self.source.fetch_version().await?;
        let catalog = self.source.fetch_catalog().await?;

        let (old_catalog, cached): (Arc<Catalog>, HashSet<String>) = {
            let state = self.state.read().await;
            (state.catalog.clone(), state.tables.keys().cloned().collect())
        };
        let stale: HashSet<String> = diff(&old_catalog, &catalog)
            .into_iter()
            .filter(|name| cached.contains(name))
            .collect();

        let names: Vec<String> = catalog
            .table_names()
            .filter(|name| (!excluded.contains(*name) && !cached.contains(*name)) || stale.contains(*name))
            .map(String::from)
            .collect();

        let fetched = self.fetch_all(&names).await?;

        let mut state = self.state.write().await;
        state.version = Some(version.clone());
        state.catalog = Arc::new(catalog);
        state.tables.extend(fetched);
        drop(state);

        tracing::info!(version = %version, tables = names.len(), excluded = excluded.len(), "master data preloaded");
        Ok(names)
    }

    /// Make sure the given tables are cached, fetching the missing ones together.
    ///
    /// The remote version is checked first, outside the lock; a newer one is
    /// installed through [`TableCache::refresh`] before the missing tables are
    /// fetched, so they are read against the current catalog.
    pub async fn load_tables<S: AsRef<str>>(&self, names: &[S]) -> Result<(), Error> {
        let latest = self.source.fetch_version().await?;
        if self.version().await.as_ref() != Some(&latest) {
            self.refresh_to(latest).await?;
        }

        let _guard = self.refresh_lock.lock().await;
        let missing: Vec<String> = {
            let state = self.state.read().await;
            let mut seen = HashSet::new();
            names
                .iter()
                .map(|name| name.as_ref())
                .filter(|name| !state.tables.contains_key(*name) && seen.insert(*name))
                .map(String::from)
                .collect()
        };
        if missing.is_empty() {
            return Ok(());
        }

        let fetched = self.fetch_all(&missing).await?;
        self.state.write().await.tables.extend(fetched);

        tracing::debug!(tables = ?missing, "tables loaded");
        Ok(())
    }

    /// Drop a cached table so its next request fetches it again.
    ///
    /// For rows that were fetched but could not be applied downstream. Returns
    /// whether the table was cached.
    pub async fn evict(&self, name: &str) -> bool {
        let _guard = self.refresh_lock.lock().await;
        let evicted = self.state.write().await.tables.remove(name).is_some();
        if evicted {
            tracing::debug!(table = name, "table evicted");
        }
        evicted
    }

    /// Install version and catalog on a cold cache. Caller holds `refresh_lock`.
    async fn ensure_version_locked(&self) -> Result<(), Error> {
        if self.state.read().await.version.is_some() {
            return Ok(());
        }

        let version = self.source.fetch_version().await?;
        let catalog = self.source.fetch_catalog().await?;

        let mut state = self.state.write().await;
        tracing::debug!(version = %version, tables = catalog.len(), "master catalog resolved");
        state.version = Some(version);
        state.catalog = Arc::new(catalog);
        Ok(())
    }

    /// Fetch tables concurrently; fails as a whole on the first error.
    pub(crate) async fn fetch_all(&self, names: &[String]) -> Result<Vec<(String, TableRows)>, Error> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_fetches));
        let mut join_set = JoinSet::new();

        for name in names {
            let source = self.source.clone();
            let semaphore = semaphore.clone();
            let name = name.clone();

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Internal(e.to_string()))?;
                let rows = source.fetch_table(&name).await?;
                tracing::debug!(table = %name, rows = rows.len(), "table fetched");
                Ok::<_, Error>((name, Arc::new(rows)))
            });
        }

        let mut fetched = Vec::with_capacity(names.len());
        while let Some(joined) = join_set.join_next().await {
            let result = joined.map_err(|e| Error::Internal(format!("table fetch task: {e}")));
            match result.and_then(|r| r) {
                Ok(pair) => fetched.push(pair),
                Err(e) => {
                    join_set.shutdown().await;
                    tracing::warn!(error = %e, "table fetch failed; discarding batch");
                    return Err(e);
                }
            }
        }

        Ok(fetched)
    }
}
