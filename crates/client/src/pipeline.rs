//! Version-driven refresh of cached tables.
//!
//! A refresh costs one version request when nothing changed. Otherwise it
//! pulls the new catalog and refetches only those tables that are both cached
//! and listed with a new hash. Tables nobody asked for stay unfetched; their
//! first lazy load after the swap already reads the new content.

use std::collections::HashSet;
use std::sync::Arc;

use masterbook_core::Error;

use crate::diff::diff;
use crate::source::{Catalog, Version};
use crate::table_cache::TableCache;

impl TableCache {
    /// Bring cached tables up to the remote version.
    ///
    /// Returns the refetched table names in catalog order; empty when the
    /// version is unchanged. Version, catalog, and refetched rows are
    /// installed together only after every fetch succeeded, so on error the
    /// cache is exactly as it was before the call.
    pub async fn refresh(&self) -> Result<Vec<String>, Error> {
        let latest = self.source.fetch_version().await?;
        self.refresh_to(latest).await
    }

    /// Refresh against a version token fetched without holding the lock.
    ///
    /// If another caller installed a version while this one waited for the
    /// lock, `latest` may already be older than the cache; the remote version
    /// is then fetched again before anything is installed.
    pub(crate) async fn refresh_to(&self, latest: Version) -> Result<Vec<String>, Error> {
        let seen = self.version().await;
        if seen.as_ref() == Some(&latest) {
            tracing::debug!(version = %latest, "master data unchanged");
            return Ok(Vec::new());
        }

        let _guard = self.refresh_lock.lock().await;
        let installed = self.version().await;
        let latest = if installed == seen { latest } else { self.source.fetch_version().await? };
        if installed.as_ref() == Some(&latest) {
            tracing::debug!(version = %latest, "master data refreshed by a concurrent caller");
            return Ok(Vec::new());
        }

        let catalog = self.source.fetch_catalog().await?;

        let (old_version, old_catalog, cached): (_, Arc<Catalog>, HashSet<String>) = {
            let state = self.state.read().await;
            (state.version.clone(), state.catalog.clone(), state.tables.keys().cloned().collect())
        };

        let changed: Vec<String> = diff(&old_catalog, &catalog)
            .into_iter()
            .filter(|name| cached.contains(name))
            .collect();

        let fetched = self.fetch_all(&changed).await?;

        let mut state = self.state.write().await;
        state.version = Some(latest.clone());
        state.catalog = Arc::new(catalog);
        state.tables.extend(fetched);
        drop(state);

        tracing::info!(
            from = old_version.as_ref().map(|v| v.as_str()).unwrap_or("none"),
            to = %latest,
            refetched = changed.len(),
            "master data refreshed"
        );
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use crate::source::{MasterSource, Version};
    use crate::table_cache::TableCache;
    use crate::testing::{FakeSource, row};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn source() -> Arc<FakeSource> {
        let source = FakeSource::new("1");
        source.set_table("T", "h1", vec![row(json!({"Id": 1, "V": "old"}))]);
        source.set_table("U", "u1", vec![row(json!({"Id": 2}))]);
        source.set_table("Lazy", "l1", vec![row(json!({"Id": 3, "V": "old"}))]);
        Arc::new(source)
    }

    #[tokio::test]
    async fn test_noop_refresh_is_stable() {
        let source = source();
        let cache = TableCache::new(source.clone());
        cache.get_table("T").await.unwrap();

        assert!(cache.refresh().await.unwrap().is_empty());
        let fetches = source.total_table_fetches();
        let catalogs = source.catalog_fetches();

        assert!(cache.refresh().await.unwrap().is_empty());
        assert_eq!(source.total_table_fetches(), fetches);
        assert_eq!(source.catalog_fetches(), catalogs);
    }

    #[tokio::test]
    async fn test_changed_hash_refetches_table() {
        let source = source();
        let cache = TableCache::new(source.clone());
        cache.get_table("T").await.unwrap();

        source.set_version("2");
        source.set_table("T", "h2", vec![row(json!({"Id": 1, "V": "new"}))]);

        let changed = cache.refresh().await.unwrap();
        assert_eq!(changed, vec!["T"]);

        let rows = cache.get_table("T").await.unwrap();
        assert_eq!(rows[0]["V"], "new");
        assert_eq!(cache.version().await, Some(Version::new("2")));
        assert_eq!(cache.catalog().await.hash("T"), Some("h2"));
    }

    #[tokio::test]
    async fn test_unchanged_table_keeps_identity() {
        let source = source();
        let cache = TableCache::new(source.clone());
        cache.get_table("T").await.unwrap();
        let before = cache.get_table("U").await.unwrap();

        source.set_version("2");
        source.set_table("T", "h2", vec![row(json!({"Id": 1, "V": "new"}))]);
        cache.refresh().await.unwrap();

        let after = cache.get_table("U").await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(source.table_fetches("U"), 1);
    }

    #[tokio::test]
    async fn test_uncached_table_loads_lazily_after_refresh() {
        let source = source();
        let cache = TableCache::new(source.clone());
        cache.get_table("T").await.unwrap();

        source.set_version("2");
        source.set_table("Lazy", "l2", vec![row(json!({"Id": 3, "V": "new"}))]);

        let changed = cache.refresh().await.unwrap();
        assert!(changed.is_empty());
        assert_eq!(source.table_fetches("Lazy"), 0);

        let rows = cache.get_table("Lazy").await.unwrap();
        assert_eq!(rows[0]["V"], "new");
        assert_eq!(source.table_fetches("Lazy"), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_cache_untouched() {
        let source = source();
        let cache = TableCache::new(source.clone());
        let t_before = cache.get_table("T").await.unwrap();
        cache.get_table("U").await.unwrap();

        source.set_version("2");
        source.set_table("T", "h2", vec![row(json!({"Id": 1, "V": "new"}))]);
        source.set_table("U", "u2", vec![row(json!({"Id": 2, "V": "new"}))]);
        source.fail_table("U", true);

        assert!(cache.refresh().await.is_err());
        assert_eq!(cache.version().await, Some(Version::new("1")));
        assert_eq!(cache.catalog().await.hash("T"), Some("h1"));
        assert!(Arc::ptr_eq(&t_before, &cache.get_table("T").await.unwrap()));

        source.fail_table("U", false);
        assert_eq!(cache.refresh().await.unwrap(), vec!["T", "U"]);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_refetch_once() {
        let source = FakeSource::new("1").with_delay(Duration::from_millis(20));
        source.set_table("T", "h1", vec![row(json!({"Id": 1}))]);
        let source = Arc::new(source);
        let cache = TableCache::new(source.clone());
        cache.get_table("T").await.unwrap();

        source.set_version("2");
        source.set_table("T", "h2", vec![row(json!({"Id": 1, "V": "new"}))]);

        let (a, b) = tokio::join!(cache.refresh(), cache.refresh());
        let mut results = vec![a.unwrap(), b.unwrap()];
        results.sort();
        assert_eq!(results, vec![Vec::<String>::new(), vec!["T".to_string()]]);
        assert_eq!(source.table_fetches("T"), 2);
    }

    #[tokio::test]
    async fn test_waiting_refresh_never_installs_older_version() {
        let source = source();
        let cache = Arc::new(TableCache::new(source.clone()));
        cache.get_table("T").await.unwrap();
        source.set_version("2");

        let guard = cache.refresh_lock.lock().await;
        let waiting = tokio::spawn({
            let cache = cache.clone();
            async move { cache.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // A faster caller installs version 3 while the spawned refresh holds "2".
        source.set_version("3");
        source.set_table("T", "h3", vec![row(json!({"Id": 1, "V": "v3"}))]);
        {
            let catalog = source.fetch_catalog().await.unwrap();
            let mut state = cache.state.write().await;
            state.version = Some(Version::new("3"));
            state.catalog = Arc::new(catalog);
        }
        drop(guard);

        assert!(waiting.await.unwrap().unwrap().is_empty());
        assert_eq!(cache.version().await, Some(Version::new("3")));
        assert_eq!(cache.catalog().await.hash("T"), Some("h3"));
        assert_eq!(source.version_fetches(), 3);
    }

    #[tokio::test]
    async fn test_cold_refresh_installs_version() {
        let source = source();
        let cache = TableCache::new(source.clone());

        assert!(cache.refresh().await.unwrap().is_empty());
        assert_eq!(cache.version().await, Some(Version::new("1")));
        assert_eq!(cache.catalog().await.len(), 3);
        assert_eq!(source.total_table_fetches(), 0);
    }
}
