//! Admin-triggered master-data sync.
//!
//! One cycle refreshes the table cache, then pushes every touched tracked
//! table into the relational store: localized strings first (with the diff
//! log), then characters, then aliases for each newly inserted character.

use std::collections::HashMap;
use std::sync::Arc;

use masterbook_client::TableCache;
use masterbook_core::{CHARACTER_TABLE, Error, Lang, MasterDb, RawStringRow};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Result of one sync cycle, handed to whoever sends notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SyncSummary {
    /// Tables refetched by the cache refresh, in catalog order.
    pub updated: Vec<String>,
    /// Character ids inserted by this cycle, ascending.
    pub new_chars: Vec<i64>,
    /// Whether any primary-language string changed.
    pub strings_changed: bool,
    /// Version the store was synced against.
    pub version: Option<String>,
}

/// Drives the cache refresh and the dependent relational upserts.
pub struct MasterSync {
    cache: Arc<TableCache>,
    db: MasterDb,
}

/// Master tables mirrored into the relational store.
pub fn tracked_tables() -> Vec<&'static str> {
    std::iter::once(CHARACTER_TABLE)
        .chain(Lang::ALL.iter().map(|lang| lang.text_table()))
        .collect()
}

impl MasterSync {
    pub fn new(cache: Arc<TableCache>, db: MasterDb) -> Self {
        Self { cache, db }
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    pub fn db(&self) -> &MasterDb {
        &self.db
    }

    /// Run one sync cycle.
    ///
    /// A tracked table is pushed to the store when its catalog hash differs
    /// from the hash it was last synced at, or when `force` is set. A table's
    /// hash is recorded only after its writes commit, so retrying a failed
    /// cycle picks up the same work. Tracked tables missing from the catalog
    /// are skipped.
    pub async fn run(&self, force: bool) -> Result<SyncSummary, Error> {
        let updated = self.cache.refresh().await?;
        let listed = self.cache.catalog().await;
        let tracked: Vec<&str> = tracked_tables().into_iter().filter(|t| listed.contains(t)).collect();
        self.cache.load_tables(tracked.as_slice()).await?;

        let catalog = self.cache.catalog().await;
        let version = self.cache.version().await;
        let mut touched: HashMap<&str, String> = HashMap::new();
        for table in tracked {
            let Some(hash) = catalog.hash(table) else {
                continue;
            };
            if force || self.db.synced_hash(table).await?.as_deref() != Some(hash) {
                touched.insert(table, hash.to_string());
            }
        }

        let mut summary = SyncSummary { updated, version: version.as_ref().map(|v| v.to_string()), ..Default::default() };
        if touched.is_empty() {
            tracing::debug!("no tracked tables touched");
            return Ok(summary);
        }

        let mut batches = HashMap::new();
        for lang in Lang::ALL {
            let table = lang.text_table();
            if !touched.contains_key(table) {
                continue;
            }
            let rows = self.cache.get_table(table).await?;
            let parsed = rows.iter().map(RawStringRow::parse).collect::<Result<Vec<_>, _>>();
            batches.insert(lang, self.discard_on_parse_error(table, parsed).await?);
        }
        if !batches.is_empty() {
            let version = summary.version.as_deref().unwrap_or_default();
            summary.strings_changed = self.db.upsert_strings_and_log(version, &batches).await?;
            for lang in batches.keys() {
                let table = lang.text_table();
                self.db.record_synced(table, &touched[table]).await?;
            }
        }

        if let Some(hash) = touched.get(CHARACTER_TABLE) {
            let rows = self.cache.get_table(CHARACTER_TABLE).await?;
            let upserted = self.db.upsert_characters(&rows).await;
            let mut new_chars = self.discard_on_parse_error(CHARACTER_TABLE, upserted).await?;

            // Characters committed by an earlier cycle whose seeding failed.
            new_chars.extend(self.db.unseeded_characters().await?);
            new_chars.sort_unstable();
            new_chars.dedup();

            for char_id in &new_chars {
                let aliases = self.db.seed_aliases(*char_id).await?;
                tracing::debug!(char_id, aliases = aliases.len(), "new character seeded");
            }
            self.db.record_synced(CHARACTER_TABLE, hash).await?;
            summary.new_chars = new_chars;
        }

        tracing::info!(
            updated = summary.updated.len(),
            new_chars = summary.new_chars.len(),
            strings_changed = summary.strings_changed,
            "master sync complete"
        );
        Ok(summary)
    }

    /// Evict `table` when its cached rows failed to parse, so a retry refetches them.
    async fn discard_on_parse_error<T>(&self, table: &str, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(Error::ParseFailed(msg)) = &result {
            tracing::warn!(table, error = %msg, "discarding unparseable table");
            self.cache.evict(table).await;
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use masterbook_client::testing::{FakeSource, row};
    use masterbook_client::{Row, TableCache};
    use serde_json::json;

    pub(crate) fn character(id: i64, speed: i64) -> Row {
        row(json!({
            "Id": id,
            "NameKey": format!("[CharacterName{id}]"),
            "Name2Key": format!("[CharacterSubName{id}]"),
            "ElementType": 1,
            "JobFlags": 2,
            "RarityFlags": 32,
            "InitialBattleParameter": { "Speed": speed }
        }))
    }

    pub(crate) fn text(key: &str, value: &str) -> Row {
        row(json!({ "StringKey": key, "Text": value }))
    }

    pub(crate) fn fake_source() -> Arc<FakeSource> {
        let source = FakeSource::new("1.0.0");
        source.set_table(CHARACTER_TABLE, "c1", vec![character(1, 3000), character(2, 3100)]);
        source.set_table(
            Lang::EnUs.text_table(),
            "en1",
            vec![
                text("[CharacterName1]", "Monica"),
                text("[CharacterName2]", "Cordie"),
                text("[CharacterSubName1]", "Queen of the Night"),
            ],
        );
        source.set_table("ItemMB", "i1", vec![row(json!({ "Id": 1 }))]);
        Arc::new(source)
    }

    pub(crate) async fn sync_with(source: Arc<FakeSource>) -> MasterSync {
        let cache = Arc::new(TableCache::new(source));
        let db = MasterDb::open_in_memory().await.unwrap();
        MasterSync::new(cache, db)
    }

    #[test]
    fn test_tracked_tables() {
        let tracked = tracked_tables();
        assert_eq!(tracked[0], CHARACTER_TABLE);
        assert_eq!(tracked.len(), 1 + Lang::ALL.len());
    }

    #[tokio::test]
    async fn test_first_run_bootstraps_store() {
        let source = fake_source();
        let sync = sync_with(source.clone()).await;

        let summary = sync.run(false).await.unwrap();
        assert_eq!(summary.new_chars, vec![1, 2]);
        assert!(summary.strings_changed);
        assert_eq!(summary.version.as_deref(), Some("1.0.0"));

        assert_eq!(sync.db().resolve_alias("monica").await.unwrap(), Some(1));
        assert_eq!(sync.db().resolve_alias("Queen of the Night").await.unwrap(), Some(1));
        assert_eq!(source.table_fetches("ItemMB"), 0);
    }

    #[tokio::test]
    async fn test_unchanged_version_is_noop() {
        let source = fake_source();
        let sync = sync_with(source.clone()).await;
        sync.run(false).await.unwrap();
        let fetches = source.total_table_fetches();

        let summary = sync.run(false).await.unwrap();
        assert!(summary.updated.is_empty());
        assert!(summary.new_chars.is_empty());
        assert!(!summary.strings_changed);
        assert_eq!(source.total_table_fetches(), fetches);
    }

    #[tokio::test]
    async fn test_new_character_and_renamed_string() {
        let source = fake_source();
        let sync = sync_with(source.clone()).await;
        sync.run(false).await.unwrap();

        source.set_version("1.0.1");
        source.set_table(CHARACTER_TABLE, "c2", vec![character(1, 3000), character(2, 3100), character(3, 2900)]);
        source.set_table(
            Lang::EnUs.text_table(),
            "en2",
            vec![
                text("[CharacterName1]", "Monica"),
                text("[CharacterName2]", "Cordelia"),
                text("[CharacterName3]", "Monica"),
                text("[CharacterSubName1]", "Queen of the Night"),
            ],
        );

        let summary = sync.run(false).await.unwrap();
        assert_eq!(summary.updated, vec![CHARACTER_TABLE.to_string(), Lang::EnUs.text_table().to_string()]);
        assert_eq!(summary.new_chars, vec![3]);
        assert!(summary.strings_changed);

        let log = sync.db().string_diff_log("1.0.1").await.unwrap();
        let keys: Vec<_> = log.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["[CharacterName2]", "[CharacterName3]"]);
        assert_eq!(log[0].old_value.as_deref(), Some("Cordie"));
        assert_eq!(log[0].new_value.as_deref(), Some("Cordelia"));

        let group = sync.db().alt_group(3).await.unwrap().unwrap();
        assert_eq!(group.base_id, 1);
    }

    #[tokio::test]
    async fn test_force_reupserts_without_new_rows() {
        let source = fake_source();
        let sync = sync_with(source).await;
        sync.run(false).await.unwrap();

        let summary = sync.run(true).await.unwrap();
        assert!(summary.updated.is_empty());
        assert!(summary.new_chars.is_empty());
        assert!(!summary.strings_changed);
    }

    #[tokio::test]
    async fn test_retry_after_failed_cycle_inserts_character() {
        let source = fake_source();
        let sync = sync_with(source.clone()).await;
        sync.run(false).await.unwrap();

        source.set_version("1.0.1");
        let good = vec![character(1, 3000), character(2, 3100), character(3, 2900)];
        let mut bad = good.clone();
        bad.push(row(json!({ "Id": 9 })));
        source.set_table(CHARACTER_TABLE, "c2", bad);

        let err = sync.run(false).await.unwrap_err();
        assert!(matches!(err, Error::ParseFailed(_)));
        assert!(!sync.cache().is_cached(CHARACTER_TABLE).await);

        // Upstream fixes the rows without bumping the version.
        source.set_table(CHARACTER_TABLE, "c2", good);
        let summary = sync.run(false).await.unwrap();
        assert!(summary.updated.is_empty());
        assert_eq!(summary.new_chars, vec![3]);
        assert!(sync.db().get_character(3).await.unwrap().is_some());
        assert_eq!(sync.db().synced_hash(CHARACTER_TABLE).await.unwrap().as_deref(), Some("c2"));

        assert!(sync.run(false).await.unwrap().new_chars.is_empty());
    }

    #[tokio::test]
    async fn test_unseeded_characters_are_reported() {
        let sync = sync_with(fake_source()).await;
        sync.db().upsert_characters(&[character(1, 3000), character(2, 3100)]).await.unwrap();

        let summary = sync.run(false).await.unwrap();
        assert_eq!(summary.new_chars, vec![1, 2]);
        assert_eq!(sync.db().resolve_alias("Cordie").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_bad_character_row_fails_cycle() {
        let source = fake_source();
        source.set_table(CHARACTER_TABLE, "c1", vec![character(1, 3000), row(json!({ "Id": 9 }))]);
        let sync = sync_with(source).await;

        let err = sync.run(false).await.unwrap_err();
        assert!(matches!(err, Error::ParseFailed(_)));
        assert!(sync.db().get_character(1).await.unwrap().is_none());
    }
}
