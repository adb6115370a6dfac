//! Localized string storage with a primary-language change audit.
//!
//! Each language is written as a partial-column upsert: a batch for one
//! language only touches that language's column. Around every write the
//! primary-language column is snapshotted so edits to existing text can be
//! logged per master-data version.

use std::collections::HashMap;

use super::connection::MasterDb;
use crate::{Error, Lang};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Connection, OptionalExtension, params_from_iter, types::Value};

/// Rows per multi-row INSERT; keeps statements well under SQLite's variable limit.
const UPSERT_CHUNK_ROWS: usize = 400;

/// One row of a remote `TextResource<Lang>MB` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStringRow {
    #[serde(rename = "StringKey")]
    pub key: String,
    #[serde(rename = "Text")]
    pub text: String,
}

impl RawStringRow {
    /// Parse one untyped text-table row.
    pub fn parse(raw: &serde_json::Map<String, serde_json::Value>) -> Result<Self, Error> {
        serde_json::from_value(serde_json::Value::Object(raw.clone()))
            .map_err(|e| Error::ParseFailed(format!("text resource row: {e}")))
    }
}

/// A primary-language value that differs before and after an upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StringChange {
    pub key: String,
    /// `None` when the key did not exist (or had no primary text) before.
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

fn snapshot_primary(conn: &Connection) -> rusqlite::Result<HashMap<String, Option<String>>> {
    let sql = format!("SELECT key, {} FROM strings", Lang::PRIMARY.column());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)))?;
    rows.collect()
}

fn upsert_language(conn: &Connection, lang: Lang, rows: &[RawStringRow]) -> rusqlite::Result<()> {
    let column = lang.column();
    for chunk in rows.chunks(UPSERT_CHUNK_ROWS) {
        let placeholders = vec!["(?, ?)"; chunk.len()].join(", ");
        let sql = format!(
            "INSERT INTO strings (key, {column}) VALUES {placeholders}
             ON CONFLICT(key) DO UPDATE SET {column} = excluded.{column}"
        );
        let values = chunk
            .iter()
            .flat_map(|row| [Value::Text(row.key.clone()), Value::Text(row.text.clone())]);
        conn.execute(&sql, params_from_iter(values))?;
    }
    Ok(())
}

/// Keys whose primary value differs between two snapshots, sorted by key.
fn diff_snapshots(
    before: &HashMap<String, Option<String>>, after: &HashMap<String, Option<String>>,
) -> Vec<StringChange> {
    let mut changes: Vec<StringChange> = after
        .iter()
        .filter_map(|(key, new_value)| {
            let old_value = before.get(key).cloned().flatten();
            (old_value != *new_value).then(|| StringChange {
                key: key.clone(),
                old_value,
                new_value: new_value.clone(),
            })
        })
        .collect();
    changes.sort_by(|a, b| a.key.cmp(&b.key));
    changes
}

impl MasterDb {
    /// Upsert localized strings per language and log primary-language edits.
    ///
    /// Returns `true` when at least one primary-language value changed; the
    /// changes are persisted under `version`. The whole call is one
    /// transaction.
    pub async fn upsert_strings_and_log(
        &self, version: &str, batches: &HashMap<Lang, Vec<RawStringRow>>,
    ) -> Result<bool, Error> {
        let version = version.to_string();
        let mut batches: Vec<(Lang, Vec<RawStringRow>)> =
            batches.iter().map(|(lang, rows)| (*lang, rows.clone())).collect();
        batches.sort_by_key(|(lang, _)| *lang);

        let changes = self
            .conn
            .call(move |conn| -> Result<Vec<StringChange>, Error> {
                let tx = conn.transaction()?;

                let before = snapshot_primary(&tx)?;
                for (lang, rows) in &batches {
                    upsert_language(&tx, *lang, rows)?;
                    tracing::debug!(lang = lang.column(), rows = rows.len(), "strings upserted");
                }
                let after = snapshot_primary(&tx)?;

                let changes = diff_snapshots(&before, &after);
                if !changes.is_empty() {
                    let logged_at = chrono::Utc::now().to_rfc3339();
                    let mut stmt = tx.prepare_cached(
                        "INSERT INTO string_diff_log (version, key, old_value, new_value, logged_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)
                         ON CONFLICT(version, key) DO UPDATE SET
                            old_value = excluded.old_value,
                            new_value = excluded.new_value,
                            logged_at = excluded.logged_at",
                    )?;
                    for change in &changes {
                        stmt.execute(params![&version, &change.key, &change.old_value, &change.new_value, &logged_at])?;
                    }
                }

                tx.commit()?;
                Ok(changes)
            })
            .await
            .map_err(Error::from)?;

        if !changes.is_empty() {
            tracing::info!(changed = changes.len(), "primary-language strings changed");
        }
        Ok(!changes.is_empty())
    }

    /// Persisted string changes for a master-data version, ordered by key.
    pub async fn string_diff_log(&self, version: &str) -> Result<Vec<StringChange>, Error> {
        let version = version.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<StringChange>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, old_value, new_value FROM string_diff_log WHERE version = ?1 ORDER BY key",
                )?;
                let rows = stmt.query_map(params![version], |row| {
                    Ok(StringChange { key: row.get(0)?, old_value: row.get(1)?, new_value: row.get(2)? })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up one localized string.
    pub async fn localized_string(&self, key: &str, lang: Lang) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let sql = format!("SELECT {} FROM strings WHERE key = ?1", lang.column());
                let text = conn
                    .query_row(&sql, params![key], |row| row.get::<_, Option<String>>(0))
                    .optional()?;
                Ok(text.flatten())
            })
            .await
            .map_err(Error::from)
    }
}
